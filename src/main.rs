use anyhow::Result;
use clap::Parser;

use map_features::build::{BuildOptions, build_map_file};
use map_features::cli::{Cli, Command, ReportFormat};
use map_features::container::{InspectOptions, inspect_map_file, verify_map_file};
use map_features::output::{build_summary_line, inspect_text_lines, verify_text_lines};
use map_features::tiling::parse_tile_spec;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match cli.command {
        Command::Build(args) => {
            let options = BuildOptions {
                zoom: args.zoom,
                threads: args.threads,
                no_progress: args.no_progress,
            };
            let summary = build_map_file(&args.input, &args.output, &options)?;
            println!("{}", build_summary_line(&summary));
        }
        Command::Inspect(args) => {
            let tile = match args.tile.as_deref() {
                Some(value) => Some(parse_tile_spec(value)?),
                None => None,
            };
            let report = inspect_map_file(&args.input, &InspectOptions { tile })?;
            match args.output {
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                ReportFormat::Text => {
                    for line in inspect_text_lines(&report) {
                        println!("{line}");
                    }
                }
            }
        }
        Command::Verify(args) => {
            let report = verify_map_file(&args.input)?;
            match args.output {
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                ReportFormat::Text => {
                    for line in verify_text_lines(&report) {
                        println!("{line}");
                    }
                }
            }
            if !report.is_ok() {
                anyhow::bail!(
                    "{} of {} tiles failed verification",
                    report.failures.len(),
                    report.tile_count
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
