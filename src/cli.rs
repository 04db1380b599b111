use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::tiling::DEFAULT_ZOOM;

#[derive(Debug, Parser)]
#[command(
    name = "map-features",
    version,
    about = "Build and inspect tiled map feature files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (error|warn|info|debug|trace)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify source blocks and encode them into a map file
    Build(BuildArgs),
    /// Print totals for a map file, or the features of one tile
    Inspect(InspectArgs),
    /// Decode every tile and report the ones that fail
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Newline-delimited JSON source blocks, optionally gzip compressed
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,

    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    pub input: PathBuf,

    /// Tile id or z/x/y address
    #[arg(long)]
    pub tile: Option<String>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub output: ReportFormat,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub output: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}
