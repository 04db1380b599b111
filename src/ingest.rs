use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use flate2::bufread::MultiGzDecoder;
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{debug, info};

use crate::dataset::{BlockSink, MapData};
use crate::model::SourceBlock;
use crate::progress::{ProgressTracker, progress_for_phase};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BLOCK_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub threads: Option<usize>,
    pub no_progress: bool,
}

pub fn open_source(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open input blocks: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf().context("read input head")?;
    if head.starts_with(&GZIP_MAGIC) {
        debug!(path = %path.display(), "input is gzip compressed");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

pub fn parse_block(line: &str) -> Result<SourceBlock> {
    serde_json::from_str(line).context("parse source block")
}

pub fn load_map_data(path: &Path, options: &IngestOptions) -> Result<MapData> {
    let reader = open_source(path)?;
    let (tx, rx) = crossbeam_channel::bounded::<(u64, String)>(BLOCK_QUEUE_DEPTH);

    let producer = thread::spawn(move || -> Result<u64> {
        let mut sent = 0u64;
        for (index, line) in reader.lines().enumerate() {
            let line_no = index as u64 + 1;
            let line = line.with_context(|| format!("read input line {line_no}"))?;
            if line.trim().is_empty() {
                continue;
            }
            if tx.send((line_no, line)).is_err() {
                // Consumers stopped after an error; they report it.
                break;
            }
            sent += 1;
        }
        Ok(sent)
    });

    let sink = BlockSink::default();
    let progress = progress_for_phase("ingesting", "blocks", None, options.no_progress);
    let bar = progress.as_ref().map(ProgressTracker::handle);

    let parse = || {
        rx.into_iter()
            .par_bridge()
            .try_for_each(|(line_no, line)| -> Result<()> {
                let block = parse_block(&line)
                    .with_context(|| format!("invalid block on line {line_no}"))?;
                sink.insert(line_no, block);
                if let Some(bar) = bar.as_ref() {
                    bar.inc(1);
                }
                Ok(())
            })
    };

    let parsed = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("build ingest thread pool")?
            .install(parse),
        None => parse(),
    };

    let produced = producer
        .join()
        .map_err(|_| anyhow::anyhow!("input reader thread panicked"))?;
    if let Some(tracker) = progress {
        tracker.finish();
    }
    parsed?;
    let blocks = produced?;

    let data = sink.finish();
    info!(
        blocks,
        nodes = data.nodes.len(),
        ways = data.ways.len(),
        "ingested source blocks"
    );
    Ok(data)
}
