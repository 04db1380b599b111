use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::container::{EncodeOptions, EncodeSummary, write_map_file};
use crate::ingest::{IngestOptions, load_map_data};
use crate::tiling::{DEFAULT_ZOOM, HilbertGrid};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub zoom: u8,
    pub threads: Option<usize>,
    pub no_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            threads: None,
            no_progress: false,
        }
    }
}

pub fn build_map_file(input: &Path, output: &Path, options: &BuildOptions) -> Result<EncodeSummary> {
    let grid = HilbertGrid::new(options.zoom)?;
    let data = load_map_data(
        input,
        &IngestOptions {
            threads: options.threads,
            no_progress: options.no_progress,
        },
    )?;

    let index = data
        .partition(&grid)
        .with_context(|| format!("failed to partition {}", input.display()))?;
    info!(
        zoom = grid.zoom(),
        tiles = index.tile_count(),
        used_nodes = index.used.len(),
        "partitioned map data"
    );

    write_map_file(
        output,
        &data,
        &index,
        &EncodeOptions {
            no_progress: options.no_progress,
        },
    )
}
