use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::classify::RenderCategory;
use crate::container::reader::TileFileReader;
use crate::container::types::{DIRECTORY_ENTRY_SIZE, DecodedTile, FILE_HEADER_SIZE};
use crate::model::TileId;
use crate::tiling::tile_id_to_xyz;

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub tile: Option<TileId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TileTotals {
    pub features: u64,
    pub coordinates: u64,
    pub properties: u64,
    pub characters: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSummary {
    pub tile_id: TileId,
    pub zxy: (u8, u32, u32),
    pub offset: u64,
    pub totals: TileTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub version: u64,
    pub tile_count: u32,
    pub file_bytes: u64,
    pub totals: TileTotals,
    pub by_category: BTreeMap<RenderCategory, u64>,
    pub by_geometry: BTreeMap<&'static str, u64>,
    pub labelled_features: u64,
    pub tiles: Vec<TileSummary>,
    pub tile: Option<DecodedTile>,
}

pub fn inspect_map_file(path: &Path, options: &InspectOptions) -> Result<InspectReport> {
    let mut reader = TileFileReader::open(path)?;
    let entries = reader.directory().to_vec();

    let mut totals = TileTotals::default();
    let mut by_category = BTreeMap::new();
    let mut by_geometry = BTreeMap::new();
    let mut labelled_features = 0u64;
    let mut tiles = Vec::with_capacity(entries.len());

    for entry in entries.iter() {
        let (header, records) = reader.read_feature_records(*entry)?;
        let tile_totals = TileTotals {
            features: u64::from(header.feature_count),
            coordinates: u64::from(header.coordinate_count),
            properties: u64::from(header.descriptor_count / 2),
            characters: u64::from(header.character_count),
        };
        for record in records.iter() {
            *by_category.entry(record.category).or_insert(0) += 1;
            *by_geometry.entry(record.geometry.as_str()).or_insert(0) += 1;
            if record.label.is_some() {
                labelled_features += 1;
            }
        }
        totals.features += tile_totals.features;
        totals.coordinates += tile_totals.coordinates;
        totals.properties += tile_totals.properties;
        totals.characters += tile_totals.characters;
        tiles.push(TileSummary {
            tile_id: entry.tile_id,
            zxy: tile_id_to_xyz(u64::from(entry.tile_id)),
            offset: entry.offset,
            totals: tile_totals,
        });
    }

    let tile = match options.tile {
        Some(tile_id) => Some(
            reader
                .read_tile(tile_id)?
                .ok_or_else(|| anyhow::anyhow!("tile {tile_id} is not in the map file"))?,
        ),
        None => None,
    };

    Ok(InspectReport {
        version: reader.header().version,
        tile_count: reader.header().tile_count,
        file_bytes: reader.file_len(),
        totals,
        by_category,
        by_geometry,
        labelled_features,
        tiles,
        tile,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileFailure {
    pub tile_id: TileId,
    pub offset: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub tile_count: u32,
    pub verified_tiles: u32,
    pub features: u64,
    pub failures: Vec<TileFailure>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn verify_map_file(path: &Path) -> Result<VerifyReport> {
    let mut reader = TileFileReader::open(path)?;
    let entries = reader.directory().to_vec();
    let data_start = FILE_HEADER_SIZE + entries.len() as u64 * DIRECTORY_ENTRY_SIZE;

    let mut report = VerifyReport {
        tile_count: reader.header().tile_count,
        ..VerifyReport::default()
    };
    let mut seen = HashSet::new();

    for entry in entries {
        let failure = |error: String| TileFailure {
            tile_id: entry.tile_id,
            offset: entry.offset,
            error,
        };
        if !seen.insert(entry.tile_id) {
            report.failures.push(failure("duplicate directory entry".to_string()));
            continue;
        }
        if entry.offset < data_start {
            report
                .failures
                .push(failure(format!("offset points into the file header (< {data_start})")));
            continue;
        }
        match reader.read_tile_at(entry) {
            Ok(tile) => {
                report.verified_tiles += 1;
                report.features += tile.features.len() as u64;
            }
            Err(err) => {
                warn!(tile_id = entry.tile_id, error = %err, "tile failed verification");
                report.failures.push(failure(format!("{err:#}")));
            }
        }
    }

    Ok(report)
}
