use crate::container::{DecodedTile, EncodeSummary, InspectReport, VerifyReport};

pub fn build_summary_line(summary: &EncodeSummary) -> String {
    format!(
        "tiles: {} features: {} coordinates: {} properties: {} characters: {} bytes: {}",
        summary.tiles,
        summary.features,
        summary.coordinates,
        summary.properties,
        summary.characters,
        summary.bytes
    )
}

pub fn inspect_text_lines(report: &InspectReport) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "version: {} tiles: {} file_bytes: {}",
        report.version, report.tile_count, report.file_bytes
    ));
    lines.push(format!(
        "features: {} coordinates: {} properties: {} characters: {} labelled: {}",
        report.totals.features,
        report.totals.coordinates,
        report.totals.properties,
        report.totals.characters,
        report.labelled_features
    ));

    if !report.by_geometry.is_empty() {
        lines.push("geometry:".to_string());
        for (geometry, count) in report.by_geometry.iter() {
            lines.push(format!("  {geometry}: {count}"));
        }
    }
    if !report.by_category.is_empty() {
        lines.push("category:".to_string());
        for (category, count) in report.by_category.iter() {
            lines.push(format!("  {}: {count}", category.as_str()));
        }
    }

    if let Some(tile) = report.tile.as_ref() {
        lines.extend(tile_text_lines(tile));
    } else if !report.tiles.is_empty() {
        lines.push("tiles:".to_string());
        for tile in report.tiles.iter() {
            let (z, x, y) = tile.zxy;
            lines.push(format!(
                "  id={} z={z} x={x} y={y} offset={} features={} coordinates={} properties={}",
                tile.tile_id,
                tile.offset,
                tile.totals.features,
                tile.totals.coordinates,
                tile.totals.properties
            ));
        }
    }
    lines
}

pub fn tile_text_lines(tile: &DecodedTile) -> Vec<String> {
    let mut lines = vec![format!(
        "tile: {} features: {}",
        tile.tile_id,
        tile.features.len()
    )];
    for feature in tile.features.iter() {
        let label = feature.label.as_deref().unwrap_or("-");
        lines.push(format!(
            "  {} {} {} coords={} label={label}",
            feature.id,
            feature.geometry.as_str(),
            feature.category.as_str(),
            feature.coordinates.len()
        ));
        for (key, value) in feature.properties.iter() {
            lines.push(format!("    {key}={value}"));
        }
    }
    lines
}

pub fn verify_text_lines(report: &VerifyReport) -> Vec<String> {
    let mut lines = vec![format!(
        "tiles: {} verified: {} failed: {} features: {}",
        report.tile_count,
        report.verified_tiles,
        report.failures.len(),
        report.features
    )];
    for failure in report.failures.iter() {
        lines.push(format!(
            "  tile {} at {}: {}",
            failure.tile_id, failure.offset, failure.error
        ));
    }
    lines
}
