use std::fs;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::assemble::{TileBody, assemble_tile};
use crate::container::types::{
    CHARACTERS_OFFSET_FIELD, COORDINATES_OFFSET_FIELD, DESCRIPTORS_OFFSET_FIELD,
    DIRECTORY_OFFSET_FIELD, DirectoryEntry, FORMAT_VERSION, FileHeader, StringDescriptor,
    TileBlockHeader, encode_coordinate, encode_feature_record,
};
use crate::dataset::{MapData, TileIndex};
use crate::error::CodecError;
use crate::progress::progress_for_phase;

pub struct PatchWriter<W: Write + Seek> {
    inner: W,
}

impl<W: Write + Seek> PatchWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn position(&mut self) -> Result<u64> {
        self.inner.stream_position().context("query stream position")
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).context("write map data")
    }

    pub fn patch_u64(&mut self, slot: u64, value: u64) -> Result<()> {
        let resume = self.position()?;
        self.inner
            .seek(SeekFrom::Start(slot))
            .context("seek to patch slot")?;
        self.inner
            .write_all(&value.to_le_bytes())
            .context("write patched offset")?;
        self.inner
            .seek(SeekFrom::Start(resume))
            .context("seek back to end of data")?;
        Ok(())
    }

    pub fn patch_here(&mut self, slot: u64) -> Result<u64> {
        let here = self.position()?;
        self.patch_u64(slot, here)?;
        Ok(here)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("flush map data")
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodeSummary {
    pub tiles: u64,
    pub features: u64,
    pub coordinates: u64,
    pub properties: u64,
    pub characters: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    pub no_progress: bool,
}

pub fn encode_tiles<W: Write + Seek>(
    out: W,
    data: &MapData,
    index: &TileIndex,
    options: &EncodeOptions,
) -> Result<(W, EncodeSummary)> {
    let mut writer = PatchWriter::new(out);
    let tile_count =
        u32::try_from(index.tile_count()).map_err(|_| CodecError::Overflow("tile count"))?;

    let start = writer.position()?;
    let mut buf = Vec::new();
    FileHeader {
        version: FORMAT_VERSION,
        tile_count,
    }
    .encode(&mut buf);
    writer.write_all(&buf)?;

    let mut slots = Vec::with_capacity(index.tile_count());
    for tile_id in index.tiles.keys() {
        buf.clear();
        DirectoryEntry {
            tile_id: *tile_id,
            offset: 0,
        }
        .encode(&mut buf);
        slots.push(writer.position()? + DIRECTORY_OFFSET_FIELD);
        writer.write_all(&buf)?;
    }

    let mut summary = EncodeSummary {
        tiles: u64::from(tile_count),
        ..EncodeSummary::default()
    };
    let progress = progress_for_phase(
        "encoding",
        "tiles",
        Some(u64::from(tile_count)),
        options.no_progress,
    );

    for ((tile_id, members), slot) in index.tiles.iter().zip(slots) {
        let body = assemble_tile(data, index, *tile_id, members)
            .with_context(|| format!("assemble tile {tile_id}"))?;
        let offset = writer.patch_here(slot)?;
        let header = write_tile_body(&mut writer, &body)
            .with_context(|| format!("write tile {tile_id}"))?;
        debug!(tile_id, offset, features = header.feature_count, "wrote tile");

        summary.features += u64::from(header.feature_count);
        summary.coordinates += u64::from(header.coordinate_count);
        summary.properties += u64::from(header.descriptor_count / 2);
        summary.characters += u64::from(header.character_count);
        if let Some(progress) = progress.as_ref() {
            progress.inc(1);
        }
    }
    if let Some(progress) = progress {
        progress.finish();
    }

    writer.flush()?;
    summary.bytes = writer.position()? - start;
    Ok((writer.into_inner(), summary))
}

pub fn write_tile_body<W: Write + Seek>(
    writer: &mut PatchWriter<W>,
    body: &TileBody,
) -> Result<TileBlockHeader> {
    let character_count: usize = body
        .properties
        .iter()
        .map(|(key, value)| key.encode_utf16().count() + value.encode_utf16().count())
        .sum();

    let mut header = TileBlockHeader {
        feature_count: to_u32(body.features.len(), "feature count")?,
        coordinate_count: to_u32(body.coordinates.len(), "coordinate count")?,
        descriptor_count: to_u32(body.descriptor_count(), "descriptor count")?,
        character_count: to_u32(character_count, "character count")?,
        ..TileBlockHeader::default()
    };

    let block_start = writer.position()?;
    let mut buf = Vec::new();
    header.encode(&mut buf);
    writer.write_all(&buf)?;

    buf.clear();
    for record in body.features.iter() {
        encode_feature_record(record, &mut buf);
    }
    writer.write_all(&buf)?;

    header.coordinates_offset = writer.patch_here(block_start + COORDINATES_OFFSET_FIELD)?;
    buf.clear();
    for coordinate in body.coordinates.iter() {
        encode_coordinate(coordinate, &mut buf);
    }
    writer.write_all(&buf)?;

    header.descriptors_offset = writer.patch_here(block_start + DESCRIPTORS_OFFSET_FIELD)?;
    buf.clear();
    let mut units = 0u32;
    for (key, value) in body.properties.iter() {
        for text in [key, value] {
            let length = to_u32(text.encode_utf16().count(), "string length")?;
            StringDescriptor {
                offset: units,
                length,
            }
            .encode(&mut buf);
            units = units
                .checked_add(length)
                .ok_or(CodecError::Overflow("character offset"))?;
        }
    }
    writer.write_all(&buf)?;

    header.characters_offset = writer.patch_here(block_start + CHARACTERS_OFFSET_FIELD)?;
    buf.clear();
    for (key, value) in body.properties.iter() {
        for unit in key.encode_utf16().chain(value.encode_utf16()) {
            buf.extend_from_slice(&unit.to_le_bytes());
        }
    }
    writer.write_all(&buf)?;

    Ok(header)
}

fn to_u32(value: usize, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| CodecError::Overflow(what).into())
}

pub fn write_map_file(
    path: &Path,
    data: &MapData,
    index: &TileIndex,
    options: &EncodeOptions,
) -> Result<EncodeSummary> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

    let (out, summary) = encode_tiles(BufWriter::new(temp), data, index, options)?;
    let temp = out
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush map file")?;
    temp.persist(path)
        .with_context(|| format!("failed to write output map file: {}", path.display()))?;

    info!(
        path = %path.display(),
        tiles = summary.tiles,
        features = summary.features,
        bytes = summary.bytes,
        "wrote map file"
    );
    Ok(summary)
}
