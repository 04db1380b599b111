use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

use crate::assemble::FeatureRecord;
use crate::container::types::{
    CHARACTER_SIZE, COORDINATE_SIZE, DESCRIPTOR_SIZE, DIRECTORY_ENTRY_SIZE, DecodedFeature,
    DecodedTile, DirectoryEntry, FEATURE_RECORD_SIZE, FILE_HEADER_SIZE, FORMAT_VERSION,
    FileHeader, StringDescriptor, TILE_HEADER_SIZE, TileBlockHeader, corrupt, decode_coordinate,
    decode_feature_record, read_u16,
};
use crate::model::{Coordinate, TileId};

#[derive(Debug)]
pub struct TileFileReader<R> {
    inner: R,
    len: u64,
    header: FileHeader,
    directory: Vec<DirectoryEntry>,
}

impl TileFileReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open map file: {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read map file: {}", path.display()))
    }
}

impl<R: Read + Seek> TileFileReader<R> {
    pub fn from_reader(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0)).context("seek end of map file")?;
        let mut reader = Self {
            inner,
            len,
            header: FileHeader {
                version: 0,
                tile_count: 0,
            },
            directory: Vec::new(),
        };

        let bytes = reader.read_range(0, FILE_HEADER_SIZE, "file header")?;
        let header = FileHeader::decode(&mut bytes.as_slice())?;
        if header.version != FORMAT_VERSION {
            anyhow::bail!("unsupported map file version: {}", header.version);
        }

        let bytes = reader.read_range(
            FILE_HEADER_SIZE,
            u64::from(header.tile_count) * DIRECTORY_ENTRY_SIZE,
            "tile directory",
        )?;
        let mut cursor = bytes.as_slice();
        let mut directory = Vec::with_capacity(header.tile_count as usize);
        for _ in 0..header.tile_count {
            directory.push(DirectoryEntry::decode(&mut cursor)?);
        }

        reader.header = header;
        reader.directory = directory;
        Ok(reader)
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    pub fn file_len(&self) -> u64 {
        self.len
    }

    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.directory.iter().map(|entry| entry.tile_id)
    }

    pub fn entry(&self, tile_id: TileId) -> Option<DirectoryEntry> {
        self.directory
            .iter()
            .find(|entry| entry.tile_id == tile_id)
            .copied()
    }

    pub fn read_tile(&mut self, tile_id: TileId) -> Result<Option<DecodedTile>> {
        match self.entry(tile_id) {
            Some(entry) => self.read_tile_at(entry).map(Some),
            None => Ok(None),
        }
    }

    pub fn read_block_header(&mut self, offset: u64) -> Result<TileBlockHeader> {
        let bytes = self.read_range(offset, TILE_HEADER_SIZE, "tile block header")?;
        TileBlockHeader::decode(&mut bytes.as_slice())
    }

    pub fn read_feature_records(
        &mut self,
        entry: DirectoryEntry,
    ) -> Result<(TileBlockHeader, Vec<FeatureRecord>)> {
        let header = self.read_block_header(entry.offset)?;
        let bytes = self.read_range(
            entry.offset + TILE_HEADER_SIZE,
            u64::from(header.feature_count) * FEATURE_RECORD_SIZE,
            "feature table",
        )?;
        let mut cursor = bytes.as_slice();
        let mut records = Vec::with_capacity(header.feature_count as usize);
        for _ in 0..header.feature_count {
            records.push(decode_feature_record(&mut cursor)?);
        }
        Ok((header, records))
    }

    pub fn read_tile_at(&mut self, entry: DirectoryEntry) -> Result<DecodedTile> {
        let (header, records) = self.read_feature_records(entry)?;

        let bytes = self.read_range(
            header.coordinates_offset,
            u64::from(header.coordinate_count) * COORDINATE_SIZE,
            "coordinate table",
        )?;
        let mut cursor = bytes.as_slice();
        let coordinates = (0..header.coordinate_count)
            .map(|_| decode_coordinate(&mut cursor))
            .collect::<Result<Vec<_>>>()?;

        let bytes = self.read_range(
            header.descriptors_offset,
            u64::from(header.descriptor_count) * DESCRIPTOR_SIZE,
            "string descriptor table",
        )?;
        let mut cursor = bytes.as_slice();
        let descriptors = (0..header.descriptor_count)
            .map(|_| StringDescriptor::decode(&mut cursor))
            .collect::<Result<Vec<_>>>()?;

        // Files that left the character count at zero still describe the
        // table through their descriptors.
        let character_count = if header.character_count == 0 {
            descriptors.iter().map(StringDescriptor::end).max().unwrap_or(0)
        } else {
            u64::from(header.character_count)
        };
        let bytes = self.read_range(
            header.characters_offset,
            character_count * CHARACTER_SIZE,
            "character table",
        )?;
        let mut cursor = bytes.as_slice();
        let units = (0..character_count)
            .map(|_| read_u16(&mut cursor))
            .collect::<Result<Vec<_>>>()?;

        let strings = descriptors
            .iter()
            .map(|descriptor| decode_string(&units, descriptor))
            .collect::<Result<Vec<_>>>()?;

        let pair_total: u64 = records.iter().map(|r| u64::from(r.property_count)).sum();
        if pair_total * 2 != u64::from(header.descriptor_count) {
            return Err(corrupt(format!(
                "tile {} declares {} descriptors but its features hold {} pairs",
                entry.tile_id, header.descriptor_count, pair_total
            )));
        }

        let features = records
            .iter()
            .map(|record| materialize(record, &coordinates, &strings))
            .collect::<Result<Vec<_>>>()?;

        Ok(DecodedTile {
            tile_id: entry.tile_id,
            features,
        })
    }

    fn read_range(&mut self, offset: u64, length: u64, what: &str) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(length)
            .ok_or_else(|| corrupt(format!("{what} range overflows")))?;
        if end > self.len {
            return Err(corrupt(format!(
                "{what} at {offset}..{end} extends past end of file ({})",
                self.len
            )));
        }
        self.inner
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {what}"))?;
        let mut buf = vec![0u8; length as usize];
        self.inner
            .read_exact(&mut buf)
            .with_context(|| format!("read {what}"))?;
        Ok(buf)
    }
}

fn decode_string(units: &[u16], descriptor: &StringDescriptor) -> Result<String> {
    let start = descriptor.offset as usize;
    let slice = units
        .get(start..start + descriptor.length as usize)
        .ok_or_else(|| corrupt("string descriptor outside character table"))?;
    String::from_utf16(slice).map_err(|_| corrupt("invalid UTF-16 in character table"))
}

fn materialize(
    record: &FeatureRecord,
    coordinates: &[Coordinate],
    strings: &[String],
) -> Result<DecodedFeature> {
    let start = record.coordinate_start as usize;
    let coordinates = coordinates
        .get(start..start + record.coordinate_count as usize)
        .ok_or_else(|| corrupt(format!("feature {} coordinates out of range", record.id)))?
        .to_vec();

    let start = record.descriptor_start as usize;
    let end = start + 2 * record.property_count as usize;
    let properties = strings
        .get(start..end)
        .ok_or_else(|| corrupt(format!("feature {} properties out of range", record.id)))?
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    let label = match record.label {
        Some(index) => Some(
            strings
                .get(index as usize)
                .cloned()
                .ok_or_else(|| corrupt(format!("feature {} label out of range", record.id)))?,
        ),
        None => None,
    };

    Ok(DecodedFeature {
        id: record.id,
        geometry: record.geometry,
        category: record.category,
        coordinates,
        properties,
        label,
    })
}
