use std::io::Read;

use anyhow::Result;
use serde::Serialize;

use crate::assemble::FeatureRecord;
use crate::classify::RenderCategory;
use crate::error::CodecError;
use crate::model::{Coordinate, GeometryKind, Tag, TileId};

pub const FORMAT_VERSION: u64 = 1;

pub const FILE_HEADER_SIZE: u64 = 12;
pub const DIRECTORY_ENTRY_SIZE: u64 = 12;
pub const TILE_HEADER_SIZE: u64 = 40;
pub const FEATURE_RECORD_SIZE: u64 = 30;
pub const COORDINATE_SIZE: u64 = 16;
pub const DESCRIPTOR_SIZE: u64 = 8;
pub const CHARACTER_SIZE: u64 = 2;

/// Label field value for features without a display name.
pub const NO_LABEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub version: u64,
    pub tile_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub tile_id: TileId,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TileBlockHeader {
    pub feature_count: u32,
    pub coordinate_count: u32,
    pub descriptor_count: u32,
    pub character_count: u32,
    pub coordinates_offset: u64,
    pub descriptors_offset: u64,
    pub characters_offset: u64,
}

/// Byte offset of the back-patched block offset within a directory entry.
pub const DIRECTORY_OFFSET_FIELD: u64 = 4;

/// Byte offsets of the three back-patched fields within a tile block header.
pub const COORDINATES_OFFSET_FIELD: u64 = 16;
pub const DESCRIPTORS_OFFSET_FIELD: u64 = 24;
pub const CHARACTERS_OFFSET_FIELD: u64 = 32;

/// A run of UTF-16 code units in the character table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringDescriptor {
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFeature {
    pub id: i64,
    pub geometry: GeometryKind,
    pub category: RenderCategory,
    pub coordinates: Vec<Coordinate>,
    pub properties: Vec<Tag>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedTile {
    pub tile_id: TileId,
    pub features: Vec<DecodedFeature>,
}

impl FileHeader {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.tile_count.to_le_bytes());
    }

    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            version: read_u64(input)?,
            tile_count: read_u32(input)?,
        })
    }
}

impl DirectoryEntry {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.tile_id.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
    }

    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            tile_id: read_u32(input)?,
            offset: read_u64(input)?,
        })
    }
}

impl TileBlockHeader {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for value in [
            self.feature_count,
            self.coordinate_count,
            self.descriptor_count,
            self.character_count,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        for value in [
            self.coordinates_offset,
            self.descriptors_offset,
            self.characters_offset,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            feature_count: read_u32(input)?,
            coordinate_count: read_u32(input)?,
            descriptor_count: read_u32(input)?,
            character_count: read_u32(input)?,
            coordinates_offset: read_u64(input)?,
            descriptors_offset: read_u64(input)?,
            characters_offset: read_u64(input)?,
        })
    }
}

impl StringDescriptor {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.length.to_le_bytes());
    }

    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            offset: read_u32(input)?,
            length: read_u32(input)?,
        })
    }

    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.length)
    }
}

pub fn encode_feature_record(record: &FeatureRecord, buf: &mut Vec<u8>) {
    let label = record.label.map(|index| index as i32).unwrap_or(NO_LABEL);
    buf.extend_from_slice(&record.id.to_le_bytes());
    buf.extend_from_slice(&label.to_le_bytes());
    buf.push(record.geometry as u8);
    buf.push(record.category as u8);
    for value in [
        record.coordinate_start,
        record.coordinate_count,
        record.descriptor_start,
        record.property_count,
    ] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

pub fn decode_feature_record(input: &mut &[u8]) -> Result<FeatureRecord> {
    let id = read_i64(input)?;
    let label = match read_i32(input)? {
        NO_LABEL => None,
        index if index >= 0 => Some(index as u32),
        other => return Err(corrupt(format!("feature {id} has label index {other}"))),
    };
    let geometry_byte = read_u8(input)?;
    let geometry = GeometryKind::from_u8(geometry_byte)
        .ok_or_else(|| corrupt(format!("feature {id} has geometry kind {geometry_byte}")))?;
    let category_byte = read_u8(input)?;
    let category = RenderCategory::from_u8(category_byte)
        .ok_or_else(|| corrupt(format!("feature {id} has render category {category_byte}")))?;
    Ok(FeatureRecord {
        id,
        label,
        geometry,
        category,
        coordinate_start: read_u32(input)?,
        coordinate_count: read_u32(input)?,
        descriptor_start: read_u32(input)?,
        property_count: read_u32(input)?,
    })
}

pub fn encode_coordinate(coordinate: &Coordinate, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&coordinate.latitude.to_le_bytes());
    buf.extend_from_slice(&coordinate.longitude.to_le_bytes());
}

pub fn decode_coordinate(input: &mut &[u8]) -> Result<Coordinate> {
    Ok(Coordinate::new(read_f64(input)?, read_f64(input)?))
}

pub(crate) fn corrupt(message: impl Into<String>) -> anyhow::Error {
    CodecError::Corrupt(message.into()).into()
}

fn read_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    input
        .read_exact(&mut bytes)
        .map_err(|_| corrupt("unexpected end of data"))?;
    Ok(bytes)
}

pub fn read_u8(input: &mut &[u8]) -> Result<u8> {
    Ok(read_array::<1>(input)?[0])
}

pub fn read_u16(input: &mut &[u8]) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array(input)?))
}

pub fn read_u32(input: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(input)?))
}

pub fn read_i32(input: &mut &[u8]) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(input)?))
}

pub fn read_u64(input: &mut &[u8]) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(input)?))
}

pub fn read_i64(input: &mut &[u8]) -> Result<i64> {
    Ok(i64::from_le_bytes(read_array(input)?))
}

pub fn read_f64(input: &mut &[u8]) -> Result<f64> {
    Ok(f64::from_le_bytes(read_array(input)?))
}
