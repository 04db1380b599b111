use anyhow::Result;
use tracing::debug;

use crate::classify::{RenderCategory, classify};
use crate::dataset::{MapData, TileIndex, TileMembers};
use crate::error::CodecError;
use crate::model::{Coordinate, GeometryKind, RawWay, Tag, TileId};

pub const LABEL_KEY: &str = "name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRecord {
    pub id: i64,
    pub label: Option<u32>,
    pub geometry: GeometryKind,
    pub category: RenderCategory,
    pub coordinate_start: u32,
    pub coordinate_count: u32,
    pub descriptor_start: u32,
    pub property_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileBody {
    pub tile_id: TileId,
    pub features: Vec<FeatureRecord>,
    pub coordinates: Vec<Coordinate>,
    pub properties: Vec<Tag>,
}

impl TileBody {
    pub fn new(tile_id: TileId) -> Self {
        Self {
            tile_id,
            ..Self::default()
        }
    }

    pub fn descriptor_count(&self) -> usize {
        self.properties.len() * 2
    }

    pub fn push_feature(
        &mut self,
        id: i64,
        geometry: GeometryKind,
        category: RenderCategory,
        coordinates: Vec<Coordinate>,
        properties: Vec<Tag>,
    ) -> Result<()> {
        let prior_pairs = to_u32(self.properties.len(), "property count")?;
        let label = properties
            .iter()
            .position(|(key, _)| key == LABEL_KEY)
            .map(|index| label_index(prior_pairs, index))
            .transpose()?;

        let record = FeatureRecord {
            id,
            label,
            geometry,
            category,
            coordinate_start: to_u32(self.coordinates.len(), "coordinate index")?,
            coordinate_count: to_u32(coordinates.len(), "coordinate count")?,
            descriptor_start: prior_pairs
                .checked_mul(2)
                .ok_or(CodecError::Overflow("descriptor index"))?,
            property_count: to_u32(properties.len(), "property count")?,
        };

        self.features.push(record);
        self.coordinates.extend(coordinates);
        self.properties.extend(properties);
        Ok(())
    }
}

fn label_index(prior_pairs: u32, index: usize) -> Result<u32> {
    let label = 2 * u64::from(prior_pairs) + 2 * index as u64 + 1;
    if label > i32::MAX as u64 {
        return Err(CodecError::Overflow("label index").into());
    }
    Ok(label as u32)
}

fn to_u32(value: usize, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| CodecError::Overflow(what).into())
}

fn way_geometry_and_tags(data: &MapData, way: &RawWay) -> Result<(Vec<Coordinate>, Vec<Tag>)> {
    let mut tags = way.tags.clone();
    let mut coordinates = Vec::with_capacity(way.nodes.len());
    for node_id in way.nodes.iter() {
        let node = data.node(*node_id).ok_or(CodecError::MissingNode {
            way: way.id,
            node: *node_id,
        })?;
        for (key, value) in node.tags.iter() {
            if !tags.iter().any(|(existing, _)| existing == key) {
                tags.push((key.clone(), value.clone()));
            }
        }
        coordinates.push(node.coordinate());
    }
    Ok((coordinates, tags))
}

pub fn way_geometry(coordinates: &[Coordinate]) -> GeometryKind {
    match (coordinates.first(), coordinates.last()) {
        (Some(first), Some(last)) if first.same_bits(last) => GeometryKind::Polygon,
        _ => GeometryKind::Polyline,
    }
}

pub fn assemble_tile(
    data: &MapData,
    index: &TileIndex,
    tile_id: TileId,
    members: &TileMembers,
) -> Result<TileBody> {
    let mut body = TileBody::new(tile_id);

    for way_index in members.ways.iter() {
        let way = &data.ways[*way_index];
        if way.nodes.is_empty() {
            return Err(CodecError::EmptyWay { way: way.id }.into());
        }
        let (coordinates, tags) = way_geometry_and_tags(data, way)?;
        let geometry = way_geometry(&coordinates);
        let (category, residual) = classify(tags);
        body.push_feature(way.id, geometry, category, coordinates, residual)?;
    }
    let way_features = body.features.len();

    for node_id in members.nodes.iter() {
        if index.is_used(*node_id) {
            continue;
        }
        let Some(node) = data.node(*node_id) else {
            continue;
        };
        let (category, residual) = classify(node.tags.clone());
        body.push_feature(
            node.id,
            GeometryKind::Point,
            category,
            vec![node.coordinate()],
            residual,
        )?;
    }

    debug!(
        tile_id,
        way_features,
        node_features = body.features.len() - way_features,
        coordinates = body.coordinates.len(),
        properties = body.properties.len(),
        "assembled tile"
    );
    Ok(body)
}
