use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::CodecError;
use crate::model::{NodeId, RawNode, RawWay, SourceBlock, TileId};
use crate::tiling::TileScheme;

#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub nodes: BTreeMap<NodeId, RawNode>,
    pub ways: Vec<RawWay>,
}

#[derive(Debug, Default)]
pub struct BlockSink {
    nodes: DashMap<NodeId, RawNode>,
    ways: DashMap<u64, Vec<RawWay>>,
}

impl BlockSink {
    pub fn insert(&self, seq: u64, block: SourceBlock) {
        for node in block.nodes {
            // Last writer wins on duplicate ids.
            self.nodes.insert(node.id, node);
        }
        if !block.ways.is_empty() {
            self.ways.insert(seq, block.ways);
        }
    }

    pub fn finish(self) -> MapData {
        let nodes: BTreeMap<NodeId, RawNode> = self.nodes.into_iter().collect();
        let mut blocks: Vec<(u64, Vec<RawWay>)> = self.ways.into_iter().collect();
        blocks.sort_by_key(|(seq, _)| *seq);
        let ways = blocks.into_iter().flat_map(|(_, ways)| ways).collect();
        MapData { nodes, ways }
    }
}

impl MapData {
    pub fn from_blocks(blocks: Vec<SourceBlock>) -> Self {
        let sink = BlockSink::default();
        blocks
            .into_par_iter()
            .enumerate()
            .for_each(|(seq, block)| sink.insert(seq as u64, block));
        sink.finish()
    }

    pub fn node(&self, id: NodeId) -> Option<&RawNode> {
        self.nodes.get(&id)
    }

    pub fn partition<S: TileScheme + ?Sized>(&self, scheme: &S) -> Result<TileIndex> {
        let mut tiles: BTreeMap<TileId, TileMembers> = BTreeMap::new();
        for (id, node) in self.nodes.iter() {
            let tile_id = scheme.tile_of(node.coordinate());
            tiles.entry(tile_id).or_default().nodes.push(*id);
        }

        let mut used = HashSet::new();
        for (index, way) in self.ways.iter().enumerate() {
            let first = *way
                .nodes
                .first()
                .ok_or(CodecError::EmptyWay { way: way.id })?;
            for node_id in way.nodes.iter() {
                if !self.nodes.contains_key(node_id) {
                    return Err(CodecError::MissingNode {
                        way: way.id,
                        node: *node_id,
                    }
                    .into());
                }
                used.insert(*node_id);
            }
            let tile_id = scheme.tile_of(self.nodes[&first].coordinate());
            tiles.entry(tile_id).or_default().ways.push(index);
        }

        Ok(TileIndex { tiles, used })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileMembers {
    pub nodes: Vec<NodeId>,
    pub ways: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    pub tiles: BTreeMap<TileId, TileMembers>,
    pub used: HashSet<NodeId>,
}

impl TileIndex {
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_used(&self, node: NodeId) -> bool {
        self.used.contains(&node)
    }
}
