use thiserror::Error;

use crate::model::{NodeId, WayId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("way {way} references node {node} which is not in the node set")]
    MissingNode { way: WayId, node: NodeId },

    #[error("way {way} has no nodes")]
    EmptyWay { way: WayId },

    #[error("corrupt map file: {0}")]
    Corrupt(String),

    #[error("{0} does not fit in a 32-bit field")]
    Overflow(&'static str),

    #[error("zoom {0} is out of range (0..=15)")]
    InvalidZoom(u8),
}
