pub mod assemble;
pub mod build;
pub mod classify;
pub mod cli;
pub mod container;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod model;
pub mod output;
pub mod progress;
pub mod tiling;

pub use crate::error::CodecError;
