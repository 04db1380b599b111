pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;

pub use self::reader::*;
pub use self::stats::*;
pub use self::types::*;
pub use self::writer::*;
