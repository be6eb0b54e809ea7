//! Shared utilities for the loft transformation engine.
mod errors;
mod id;
mod position;

pub use errors::{Error, LoftResult};
pub use id::{GSym, Id};
pub use position::{
    FileIdx, GPosIdx, GlobalPositionTable, PosIdx, PositionTable, WithPos,
};
