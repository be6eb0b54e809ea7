//! Analyses shared by the transformations.
mod access;
mod symbolic;

pub use access::{Access, AccessInfo, AccessMode, Signature};
pub use symbolic::{equal, Equality};
