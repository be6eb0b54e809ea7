//! Transformations over loft IR trees: the validate/apply protocol, the
//! analyses they rely on, and the transformation implementations.
pub mod analysis;
pub mod transform;
pub mod transforms;

pub use transform::{
    default_registry, Named, Options, OptValue, Transformation,
    TransformRegistry, TransformStep,
};
