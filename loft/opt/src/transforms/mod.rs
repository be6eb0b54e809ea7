//! The transformations shipped with the default registry.
mod block_loop;
mod intrinsics;
mod loop_swap;
mod loop_tiling_2d;
mod region_extract;

pub use block_loop::BlockLoop;
pub use intrinsics::{AbsToCode, MinToCode, SignToCode, SumToCode};
pub use loop_swap::LoopSwap;
pub use loop_tiling_2d::LoopTiling2D;
pub use region_extract::RegionExtract;
