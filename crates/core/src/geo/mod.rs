//! Geographic primitives: bounding boxes, request validation and tiling.

mod bbox;
mod tiling;

pub use bbox::{AreaLimits, BoundingBox, Tile, ValidationError};
pub use tiling::{GridDimensions, TilePartitioner};
