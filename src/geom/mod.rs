mod core;
mod frame;
mod map;
mod tile;

pub use self::core::{Point3, Tolerance, Vec3};
pub use frame::{FrameBuilder, FrameSequence, FrameStats, ReferenceFrame, build_frames};
pub use map::{FiberMapper, MapStats, MappedFiber};
pub use tile::{TileError, TileParams, TiledPattern, tile};
