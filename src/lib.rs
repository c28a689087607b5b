#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Fiber-level fabric models from a base yarn pattern and a polyline.
//!
//! A yarn pattern (fibers around the z axis, periodic along z) is tiled to
//! the length of each polyline strand and bent along the strand using a
//! sequence of reference frames. See [`fabric::FabricMapper`] for the driver
//! and [`geom`] for the geometric building blocks.

pub mod error;
pub mod fabric;
pub mod geom;
pub mod parse;
pub mod source;

pub use error::{FabricError, FabricResult};
pub use fabric::{
    ConversionPaths, ConversionReport, ConvertOptions, FabricMapper, MAX_TILES, StrandAccumulator,
    convert_files, tile_file,
};
pub use parse::{FiberRecord, YarnConfig};
pub use source::{FilePattern, MemoryPattern, PatternSource};
