//! Crate-level error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::geom::TileError;
use crate::parse::ConfigError;

/// Result type for every fallible operation of the converter.
pub type FabricResult<T> = Result<T, FabricError>;

/// Fatal failures of a conversion run. Malformed point lines are not errors;
/// they are strand breaks.
#[derive(Debug, Error)]
pub enum FabricError {
    /// An input file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    /// The output file could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },
    /// Reading from an already opened input failed.
    #[error("error reading {what}: {source}")]
    Read { what: String, source: io::Error },
    /// Writing or flushing the output failed.
    #[error("error writing {what}: {source}")]
    Write { what: String, source: io::Error },
    /// The yarn config is incomplete or holds an unusable value.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The tiling parameters are out of range.
    #[error(transparent)]
    Tile(#[from] TileError),
    /// A strand would need more pattern replicas than [`crate::fabric::MAX_TILES`].
    #[error("strand of length {length} needs more than {limit} pattern tiles")]
    TooManyTiles { length: f64, limit: usize },
    /// A numeric run parameter is out of range.
    #[error("invalid {name}: {value} (must be finite and > 0)")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl FabricError {
    pub(crate) fn read(what: &str, source: io::Error) -> Self {
        Self::Read {
            what: what.to_owned(),
            source,
        }
    }

    pub(crate) fn write(what: &str, source: io::Error) -> Self {
        Self::Write {
            what: what.to_owned(),
            source,
        }
    }
}
