//! Readers and writers for the text formats the converter consumes.

mod config;
mod points;

pub use config::{ConfigError, YarnConfig};
pub use points::{FiberRecord, FiberRecords, RecordWriter, parse_line, parse_records};
