//! Restartable sources for the base fiber pattern.
//!
//! Tiling replays the pattern once per replica, so a source has to be
//! readable from the start any number of times. [`FilePattern`] re-opens its
//! file on every pass; [`MemoryPattern`] keeps the parsed records around.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::error::{FabricError, FabricResult};
use crate::parse::{FiberRecord, FiberRecords, parse_records};

/// Boxed stream of pattern records.
pub type RecordIter<'a> = Box<dyn Iterator<Item = FabricResult<FiberRecord>> + 'a>;

pub trait PatternSource {
    /// Name used in logs and error messages.
    fn label(&self) -> &str;

    /// Start a fresh pass over the pattern.
    fn records(&self) -> FabricResult<RecordIter<'_>>;
}

/// Pattern read from disk on every pass.
#[derive(Debug, Clone)]
pub struct FilePattern {
    path: PathBuf,
    label: String,
}

impl FilePattern {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

impl PatternSource for FilePattern {
    fn label(&self) -> &str {
        &self.label
    }

    fn records(&self) -> FabricResult<RecordIter<'_>> {
        let file = File::open(&self.path).map_err(|source| FabricError::Open {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("re-reading pattern {}", self.label);
        Ok(Box::new(FiberRecords::new(BufReader::new(file), self.label.as_str())))
    }
}

/// Pattern held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPattern {
    label: String,
    records: Vec<FiberRecord>,
}

impl MemoryPattern {
    pub fn new(label: impl Into<String>, records: Vec<FiberRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }

    /// Parse pattern text.
    pub fn parse(label: impl Into<String>, text: &str) -> Self {
        Self::new(label, parse_records(text))
    }

    /// Read a whole pattern from `reader`.
    pub fn from_reader<R: BufRead>(label: impl Into<String>, reader: R) -> FabricResult<Self> {
        let label = label.into();
        let records = FiberRecords::new(reader, label.as_str()).collect::<FabricResult<_>>()?;
        Ok(Self { label, records })
    }

    /// Drain one pass of another source into memory.
    pub fn load<S: PatternSource + ?Sized>(source: &S) -> FabricResult<Self> {
        let records = source.records()?.collect::<FabricResult<Vec<_>>>()?;
        log::debug!("cached {} records of {}", records.len(), source.label());
        Ok(Self::new(source.label(), records))
    }
}

impl PatternSource for MemoryPattern {
    fn label(&self) -> &str {
        &self.label
    }

    fn records(&self) -> FabricResult<RecordIter<'_>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}
