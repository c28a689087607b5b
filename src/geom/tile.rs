//! Periodic tiling of a base fiber pattern along the yarn axis.
//!
//! Replica `k` shifts every pattern point by
//! `offset + k * period - z_step_size * k`, with
//! `period = z_step_size * z_step_num` and `offset = period / 2`. Replicas are
//! emitted from `k = count - 1` down to `0`; break records are repeated once
//! per replica.

use thiserror::Error;

use crate::error::FabricResult;
use crate::parse::FiberRecord;
use crate::source::{PatternSource, RecordIter};

#[derive(Debug, Error)]
pub enum TileError {
    #[error("z step size must be finite and > 0 (got {0})")]
    InvalidStepSize(f64),
    #[error("z step count must be finite and >= 0 (got {0})")]
    InvalidStepCount(f64),
}

/// Geometry of one pattern period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileParams {
    step_size: f64,
    step_count: f64,
}

impl TileParams {
    pub fn new(step_size: f64, step_count: f64) -> Result<Self, TileError> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(TileError::InvalidStepSize(step_size));
        }
        if !(step_count.is_finite() && step_count >= 0.0) {
            return Err(TileError::InvalidStepCount(step_count));
        }
        Ok(Self {
            step_size,
            step_count,
        })
    }

    /// Length of one pattern period along z.
    #[must_use]
    pub fn period(self) -> f64 {
        self.step_size * self.step_count
    }

    /// Shift applied to every replica on top of its own placement.
    #[must_use]
    pub fn offset(self) -> f64 {
        0.5 * self.step_count * self.step_size
    }

    /// Total z shift of replica `k`.
    #[must_use]
    pub fn shift(self, k: usize) -> f64 {
        let k = k as f64;
        self.offset() + k * self.period() - self.step_size * k
    }
}

/// Lazy tiled record stream; re-reads the source once per replica.
///
/// A failure to open or read the source is yielded once and ends the stream.
pub struct TiledPattern<'a, S: PatternSource + ?Sized> {
    source: &'a S,
    params: TileParams,
    remaining: usize,
    current: Option<(f64, RecordIter<'a>)>,
}

impl<'a, S: PatternSource + ?Sized> TiledPattern<'a, S> {
    pub fn new(source: &'a S, params: TileParams, count: usize) -> Self {
        log::debug!(
            "tiling {} x{count} (period {}, offset {})",
            source.label(),
            params.period(),
            params.offset()
        );
        Self {
            source,
            params,
            remaining: count,
            current: None,
        }
    }

    /// Replicas not yet started.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S: PatternSource + ?Sized> Iterator for TiledPattern<'_, S> {
    type Item = FabricResult<FiberRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((shift, records)) = self.current.as_mut() {
                let shift = *shift;
                match records.next() {
                    Some(Ok(FiberRecord::Point(p))) => {
                        return Some(Ok(FiberRecord::Point(p.with_z(p.z + shift))));
                    }
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(err)) => {
                        self.current = None;
                        self.remaining = 0;
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }

            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            match self.source.records() {
                Ok(records) => self.current = Some((self.params.shift(self.remaining), records)),
                Err(err) => {
                    self.remaining = 0;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Tile `source` `count` times.
pub fn tile<S: PatternSource + ?Sized>(
    source: &S,
    count: usize,
    step_size: f64,
    step_count: f64,
) -> Result<TiledPattern<'_, S>, TileError> {
    Ok(TiledPattern::new(source, TileParams::new(step_size, step_count)?, count))
}
