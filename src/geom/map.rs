//! Mapping of yarn-space fiber points onto a strand's frames.
//!
//! A tiled point `(x, y, z)` is placed at arc length `z * scale` along the
//! strand, offset by `x * scale` along the frame normal and `y * scale` along
//! the binormal. Points whose arc length falls outside the frames are dropped.

use serde::Serialize;

use super::{FrameSequence, Point3};
use crate::error::FabricResult;
use crate::parse::FiberRecord;

/// Mapped/dropped counters of one or more mapping passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub mapped: usize,
    pub dropped: usize,
}

impl MapStats {
    pub fn merge(&mut self, other: Self) {
        self.mapped += other.mapped;
        self.dropped += other.dropped;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FiberMapper<'f> {
    frames: &'f FrameSequence,
    scale: f64,
}

impl<'f> FiberMapper<'f> {
    /// `scale` converts yarn units to fabric units (polyline radius over yarn
    /// radius).
    #[must_use]
    pub fn new(frames: &'f FrameSequence, scale: f64) -> Self {
        Self { frames, scale }
    }

    /// Fabric-space position of one yarn-space point, `None` when no frame
    /// interval contains its arc length.
    #[must_use]
    pub fn map_point(&self, local: Point3) -> Option<Point3> {
        let param = local.z * self.scale;
        self.frames
            .locate(param)
            .map(|frame| frame.place(local.x, local.y, param, self.scale))
    }

    /// Map a record stream lazily. Breaks pass through untouched.
    pub fn map<I>(self, records: I) -> MappedFiber<'f, I::IntoIter>
    where
        I: IntoIterator<Item = FabricResult<FiberRecord>>,
    {
        MappedFiber {
            mapper: self,
            inner: records.into_iter(),
            stats: MapStats::default(),
        }
    }
}

/// Iterator returned by [`FiberMapper::map`].
pub struct MappedFiber<'f, I> {
    mapper: FiberMapper<'f>,
    inner: I,
    stats: MapStats,
}

impl<I> MappedFiber<'_, I> {
    /// Counters for the records consumed so far.
    #[must_use]
    pub fn stats(&self) -> MapStats {
        self.stats
    }
}

impl<I> Iterator for MappedFiber<'_, I>
where
    I: Iterator<Item = FabricResult<FiberRecord>>,
{
    type Item = FabricResult<FiberRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(FiberRecord::Point(local)) => match self.mapper.map_point(local) {
                    Some(p) => {
                        self.stats.mapped += 1;
                        return Some(Ok(FiberRecord::Point(p)));
                    }
                    None => self.stats.dropped += 1,
                },
                other => return Some(other),
            }
        }
    }
}
