//! Reference frames along a polyline strand.
//!
//! One frame is created per segment. The first frame picks an arbitrary normal
//! perpendicular to the tangent; every later frame derives its normal from the
//! previous binormal (`n_i = b_{i-1} × t_i`), which keeps the frames from
//! spinning around the strand the way per-segment Frenet frames would. It is
//! an approximation of a rotation-minimizing frame, not an exact one.
//!
//! Each frame also carries the arc length at which its segment starts. The
//! resulting [`FrameSequence`] maps an arc-length parameter back to the frame
//! of the segment that contains it.

use serde::Serialize;

use super::{Point3, Tolerance, Vec3};

/// Orthonormal frame anchored at the start of one polyline segment.
///
/// The axes are unit length except when the segment (or an axis derived from
/// it) is shorter than [`Tolerance::FRAME`]; such vectors are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceFrame {
    /// Direction of the segment.
    pub tangent: Vec3,
    /// Cross-section x axis.
    pub normal: Vec3,
    /// Cross-section y axis.
    pub binormal: Vec3,
    /// Start point of the segment.
    pub origin: Point3,
    /// Arc length of the strand at `origin`.
    pub parametric: f64,
}

impl ReferenceFrame {
    /// Place a yarn-space cross-section offset `(x, y)` at arc length `param`.
    ///
    /// The offset is scaled by `scale`; the anchor slides from `origin` along
    /// the tangent by `param - parametric`.
    #[must_use]
    pub fn place(&self, x: f64, y: f64, param: f64, scale: f64) -> Point3 {
        let anchor = self.origin + self.tangent * (param - self.parametric);
        anchor + self.normal * (x * scale) + self.binormal * (y * scale)
    }
}

/// Which axis was solved for when the first normal was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NormalAxis {
    Z,
    Fallback(usize),
    ZeroTangent,
}

/// Normal of the first frame of a strand: `n = (1, 1, k)` with `k` solved so
/// that `n · t = 0`.
///
/// The solved component is z whenever `|t.z|` is at least `tol.eps`. For
/// tangents lying (nearly) in the XY plane the component with the largest
/// magnitude is solved instead, and a zero tangent gets the X axis.
fn initial_normal(tangent: Vec3, tol: Tolerance) -> (Vec3, NormalAxis) {
    let t = tangent.to_array();
    let axis = if t[2].abs() >= tol.eps {
        2
    } else {
        let abs = tangent.abs().to_array();
        // `max_by` keeps the last maximum; reversed, ties go to the lower axis.
        (0..3)
            .rev()
            .max_by(|&a, &b| abs[a].total_cmp(&abs[b]))
            .unwrap_or(0)
    };

    if t[axis] == 0.0 {
        return (Vec3::X, NormalAxis::ZeroTangent);
    }

    let mut n = [1.0; 3];
    let others: f64 = (0..3).filter(|&i| i != axis).map(|i| t[i]).sum();
    n[axis] = -others / t[axis];

    let kind = if axis == 2 {
        NormalAxis::Z
    } else {
        NormalAxis::Fallback(axis)
    };
    (Vec3::from(n).normalize_or_keep(tol), kind)
}

/// Frames of one strand plus the strand's total arc length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSequence {
    frames: Vec<ReferenceFrame>,
    end: f64,
}

impl FrameSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn frames(&self) -> &[ReferenceFrame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total arc length of the strand; the exclusive upper bound of the last
    /// frame's interval.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.end
    }

    /// Parameter range `[start, end)` covered by the frames, if any.
    #[must_use]
    pub fn domain(&self) -> Option<(f64, f64)> {
        self.frames.first().map(|f| (f.parametric, self.end))
    }

    /// Frame `i` with `frames[i].parametric <= param < frames[i + 1].parametric`
    /// (the strand length closes the last interval).
    ///
    /// `None` when `param` lies outside every interval, including NaN.
    #[must_use]
    pub fn locate(&self, param: f64) -> Option<&ReferenceFrame> {
        let idx = self.frames.partition_point(|f| f.parametric <= param);
        if idx == 0 {
            return None;
        }
        let upper = self.frames.get(idx).map_or(self.end, |f| f.parametric);
        if param < upper {
            self.frames.get(idx - 1)
        } else {
            None
        }
    }
}

/// Counters for degenerate input seen while building frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Segments shorter than the frame tolerance.
    pub degenerate_segments: usize,
    /// First frames whose normal could not be solved on the z axis.
    pub normal_fallbacks: usize,
}

/// Incremental frame construction for one strand.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    tol: Tolerance,
    prev: Option<Point3>,
    arc_length: f64,
    frames: Vec<ReferenceFrame>,
    stats: FrameStats,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(Tolerance::FRAME)
    }

    #[must_use]
    pub fn with_tolerance(tol: Tolerance) -> Self {
        Self {
            tol,
            prev: None,
            arc_length: 0.0,
            frames: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    /// Append the next strand point. Every point after the first closes a
    /// segment and adds one frame.
    pub fn push(&mut self, point: Point3) {
        let Some(prev) = self.prev.replace(point) else {
            return;
        };

        let segment = point - prev;
        let length = segment.length();
        if self.tol.is_degenerate_length(length) {
            self.stats.degenerate_segments += 1;
            log::warn!(
                "degenerate segment of length {length:e} at ({prev}); tangent left un-normalized"
            );
        }

        let tangent = segment.normalize_or_keep(self.tol);
        let (normal, binormal) = match self.frames.last() {
            None => {
                let (normal, axis) = initial_normal(tangent, self.tol);
                match axis {
                    NormalAxis::Z => {}
                    NormalAxis::Fallback(solved) => {
                        self.stats.normal_fallbacks += 1;
                        log::warn!(
                            "first tangent has t.z ~ 0; solving normal on axis {solved} instead"
                        );
                    }
                    NormalAxis::ZeroTangent => {
                        self.stats.normal_fallbacks += 1;
                        log::warn!("first tangent is zero; using the X axis as normal");
                    }
                }
                (normal, tangent.cross(normal).normalize_or_keep(self.tol))
            }
            Some(last) => {
                let normal = last.binormal.cross(tangent).normalize_or_keep(self.tol);
                (normal, tangent.cross(normal).normalize_or_keep(self.tol))
            }
        };

        self.frames.push(ReferenceFrame {
            tangent,
            normal,
            binormal,
            origin: prev,
            parametric: self.arc_length,
        });
        self.arc_length += length;
    }

    /// Arc length accumulated so far.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.arc_length
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Hand out the finished sequence and reset for the next strand.
    ///
    /// Degenerate-input counters are kept; they describe the whole run.
    pub fn take(&mut self) -> FrameSequence {
        self.prev = None;
        let end = std::mem::take(&mut self.arc_length);
        FrameSequence {
            frames: std::mem::take(&mut self.frames),
            end,
        }
    }

    #[must_use]
    pub fn finish(mut self) -> FrameSequence {
        self.take()
    }
}

/// Build the frame sequence of a complete strand.
#[must_use]
pub fn build_frames(points: &[Point3]) -> FrameSequence {
    let mut builder = FrameBuilder::new();
    for &p in points {
        builder.push(p);
    }
    builder.finish()
}
