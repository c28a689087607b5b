//! Yarn-to-fabric conversion driver.
//!
//! The polyline is streamed one record at a time. Points accumulate into the
//! current strand; a break (or the end of the input) finalizes it: the base
//! pattern is tiled to cover the strand, mapped onto its frames, and written
//! out, followed by the break text itself.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{FabricError, FabricResult};
use crate::geom::{
    FiberMapper, FrameBuilder, FrameSequence, FrameStats, MapStats, Point3, TileParams,
    TiledPattern,
};
use crate::parse::{FiberRecord, FiberRecords, RecordWriter, YarnConfig};
use crate::source::{FilePattern, MemoryPattern, PatternSource};

/// Upper bound on pattern replicas for a single strand.
pub const MAX_TILES: usize = 1 << 24;

/// State of the strand currently being read.
#[derive(Debug, Default)]
pub struct StrandAccumulator {
    builder: FrameBuilder,
    points: usize,
}

impl StrandAccumulator {
    pub fn push(&mut self, point: Point3) {
        self.points += 1;
        self.builder.push(point);
    }

    /// Points pushed since the last reset.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points
    }

    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.builder.arc_length()
    }

    /// Run-wide degenerate-geometry counters.
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.builder.stats()
    }

    /// Close the strand and start a new one.
    pub fn finish(&mut self) -> FrameSequence {
        self.points = 0;
        self.builder.take()
    }
}

/// Summary of a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Strands that were tiled and mapped.
    pub strands_mapped: usize,
    /// Strands with points but zero length.
    pub strands_skipped: usize,
    pub polyline_points: usize,
    pub frames_built: usize,
    /// Pattern replicas generated over all strands.
    pub tiles_generated: usize,
    /// Break lines copied from the polyline.
    pub breaks_echoed: usize,
    pub points: MapStats,
    pub frames: FrameStats,
}

impl ConversionReport {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "strands={} skipped={} frames={} tiles={} points written={} dropped={}",
            self.strands_mapped,
            self.strands_skipped,
            self.frames_built,
            self.tiles_generated,
            self.points.mapped,
            self.points.dropped
        )
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Maps a yarn pattern along every strand of a polyline.
#[derive(Debug, Clone, Copy)]
pub struct FabricMapper {
    config: YarnConfig,
    poly_radius: f64,
    tile: TileParams,
}

impl FabricMapper {
    /// `poly_radius` is the yarn radius the polyline is drawn for.
    pub fn new(config: YarnConfig, poly_radius: f64) -> FabricResult<Self> {
        if !(poly_radius.is_finite() && poly_radius > 0.0) {
            return Err(FabricError::InvalidParameter {
                name: "polyline radius",
                value: poly_radius,
            });
        }
        let tile = config.tile_params()?;
        Ok(Self {
            config,
            poly_radius,
            tile,
        })
    }

    /// Scale from yarn units to fabric units.
    #[must_use]
    pub fn yarn_to_fabric(&self) -> f64 {
        self.poly_radius / self.config.yarn_radius
    }

    #[must_use]
    pub fn fabric_to_yarn(&self) -> f64 {
        self.config.yarn_radius / self.poly_radius
    }

    /// Pattern replicas needed for a strand of the given fabric length.
    ///
    /// Fails for non-finite lengths and for counts above [`MAX_TILES`].
    pub fn tile_count(&self, arc_length: f64) -> FabricResult<usize> {
        let count = (arc_length * self.fabric_to_yarn()).ceil();
        if !(count.is_finite() && count <= MAX_TILES as f64) {
            return Err(FabricError::TooManyTiles {
                length: arc_length,
                limit: MAX_TILES,
            });
        }
        Ok(if count > 0.0 { count as usize } else { 0 })
    }

    /// Convert a polyline stream, writing mapped fibers to `out`.
    pub fn run<R, W, S>(
        &self,
        polyline: FiberRecords<R>,
        pattern: &S,
        out: &mut RecordWriter<W>,
    ) -> FabricResult<ConversionReport>
    where
        R: BufRead,
        W: Write,
        S: PatternSource + ?Sized,
    {
        let mut strand = StrandAccumulator::default();
        let mut report = ConversionReport::default();

        for record in polyline {
            match record? {
                FiberRecord::Point(p) => {
                    report.polyline_points += 1;
                    strand.push(p);
                }
                FiberRecord::Break(raw) => {
                    self.finalize(&mut strand, pattern, out, &mut report)?;
                    out.write(&FiberRecord::Break(raw))?;
                    report.breaks_echoed += 1;
                }
            }
        }
        self.finalize(&mut strand, pattern, out, &mut report)?;

        report.frames = strand.stats();
        Ok(report)
    }

    fn finalize<W, S>(
        &self,
        strand: &mut StrandAccumulator,
        pattern: &S,
        out: &mut RecordWriter<W>,
        report: &mut ConversionReport,
    ) -> FabricResult<()>
    where
        W: Write,
        S: PatternSource + ?Sized,
    {
        let points = strand.point_count();
        let frames = strand.finish();
        let length = frames.arc_length();
        report.frames_built += frames.len();

        if length <= 0.0 {
            if points > 0 {
                report.strands_skipped += 1;
                log::debug!("skipping strand of {points} point(s) with zero length");
            }
            return Ok(());
        }

        let count = self.tile_count(length)?;
        log::debug!(
            "strand: {points} points, {} frames, length {length}, {count} tiles",
            frames.len()
        );

        let tiled = TiledPattern::new(pattern, self.tile, count);
        let mut mapped = FiberMapper::new(&frames, self.yarn_to_fabric()).map(tiled);
        for record in mapped.by_ref() {
            out.write(&record?)?;
        }

        report.points.merge(mapped.stats());
        report.tiles_generated += count;
        report.strands_mapped += 1;
        log::info!("num polylines processed: {}", report.strands_mapped);
        Ok(())
    }
}

/// File locations of one conversion run.
#[derive(Debug, Clone, Copy)]
pub struct ConversionPaths<'a> {
    pub polyline: &'a Path,
    pub fiber: &'a Path,
    pub config: &'a Path,
    pub output: &'a Path,
}

/// Options of [`convert_files`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Load the fiber pattern once instead of re-reading it for every strand.
    pub cache_pattern: bool,
}

fn open_input(path: &Path) -> FabricResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| FabricError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn create_output(path: &Path) -> FabricResult<RecordWriter<BufWriter<File>>> {
    let file = File::create(path).map_err(|source| FabricError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RecordWriter::new(BufWriter::new(file), path.display().to_string()))
}

/// Full conversion between files.
pub fn convert_files(
    paths: ConversionPaths<'_>,
    poly_radius: f64,
    options: ConvertOptions,
) -> FabricResult<ConversionReport> {
    let config = YarnConfig::from_path(paths.config)?;
    let mapper = FabricMapper::new(config, poly_radius)?;
    log::info!(
        "yarn radius {}, polyline radius {poly_radius}: scale {}",
        config.yarn_radius,
        mapper.yarn_to_fabric()
    );

    let polyline = FiberRecords::new(
        open_input(paths.polyline)?,
        paths.polyline.display().to_string(),
    );
    let file_pattern = FilePattern::new(paths.fiber);
    // Fail on a missing pattern before touching the output.
    drop(file_pattern.records()?);

    let mut out = create_output(paths.output)?;
    let report = if options.cache_pattern {
        let cached = MemoryPattern::load(&file_pattern)?;
        mapper.run(polyline, &cached, &mut out)?
    } else {
        mapper.run(polyline, &file_pattern, &mut out)?
    };
    out.finish()?;
    Ok(report)
}

/// Tile a pattern file `count` times into `output`. Returns the number of
/// points written.
pub fn tile_file(
    fiber: &Path,
    count: usize,
    tile: TileParams,
    output: &Path,
) -> FabricResult<usize> {
    let pattern = FilePattern::new(fiber);
    drop(pattern.records()?);

    let mut out = create_output(output)?;
    for record in TiledPattern::new(&pattern, tile, count) {
        out.write(&record?)?;
    }
    let points = out.points_written();
    out.finish()?;
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config(yarn_radius: f64, step: f64, steps: f64) -> YarnConfig {
        YarnConfig {
            yarn_radius,
            z_step_size: step,
            z_step_num: steps,
        }
    }

    fn convert(mapper: &FabricMapper, polyline: &str, pattern: &str) -> (String, ConversionReport) {
        let pattern = MemoryPattern::parse("pattern", pattern);
        let mut out = RecordWriter::new(Vec::new(), "out");
        let report = mapper
            .run(FiberRecords::new(Cursor::new(polyline), "polyline"), &pattern, &mut out)
            .unwrap();
        let text = String::from_utf8(out.finish().unwrap()).unwrap();
        (text, report)
    }

    #[test]
    fn scale_factors() {
        let mapper = FabricMapper::new(config(0.5, 1.0, 1.0), 2.0).unwrap();
        assert_eq!(mapper.yarn_to_fabric(), 4.0);
        assert_eq!(mapper.fabric_to_yarn(), 0.25);
        assert_eq!(mapper.tile_count(10.0).unwrap(), 3);
        assert_eq!(mapper.tile_count(8.0).unwrap(), 2);
        assert_eq!(mapper.tile_count(0.0).unwrap(), 0);
    }

    #[test]
    fn unbounded_tile_counts_are_rejected() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 1.0), 1.0).unwrap();
        for length in [f64::INFINITY, f64::NAN, 1e300, (MAX_TILES + 1) as f64] {
            let err = mapper.tile_count(length).unwrap_err();
            assert!(matches!(err, FabricError::TooManyTiles { .. }), "{length}");
        }
        assert_eq!(mapper.tile_count(MAX_TILES as f64).unwrap(), MAX_TILES);
    }

    #[test]
    fn huge_strand_fails_instead_of_tiling_forever() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let pattern = MemoryPattern::parse("pattern", "0.5 0 0\n");
        let mut out = RecordWriter::new(Vec::new(), "out");
        let polyline = "0 0 0\n0 0 1e300\n";
        let err = mapper
            .run(FiberRecords::new(Cursor::new(polyline), "polyline"), &pattern, &mut out)
            .unwrap_err();
        assert!(matches!(err, FabricError::TooManyTiles { .. }));
    }

    #[test]
    fn infinite_coordinate_splits_the_strand() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let (text, report) = convert(&mapper, "0 0 0\n0 0 inf\n0 0 10\n", "0.5 0 0\n");
        assert!(text.contains("0 0 inf\n"), "{text:?}");
        // Both halves are single points.
        assert_eq!(report.breaks_echoed, 1);
        assert_eq!(report.strands_skipped, 2);
        assert_eq!(report.strands_mapped, 0);
    }

    #[test]
    fn non_utf8_separator_is_echoed() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let pattern = MemoryPattern::parse("pattern", "0.5 0 0\n");
        let polyline: &[u8] = b"0 0 0\n0 0 10\n# fibre \xe9\n1 1 1\n1 1 5\n";
        let mut out = RecordWriter::new(Vec::new(), "out");
        let report = mapper
            .run(FiberRecords::new(Cursor::new(polyline), "polyline"), &pattern, &mut out)
            .unwrap();
        assert_eq!(report.breaks_echoed, 1);
        assert_eq!(report.strands_mapped, 2);
        let bytes = out.finish().unwrap();
        assert!(bytes.windows(10).any(|w| w == b"# fibre \xe9\n"));
    }

    #[test]
    fn rejects_bad_polyline_radius() {
        for radius in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            let err = FabricMapper::new(config(1.0, 1.0, 1.0), radius).unwrap_err();
            assert!(matches!(err, FabricError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn rejects_bad_tile_config() {
        let err = FabricMapper::new(config(1.0, 0.0, 1.0), 1.0).unwrap_err();
        assert!(matches!(err, FabricError::Tile(_)));
    }

    #[test]
    fn straight_strand_maps_single_point() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let (text, report) = convert(&mapper, "0 0 0\n0 0 10\n", "0.5 0 0\n");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1, "{text}");

        let coords: Vec<f64> = lines[0].split(' ').map(|t| t.parse().unwrap()).collect();
        assert!((coords[2] - 5.0).abs() < 1e-9);
        assert!(((coords[0].powi(2) + coords[1].powi(2)).sqrt() - 0.5).abs() < 1e-9);

        assert_eq!(report.strands_mapped, 1);
        assert_eq!(report.tiles_generated, 10);
        assert_eq!(report.points, MapStats { mapped: 1, dropped: 9 });
    }

    #[test]
    fn zero_length_strand_only_echoes_separator() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let (text, report) = convert(&mapper, "0 0 0\n0 0 10\n\n3 3 3\n3 3 3\n", "0.5 0 0\n");
        assert_eq!(text.matches('\n').count(), 2);
        assert!(text.ends_with("\n\n"), "{text:?}");
        assert_eq!(report.strands_mapped, 1);
        assert_eq!(report.strands_skipped, 1);
        assert_eq!(report.breaks_echoed, 1);
        assert_eq!(report.polyline_points, 4);
        assert_eq!(report.frames_built, 2);
        assert_eq!(report.frames.degenerate_segments, 1);
    }

    #[test]
    fn break_text_is_copied_verbatim() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let polyline = "strand A\n0 0 0\n0 0 10\n-- next --\n\n5 5 5";
        let (text, report) = convert(&mapper, polyline, "0.5 0 0\n");
        assert!(text.starts_with("strand A\n"));
        assert!(text.ends_with("-- next --\n\n"), "{text:?}");
        assert_eq!(report.breaks_echoed, 3);
    }

    #[test]
    fn pattern_breaks_follow_mapped_points() {
        let mapper = FabricMapper::new(config(1.0, 1.0, 10.0), 1.0).unwrap();
        let (text, _) = convert(&mapper, "0 0 0\n0 0 10\n", "0.5 0 0\n\n");
        // One blank line per replica, whether or not its point survived.
        assert_eq!(text.lines().filter(|l| l.is_empty()).count(), 10);
        assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 1);
    }

    #[test]
    fn strand_accumulator_resets() {
        let mut strand = StrandAccumulator::default();
        strand.push(Point3::ORIGIN);
        strand.push(Point3::new(0.0, 3.0, 4.0));
        assert_eq!(strand.point_count(), 2);
        assert!((strand.arc_length() - 5.0).abs() < 1e-12);

        let frames = strand.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(strand.point_count(), 0);
        assert_eq!(strand.arc_length(), 0.0);
        assert!(strand.finish().is_empty());
    }

    #[test]
    fn report_summary_lists_counts() {
        let report = ConversionReport {
            strands_mapped: 2,
            tiles_generated: 7,
            ..ConversionReport::default()
        };
        assert!(report.to_string().starts_with("strands=2 skipped=0"));
        assert!(report.summary().contains("tiles=7"));
    }
}
