//! Line-oriented point files.
//!
//! Every line holding exactly three finite numbers is a point. Anything else,
//! blank lines and non-UTF-8 text included, separates strands and is kept
//! byte for byte (line terminator included) so it can be echoed into the
//! output.

use std::io::{BufRead, Write};

use crate::error::{FabricError, FabricResult};
use crate::geom::Point3;

/// One line of a point file.
#[derive(Debug, Clone, PartialEq)]
pub enum FiberRecord {
    Point(Point3),
    /// Raw separator bytes, terminator included.
    Break(Vec<u8>),
}

impl FiberRecord {
    #[must_use]
    pub fn as_point(&self) -> Option<Point3> {
        match self {
            Self::Point(p) => Some(*p),
            Self::Break(_) => None,
        }
    }

    #[must_use]
    pub fn is_break(&self) -> bool {
        matches!(self, Self::Break(_))
    }
}

fn parse_coord(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Classify a single raw line.
///
/// `inf` and `nan` tokens do not make a point; such lines are breaks.
#[must_use]
pub fn parse_line(line: &[u8]) -> FiberRecord {
    if let Ok(text) = std::str::from_utf8(line) {
        let mut tokens = text.split_whitespace();
        let coords = (tokens.next(), tokens.next(), tokens.next(), tokens.next());
        if let (Some(x), Some(y), Some(z), None) = coords {
            if let (Some(x), Some(y), Some(z)) =
                (parse_coord(x), parse_coord(y), parse_coord(z))
            {
                return FiberRecord::Point(Point3::new(x, y, z));
            }
        }
    }
    FiberRecord::Break(line.to_vec())
}

/// Lazy record stream over a reader.
///
/// Stops after the first I/O error.
#[derive(Debug)]
pub struct FiberRecords<R> {
    reader: R,
    what: String,
    line: Vec<u8>,
    done: bool,
}

impl<R: BufRead> FiberRecords<R> {
    /// `what` names the source in error messages.
    pub fn new(reader: R, what: impl Into<String>) -> Self {
        Self {
            reader,
            what: what.into(),
            line: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for FiberRecords<R> {
    type Item = FabricResult<FiberRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.line.clear();
        match self.reader.read_until(b'\n', &mut self.line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(parse_line(&self.line))),
            Err(err) => {
                self.done = true;
                Some(Err(FabricError::read(&self.what, err)))
            }
        }
    }
}

/// Parse a whole in-memory point file.
#[must_use]
pub fn parse_records(text: impl AsRef<[u8]>) -> Vec<FiberRecord> {
    text.as_ref()
        .split_inclusive(|&b| b == b'\n')
        .map(parse_line)
        .collect()
}

/// Serializes records in the point-file format and counts what went out.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    what: String,
    points: usize,
    breaks: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W, what: impl Into<String>) -> Self {
        Self {
            inner,
            what: what.into(),
            points: 0,
            breaks: 0,
        }
    }

    pub fn write(&mut self, record: &FiberRecord) -> FabricResult<()> {
        let result = match record {
            FiberRecord::Point(p) => {
                self.points += 1;
                writeln!(self.inner, "{p}")
            }
            FiberRecord::Break(raw) => {
                self.breaks += 1;
                self.inner.write_all(raw)
            }
        };
        result.map_err(|err| FabricError::write(&self.what, err))
    }

    #[must_use]
    pub fn points_written(&self) -> usize {
        self.points
    }

    #[must_use]
    pub fn breaks_written(&self) -> usize {
        self.breaks
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> FabricResult<W> {
        self.inner
            .flush()
            .map_err(|err| FabricError::write(&self.what, err))?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    #[test]
    fn three_numbers_make_a_point() {
        assert_eq!(
            parse_line(b"1 -2.5 3e2\n"),
            FiberRecord::Point(Point3::new(1.0, -2.5, 300.0))
        );
        assert_eq!(
            parse_line(b"\t0.5   0  0 \r\n"),
            FiberRecord::Point(Point3::new(0.5, 0.0, 0.0))
        );
    }

    #[test]
    fn anything_else_is_a_verbatim_break() {
        for raw in ["\n", "", "1 2\n", "1 2 3 4\n", "a b c\n", "fiber 12\n", "1 2 x"] {
            let raw = raw.as_bytes();
            assert_eq!(parse_line(raw), FiberRecord::Break(raw.to_vec()), "{raw:?}");
        }
    }

    #[test]
    fn non_finite_coordinates_are_breaks() {
        for raw in ["0 0 inf\n", "nan 1 2\n", "1 -inf 0\n", "0 0 1e400\n"] {
            assert!(parse_line(raw.as_bytes()).is_break(), "{raw:?}");
        }
    }

    #[test]
    fn non_utf8_separator_is_kept_byte_for_byte() {
        let text: &[u8] = b"0 0 0\n# fibre \xe9\n1 1 1\n";
        let records: Vec<_> = FiberRecords::new(Cursor::new(text), "latin1")
            .collect::<FabricResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], FiberRecord::Break(b"# fibre \xe9\n".to_vec()));
        assert_eq!(records, parse_records(text));

        let mut writer = RecordWriter::new(Vec::new(), "out");
        writer.write(&records[1]).unwrap();
        assert_eq!(writer.finish().unwrap(), b"# fibre \xe9\n");
    }

    #[test]
    fn reader_keeps_terminators_on_breaks() {
        let text = "0 0 0\n\n1 1 1\n# end";
        let records: Vec<_> = FiberRecords::new(Cursor::new(text), "test")
            .collect::<FabricResult<_>>()
            .unwrap();
        assert_eq!(
            records,
            vec![
                FiberRecord::Point(Point3::new(0.0, 0.0, 0.0)),
                FiberRecord::Break(b"\n".to_vec()),
                FiberRecord::Point(Point3::new(1.0, 1.0, 1.0)),
                FiberRecord::Break(b"# end".to_vec()),
            ]
        );
        assert_eq!(records, parse_records(text));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn read_errors_name_the_source_and_stop_the_stream() {
        let mut records = FiberRecords::new(io::BufReader::new(FailingReader), "fiber.txt");
        let err = records.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("fiber.txt"), "{err}");
        assert!(records.next().is_none());
    }

    #[test]
    fn writer_formats_points_and_echoes_breaks() {
        let mut writer = RecordWriter::new(Vec::new(), "out");
        writer
            .write(&FiberRecord::Point(Point3::new(1.0, 0.5, -2.0)))
            .unwrap();
        writer.write(&FiberRecord::Break(b"\n".to_vec())).unwrap();
        writer.write(&FiberRecord::Break(b"-- fiber --\n".to_vec())).unwrap();
        assert_eq!(writer.points_written(), 1);
        assert_eq!(writer.breaks_written(), 2);

        let bytes = writer.finish().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1.0 0.5 -2.0\n\n-- fiber --\n");
    }
}
