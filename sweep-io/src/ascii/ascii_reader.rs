use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use itertools::{EitherOrBoth::*, Itertools};
use sweep_core::{nalgebra::Vector3, Point};

use super::{generate_parse_error, ColumnType};
use crate::base::SweepReader;

/// Reads a sweep from a text file with one point per line. The columns of each line are described by a format
/// string, for example `"xyzirt"` (see the table below). Empty lines and lines starting with `#` are ignored.
/// Columns that the format string doesn't name are ignored, missing columns are an error. Attributes without a
/// column default to zero.
///
/// | literal | attribute                           |
/// |---------|-------------------------------------|
/// | `s`     | skip this column                    |
/// | `x`     | x coordinate                        |
/// | `y`     | y coordinate                        |
/// | `z`     | z coordinate                        |
/// | `i`     | intensity                           |
/// | `r`     | ring index                          |
/// | `t`     | time relative to the sweep, `[0,1]` |
///
/// ```
/// # use sweep_io::{ascii::AsciiSweepReader, base::SweepReader};
/// # use std::io::Cursor;
/// let text = "1.0 2.0 3.0 7 0.5\n# comment\n4.0 5.0 6.0 3 0.75\n";
/// let mut reader = AsciiSweepReader::from_read(Cursor::new(text), "xyzrt", " ").unwrap();
/// let points = reader.read_points().unwrap();
/// assert_eq!(2, points.len());
/// assert_eq!(7, points[0].ring);
/// assert_eq!(0.75, points[1].rel_time);
/// ```
pub struct AsciiSweepReader<R: BufRead> {
    reader: R,
    delimiter: String,
    parse_layout: Vec<ColumnType>,
}

impl<R: BufRead> AsciiSweepReader<R> {
    /// Creates a reader for the given format string and column delimiter. A delimiter consisting only of
    /// whitespace splits at any run of whitespace
    pub fn from_read(read: R, format: &str, delimiter: &str) -> Result<Self> {
        Ok(Self {
            reader: read,
            delimiter: delimiter.to_string(),
            parse_layout: ColumnType::get_parse_layout(format)?,
        })
    }

    /// Whether the format provides ring indices
    pub fn has_rings(&self) -> bool {
        self.parse_layout.contains(&ColumnType::Ring)
    }

    /// Whether the format provides relative times
    pub fn has_relative_times(&self) -> bool {
        self.parse_layout.contains(&ColumnType::RelativeTime)
    }

    fn get_point(line: &str, delimiter: &str, parse_layout: &[ColumnType]) -> Result<Point> {
        let values = if delimiter.trim().is_empty() {
            line.split_whitespace().collect::<Vec<_>>()
        } else {
            line.split(delimiter).map(str::trim).collect::<Vec<_>>()
        };

        let mut position = Vector3::zeros();
        let mut point = Point::default();
        for pair in values.into_iter().zip_longest(parse_layout) {
            match pair {
                Both(value_str, column) => match column {
                    ColumnType::CoordinateX => {
                        position.x =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::CoordinateY => {
                        position.y =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::CoordinateZ => {
                        position.z =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::Intensity => {
                        point.intensity =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::Ring => {
                        point.ring =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::RelativeTime => {
                        point.rel_time =
                            parse_string(value_str).with_context(|| generate_parse_error(column))?;
                    }
                    ColumnType::Skip => {}
                },
                Left(_) => continue,
                Right(_) => {
                    bail!("Input format string expected more items in the line. Found End-of-Line.")
                }
            }
        }
        point.position = position;
        Ok(point)
    }
}

impl AsciiSweepReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, format: &str, delimiter: &str) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Could not open file {}", path.as_ref().display()))?;
        Self::from_read(BufReader::new(file), format, delimiter)
    }
}

impl<R: BufRead> SweepReader for AsciiSweepReader<R> {
    fn read_points(&mut self) -> Result<Vec<Point>> {
        let mut points = vec![];
        let mut line = String::new();
        let mut line_number = 0;
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;
            let content = line.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let point = Self::get_point(content, &self.delimiter, &self.parse_layout)
                .with_context(|| format!("Invalid point in line {}", line_number))?;
            points.push(point);
        }
        Ok(points)
    }
}

fn parse_string<V: FromStr>(value_str: &str) -> Result<V> {
    value_str.parse::<V>().map_err(|_| {
        anyhow!(
            "ParseError expected {} found '{}'.",
            std::any::type_name::<V>(),
            value_str
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::test_points;
    use std::io::Cursor;

    #[test]
    fn test_read_with_comma_delimiter() -> Result<()> {
        let text = "x, y, z, intensity\n1.5, -2.0, 0.25, 12\n";
        let mut reader = AsciiSweepReader::from_read(Cursor::new(text), "xyzi", ",")?;
        // The header is no comment, so it has to fail
        assert!(reader.read_points().is_err());

        let text = "1.5, -2.0, 0.25, 12\n";
        let mut reader = AsciiSweepReader::from_read(Cursor::new(text), "xyzi", ",")?;
        let points = reader.read_points()?;
        assert_eq!(vec![Point::new(Vector3::new(1.5, -2.0, 0.25), 12.0, 0, 0.0)], points);
        Ok(())
    }

    #[test]
    fn test_skip_and_extra_columns() -> Result<()> {
        let text = "99 1 2 3 0.1 0.2 0.3\n";
        let mut reader = AsciiSweepReader::from_read(Cursor::new(text), "sxyz", " ")?;
        let points = reader.read_points()?;
        assert_eq!(Vector3::new(1.0, 2.0, 3.0), points[0].position);
        Ok(())
    }

    #[test]
    fn test_missing_column_fails() -> Result<()> {
        let mut reader = AsciiSweepReader::from_read(Cursor::new("1 2 3\n"), "xyzr", " ")?;
        let err = reader.read_points().unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
        Ok(())
    }

    #[test]
    fn test_bad_literal_in_line_fails() -> Result<()> {
        let mut reader = AsciiSweepReader::from_read(Cursor::new("1 2 3\n1 2 a\n"), "xyz", " ")?;
        let err = reader.read_points().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        Ok(())
    }

    #[test]
    fn test_read_test_points() -> Result<()> {
        let text = "\
0 0 0 1 0 0
1 1 1 2 1 0.1
2 2 2 3 2 0.2
";
        let mut reader = AsciiSweepReader::from_read(Cursor::new(text), "xyzirt", " ")?;
        assert!(reader.has_rings());
        assert!(reader.has_relative_times());
        assert_eq!(&test_points()[..3], reader.read_points()?.as_slice());
        Ok(())
    }
}
