use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use sweep_core::Point;

use super::ColumnType;
use crate::base::SweepWriter;

/// Formatting options of text writers
pub trait AsciiFormat {
    fn set_delimiter(&mut self, delimiter: &str);
    fn set_precision(&mut self, precision: usize);
}

/// Writes points as text, one point per line, with the columns given by a format string (see
/// [AsciiSweepReader](super::AsciiSweepReader) for the literals). Skip columns are left out.
pub struct AsciiSweepWriter<W: Write> {
    writer: W,
    delimiter: String,
    precision: usize,
    parse_layout: Vec<ColumnType>,
}

impl<W: Write> AsciiSweepWriter<W> {
    pub fn from_write(write: W, format: &str) -> Result<Self> {
        Ok(Self {
            writer: write,
            delimiter: String::from(" "),
            precision: 5,
            parse_layout: ColumnType::get_parse_layout(format)?,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn format_float(&self, value: f64) -> String {
        trim_unnecessary_tailing_zeros(&format!("{:.*}", self.precision, value)).to_string()
    }
}

impl AsciiSweepWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, format: &str) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Could not create file {}", path.as_ref().display()))?;
        Self::from_write(BufWriter::new(file), format)
    }
}

impl<W: Write> AsciiFormat for AsciiSweepWriter<W> {
    fn set_delimiter(&mut self, delimiter: &str) {
        self.delimiter = String::from(delimiter);
    }
    fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }
}

impl<W: Write> SweepWriter for AsciiSweepWriter<W> {
    fn write(&mut self, points: &[Point]) -> Result<()> {
        for point in points {
            let columns = self
                .parse_layout
                .iter()
                .filter_map(|column| match column {
                    ColumnType::Skip => None,
                    ColumnType::CoordinateX => Some(self.format_float(point.position.x)),
                    ColumnType::CoordinateY => Some(self.format_float(point.position.y)),
                    ColumnType::CoordinateZ => Some(self.format_float(point.position.z)),
                    ColumnType::Intensity => Some(self.format_float(point.intensity as f64)),
                    ColumnType::Ring => Some(point.ring.to_string()),
                    ColumnType::RelativeTime => Some(self.format_float(point.rel_time as f64)),
                })
                .collect::<Vec<_>>();
            writeln!(self.writer, "{}", columns.join(&self.delimiter))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn trim_unnecessary_tailing_zeros(slice: &str) -> &str {
    if !slice.contains('.') {
        return slice;
    }
    let mut end = slice.len();
    while slice[..end].ends_with('0') && !slice[..end].ends_with(".0") {
        end -= 1;
    }
    &slice[..end]
}
