use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sweep_core::{nalgebra::Vector3, Point};

use crate::base::{SweepReader, SweepWriter};

/// Size of one point record: x, y, z and reflectance as little-endian `f32`
pub const KITTI_POINT_SIZE: usize = 16;

/// Reads a sweep in the binary format of the KITTI odometry benchmark. The format only stores positions and
/// reflectance, so ring indices and relative times of the returned points are zero.
pub struct KittiSweepReader<R: Read> {
    reader: R,
}

impl<R: Read> KittiSweepReader<R> {
    pub fn from_read(read: R) -> Self {
        Self { reader: read }
    }
}

impl KittiSweepReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Could not open file {}", path.as_ref().display()))?;
        Ok(Self::from_read(BufReader::new(file)))
    }
}

impl<R: Read> SweepReader for KittiSweepReader<R> {
    fn read_points(&mut self) -> Result<Vec<Point>> {
        let mut bytes = vec![];
        self.reader.read_to_end(&mut bytes)?;
        if bytes.len() % KITTI_POINT_SIZE != 0 {
            bail!(
                "Sweep has {} bytes, which is no multiple of the point size {}",
                bytes.len(),
                KITTI_POINT_SIZE
            );
        }

        let count = bytes.len() / KITTI_POINT_SIZE;
        let mut cursor = Cursor::new(bytes);
        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            let x = cursor.read_f32::<LittleEndian>()?;
            let y = cursor.read_f32::<LittleEndian>()?;
            let z = cursor.read_f32::<LittleEndian>()?;
            let reflectance = cursor.read_f32::<LittleEndian>()?;
            points.push(Point::new(
                Vector3::new(x as f64, y as f64, z as f64),
                reflectance,
                0,
                0.0,
            ));
        }
        Ok(points)
    }
}

/// Writes points in the binary format of the KITTI odometry benchmark. Ring indices and relative times are lost
pub struct KittiSweepWriter<W: Write> {
    writer: W,
}

impl<W: Write> KittiSweepWriter<W> {
    pub fn from_write(write: W) -> Self {
        Self { writer: write }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl KittiSweepWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Could not create file {}", path.as_ref().display()))?;
        Ok(Self::from_write(BufWriter::new(file)))
    }
}

impl<W: Write> SweepWriter for KittiSweepWriter<W> {
    fn write(&mut self, points: &[Point]) -> Result<()> {
        for point in points {
            self.writer.write_f32::<LittleEndian>(point.position.x as f32)?;
            self.writer.write_f32::<LittleEndian>(point.position.y as f32)?;
            self.writer.write_f32::<LittleEndian>(point.position.z as f32)?;
            self.writer.write_f32::<LittleEndian>(point.intensity)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a KITTI `times.txt` file: one timestamp in seconds per line, one line per sweep
pub fn read_timestamps<R: BufRead>(read: R) -> Result<Vec<f64>> {
    let mut timestamps = vec![];
    for (idx, line) in read.lines().enumerate() {
        let line = line?;
        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        let timestamp = content
            .parse::<f64>()
            .with_context(|| format!("Invalid timestamp '{}' in line {}", content, idx + 1))?;
        timestamps.push(timestamp);
    }
    Ok(timestamps)
}

/// Like [read_timestamps], reading from the file at `path`
pub fn read_timestamps_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Could not open file {}", path.as_ref().display()))?;
    read_timestamps(BufReader::new(file))
}
