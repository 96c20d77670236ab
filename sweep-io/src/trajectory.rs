use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use sweep_core::{
    nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3},
    pose::{Pose, StampedPose},
};

/// Text formats for trajectories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryFormat {
    /// One pose per line as the first three rows of its homogeneous matrix, row-major. The format has no
    /// timestamps, reading assigns the line index
    Kitti,
    /// One pose per line as `timestamp tx ty tz qx qy qz qw`
    Tum,
}

impl FromStr for TrajectoryFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kitti" => Ok(TrajectoryFormat::Kitti),
            "tum" => Ok(TrajectoryFormat::Tum),
            _ => Err(anyhow!("Unknown trajectory format '{}'", s)),
        }
    }
}

/// Writes poses line by line
pub struct TrajectoryWriter<W: Write> {
    writer: W,
    format: TrajectoryFormat,
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(writer: W, format: TrajectoryFormat) -> Self {
        Self { writer, format }
    }

    pub fn write_pose(&mut self, pose: &StampedPose) -> Result<()> {
        match self.format {
            TrajectoryFormat::Kitti => {
                let m = pose.pose.to_matrix();
                let values = (0..3)
                    .flat_map(|row| (0..4).map(move |col| (row, col)))
                    .map(|(row, col)| format!("{:.9}", m[(row, col)]))
                    .collect::<Vec<_>>();
                writeln!(self.writer, "{}", values.join(" "))?;
            }
            TrajectoryFormat::Tum => {
                let t = pose.pose.translation;
                let q = pose.pose.quaternion();
                writeln!(
                    self.writer,
                    "{:.9} {:.9} {:.9} {:.9} {:.9} {:.9} {:.9} {:.9}",
                    pose.timestamp, t.x, t.y, t.z, q.i, q.j, q.k, q.w
                )?;
            }
        }
        Ok(())
    }

    pub fn write_all(&mut self, poses: &[StampedPose]) -> Result<()> {
        for pose in poses {
            self.write_pose(pose)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl TrajectoryWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, format: TrajectoryFormat) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Could not create file {}", path.as_ref().display()))?;
        Ok(Self::new(BufWriter::new(file), format))
    }
}

/// Writes `poses` into a new file at `path`
pub fn write_trajectory<P: AsRef<Path>>(
    path: P,
    poses: &[StampedPose],
    format: TrajectoryFormat,
) -> Result<()> {
    let mut writer = TrajectoryWriter::from_path(path, format)?;
    writer.write_all(poses)?;
    writer.flush()
}

/// Reads a trajectory in the given format. Empty lines and lines starting with `#` are ignored
pub fn read_trajectory<R: BufRead>(read: R, format: TrajectoryFormat) -> Result<Vec<StampedPose>> {
    let mut poses = vec![];
    for (idx, line) in read.lines().enumerate() {
        let line = line?;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let values = content
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid number in line {}", idx + 1))?;
        let pose = match format {
            TrajectoryFormat::Kitti => parse_kitti_pose(&values, poses.len()),
            TrajectoryFormat::Tum => parse_tum_pose(&values),
        }
        .with_context(|| format!("Invalid pose in line {}", idx + 1))?;
        poses.push(pose);
    }
    Ok(poses)
}

/// Like [read_trajectory], reading from the file at `path`
pub fn read_trajectory_from_path<P: AsRef<Path>>(
    path: P,
    format: TrajectoryFormat,
) -> Result<Vec<StampedPose>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Could not open file {}", path.as_ref().display()))?;
    read_trajectory(BufReader::new(file), format)
}

fn parse_kitti_pose(values: &[f64], index: usize) -> Result<StampedPose> {
    if values.len() != 12 {
        bail!("Expected 12 values, found {}", values.len());
    }
    let rotation = Matrix3::new(
        values[0], values[1], values[2], values[4], values[5], values[6], values[8], values[9],
        values[10],
    );
    Ok(StampedPose {
        timestamp: index as f64,
        pose: Pose::new(
            Rotation3::from_matrix(&rotation),
            Vector3::new(values[3], values[7], values[11]),
        ),
    })
}

fn parse_tum_pose(values: &[f64]) -> Result<StampedPose> {
    if values.len() != 8 {
        bail!("Expected 8 values, found {}", values.len());
    }
    let quaternion = Quaternion::new(values[7], values[4], values[5], values[6]);
    if quaternion.norm() < 1e-9 {
        bail!("Quaternion has zero length");
    }
    Ok(StampedPose {
        timestamp: values[0],
        pose: Pose::new(
            UnitQuaternion::from_quaternion(quaternion).to_rotation_matrix(),
            Vector3::new(values[1], values[2], values[3]),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use sweep_core::math;

    fn poses() -> Vec<StampedPose> {
        vec![
            StampedPose {
                timestamp: 0.0,
                pose: Pose::identity(),
            },
            StampedPose {
                timestamp: 0.1,
                pose: Pose::from_euler(0.01, -0.02, 0.3, Vector3::new(1.0, -2.0, 0.5)),
            },
        ]
    }

    fn assert_poses_close(expected: &[StampedPose], actual: &[StampedPose], check_time: bool) {
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(actual.iter()) {
            if check_time {
                assert!((e.timestamp - a.timestamp).abs() < 1e-9);
            }
            assert!((e.pose.translation - a.pose.translation).norm() < 1e-8);
            assert!(math::angle_between(&e.pose.rotation, &a.pose.rotation) < 1e-7);
        }
    }

    #[test]
    fn test_kitti_layout() -> Result<()> {
        let mut writer = TrajectoryWriter::new(Vec::<u8>::new(), TrajectoryFormat::Kitti);
        writer.write_pose(&poses()[0])?;
        let text = String::from_utf8(writer.into_inner())?;
        let values = text.split_whitespace().collect::<Vec<_>>();
        assert_eq!(12, values.len());
        assert_eq!("1.000000000", values[0]);
        assert_eq!("0.000000000", values[3]);
        assert_eq!("1.000000000", values[5]);
        Ok(())
    }

    #[test]
    fn test_tum_layout() -> Result<()> {
        let mut writer = TrajectoryWriter::new(Vec::<u8>::new(), TrajectoryFormat::Tum);
        writer.write_pose(&poses()[0])?;
        let text = String::from_utf8(writer.into_inner())?;
        assert_eq!(
            "0.000000000 0.000000000 0.000000000 0.000000000 0.000000000 0.000000000 0.000000000 1.000000000\n",
            text
        );
        Ok(())
    }

    #[test]
    fn test_written_trajectories_read_back() -> Result<()> {
        for format in [TrajectoryFormat::Kitti, TrajectoryFormat::Tum].iter() {
            let mut writer = TrajectoryWriter::new(Vec::<u8>::new(), *format);
            writer.write_all(&poses())?;
            let read = read_trajectory(Cursor::new(writer.into_inner()), *format)?;
            assert_poses_close(&poses(), &read, *format == TrajectoryFormat::Tum);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_lines_fail() {
        assert!(read_trajectory(Cursor::new("1 2 3\n"), TrajectoryFormat::Kitti).is_err());
        assert!(read_trajectory(Cursor::new("0 0 0 0 0 0 0 0\n"), TrajectoryFormat::Tum).is_err());
        assert!(read_trajectory(Cursor::new("0 0 0 0 0 x 0 1\n"), TrajectoryFormat::Tum).is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(TrajectoryFormat::Kitti, "KITTI".parse::<TrajectoryFormat>().unwrap());
        assert_eq!(TrajectoryFormat::Tum, "tum".parse::<TrajectoryFormat>().unwrap());
        assert!("las".parse::<TrajectoryFormat>().is_err());
    }
}
