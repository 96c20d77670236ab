use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;
use rand::{distributions::Uniform, rngs::SmallRng, Rng, SeedableRng};
use sweep_algorithms::{
    organize::{assign_relative_time_by_azimuth, assign_rings_by_elevation},
    synthetic::{SyntheticScene, SyntheticSensor},
};
use sweep_core::{
    message::SweepMessage,
    nalgebra::Vector3,
    pose::{Pose, StampedPose},
    Point,
};
use sweep_io::{
    base::{list_sweep_files, GenericSweepReader, SweepReader},
    kitti::read_timestamps_from_path,
};

/// Beam layout used to reconstruct ring indices for files that only store positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLayout {
    pub num_rings: usize,
    pub min_elevation_deg: f64,
    pub max_elevation_deg: f64,
}

impl SensorLayout {
    pub fn validate(&self) -> Result<()> {
        if self.num_rings == 0 {
            bail!("The sensor needs at least one ring");
        }
        if self.min_elevation_deg >= self.max_elevation_deg {
            bail!(
                "Minimum elevation {} must be less than maximum elevation {}",
                self.min_elevation_deg,
                self.max_elevation_deg
            );
        }
        Ok(())
    }

    /// Assigns ring indices from elevation and relative times from azimuth
    pub fn reconstruct_sensor_timing(&self, points: &mut [Point]) {
        assign_rings_by_elevation(
            points,
            self.num_rings,
            self.min_elevation_deg,
            self.max_elevation_deg,
        );
        assign_relative_time_by_azimuth(points);
    }
}

/// Sweeps read one by one from a file or from all sweep files in a directory
pub struct FileSweeps {
    files: Vec<PathBuf>,
    timestamps: Option<Vec<f64>>,
    period: f64,
    layout: SensorLayout,
    next: usize,
}

impl FileSweeps {
    /// Sweeps from `input`, which is either a sweep file or a directory of sweep files. Timestamps are read from
    /// `timestamps` (one line per sweep) if given, otherwise sweep `k` gets timestamp `k * period`
    pub fn open(
        input: &Path,
        timestamps: Option<&Path>,
        period: f64,
        layout: SensorLayout,
    ) -> Result<Self> {
        layout.validate()?;
        let files = if input.is_dir() {
            list_sweep_files(input)?
        } else if input.is_file() {
            vec![input.to_path_buf()]
        } else {
            bail!("Input path {} is neither file nor directory!", input.display());
        };
        if files.is_empty() {
            bail!("No sweep files found in {}", input.display());
        }

        let timestamps = match timestamps {
            Some(path) => {
                let timestamps = read_timestamps_from_path(path)?;
                if timestamps.len() < files.len() {
                    bail!(
                        "{} contains {} timestamps, but there are {} sweeps",
                        path.display(),
                        timestamps.len(),
                        files.len()
                    );
                }
                Some(timestamps)
            }
            None => None,
        };

        Ok(Self {
            files,
            timestamps,
            period,
            layout,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn read(&self, index: usize) -> Result<SweepMessage> {
        let path = &self.files[index];
        let mut reader = GenericSweepReader::open_file(path)?;
        let has_timing = reader.has_sensor_timing();
        let mut points = reader
            .read_points()
            .with_context(|| format!("Could not read sweep {}", path.display()))?;
        if !has_timing {
            self.layout.reconstruct_sensor_timing(&mut points);
        }
        let timestamp = match self.timestamps.as_ref() {
            Some(timestamps) => timestamps[index],
            None => index as f64 * self.period,
        };
        debug!(
            "Read {} points from {} at {}",
            points.len(),
            path.display(),
            timestamp
        );
        Ok(SweepMessage::new(timestamp, points))
    }
}

impl Iterator for FileSweeps {
    type Item = Result<SweepMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.files.len() {
            return None;
        }
        let sweep = self.read(self.next);
        self.next += 1;
        Some(sweep)
    }
}

/// Ray-cast sweeps of a sensor driving through the synthetic room, with a randomly perturbed constant velocity.
/// The true sensor pose at the start of every generated sweep is recorded.
pub struct SimulatedSweeps {
    sensor: SyntheticSensor,
    scene: SyntheticScene,
    rng: SmallRng,
    nominal_motion: Pose,
    pose: Pose,
    remaining: usize,
    period: f64,
    index: usize,
    truth: Vec<StampedPose>,
}

impl SimulatedSweeps {
    pub fn new(count: usize, period: f64, seed: u64) -> Self {
        Self {
            sensor: SyntheticSensor {
                range_noise: 0.01,
                seed,
                ..Default::default()
            },
            scene: SyntheticScene::room(),
            rng: SmallRng::seed_from_u64(seed),
            nominal_motion: Pose::from_euler(0.0, 0.0, 0.01, Vector3::new(0.1, 0.0, 0.0)),
            pose: Pose::from_euler(0.0, 0.0, 0.0, Vector3::new(-4.0, 0.5, 0.0)),
            remaining: count,
            period,
            index: 0,
            truth: vec![],
        }
    }

    /// True sensor poses at the start of all sweeps generated so far, in scene coordinates
    pub fn truth(&self) -> &[StampedPose] {
        &self.truth
    }
}

impl Iterator for SimulatedSweeps {
    type Item = Result<SweepMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let jitter = Uniform::new_inclusive(-0.02, 0.02);
        let motion = self.nominal_motion.compose(&Pose::from_euler(
            0.0,
            0.0,
            self.rng.sample(jitter) * 0.2,
            Vector3::new(self.rng.sample(jitter), self.rng.sample(jitter), 0.0),
        ));
        let timestamp = self.index as f64 * self.period;
        self.sensor.seed = self.sensor.seed.wrapping_add(1);
        let sweep = self.sensor.message(timestamp, &self.scene, &self.pose, &motion);
        self.truth.push(StampedPose {
            timestamp,
            pose: self.pose,
        });
        self.pose = self.pose.compose(&motion);
        self.index += 1;
        Some(Ok(sweep))
    }
}
