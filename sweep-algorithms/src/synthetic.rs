//! Ray-cast sweeps of simple box scenes, used by tests, benchmarks and the command line tools when no recorded
//! data is at hand.

use rand::{distributions::Uniform, rngs::SmallRng, Rng, SeedableRng};
use sweep_core::{message::SweepMessage, nalgebra::Vector3, pose::Pose, Point};

/// An axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBox {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl AxisBox {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Ray parameters where the ray enters and leaves the box, if the ray's line intersects it
    fn slab_interval(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<(f64, f64)> {
        let mut near = f64::NEG_INFINITY;
        let mut far = f64::INFINITY;
        for axis in 0..3 {
            if direction[axis].abs() < 1e-12 {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (self.min[axis] - origin[axis]) / direction[axis];
            let t2 = (self.max[axis] - origin[axis]) / direction[axis];
            near = near.max(t1.min(t2));
            far = far.min(t1.max(t2));
        }
        if near > far {
            None
        } else {
            Some((near, far))
        }
    }
}

/// A closed room with solid obstacles inside it. Rays hit the inside of the room walls, floor and ceiling, or the
/// outside of an obstacle.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub room: AxisBox,
    pub obstacles: Vec<AxisBox>,
}

impl SyntheticScene {
    /// A 20m x 13m room with the floor 1.5m below the origin and two floor-to-ceiling pillars
    pub fn room() -> Self {
        Self {
            room: AxisBox::new(Vector3::new(-8.0, -6.0, -1.5), Vector3::new(12.0, 7.0, 2.5)),
            obstacles: vec![
                AxisBox::new(Vector3::new(3.5, 2.5, -1.5), Vector3::new(4.5, 3.5, 2.5)),
                AxisBox::new(Vector3::new(-3.4, -3.75, -1.5), Vector3::new(-2.6, -2.25, 2.5)),
            ],
        }
    }

    /// Distance along the unit vector `direction` from `origin` to the first surface, if any
    pub fn cast(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let mut closest = self
            .room
            .slab_interval(origin, direction)
            .map(|(_, far)| far)
            .filter(|far| *far > 0.0);
        for obstacle in self.obstacles.iter() {
            if let Some((near, _)) = obstacle.slab_interval(origin, direction) {
                if near > 0.0 && closest.map_or(true, |c| near < c) {
                    closest = Some(near);
                }
            }
        }
        closest
    }
}

/// A spinning multi-beam sensor with evenly spaced beams. Ring 0 is the lowest beam. Points are emitted column by
/// column, every column containing one return per ring, and the relative time of a point is its column divided by
/// the number of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSensor {
    pub num_rings: u16,
    pub min_elevation_deg: f64,
    pub max_elevation_deg: f64,
    pub azimuth_step_deg: f64,
    pub min_range: f64,
    pub max_range: f64,
    /// Amplitude of uniform noise added to every range
    pub range_noise: f64,
    pub seed: u64,
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self {
            num_rings: 16,
            min_elevation_deg: -15.0,
            max_elevation_deg: 15.0,
            azimuth_step_deg: 0.5,
            min_range: 1.0,
            max_range: 120.0,
            range_noise: 0.0,
            seed: 42,
        }
    }
}

impl SyntheticSensor {
    pub fn columns(&self) -> usize {
        (360.0 / self.azimuth_step_deg).round() as usize
    }

    /// Unit direction of the beam of `ring` at `column`, in the sensor frame
    pub fn beam_direction(&self, ring: u16, column: usize) -> Vector3<f64> {
        let elevation = if self.num_rings > 1 {
            self.min_elevation_deg
                + (self.max_elevation_deg - self.min_elevation_deg) * ring as f64
                    / (self.num_rings - 1) as f64
        } else {
            self.min_elevation_deg
        }
        .to_radians();
        let azimuth = (-180.0 + column as f64 * self.azimuth_step_deg).to_radians();
        Vector3::new(
            elevation.cos() * azimuth.cos(),
            elevation.cos() * azimuth.sin(),
            elevation.sin(),
        )
    }

    /// Ray casts one sweep of `scene`. The sensor starts at `start` (in scene coordinates) and moves by `motion`
    /// during the sweep, so at relative time `s` it sits at `start * motion.interpolate(s)`. Points are expressed in
    /// the sensor frame at the moment they were captured, like a real sensor reports them.
    pub fn sweep(&self, scene: &SyntheticScene, start: &Pose, motion: &Pose) -> Vec<Point> {
        let columns = self.columns();
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let noise = Uniform::new_inclusive(-self.range_noise, self.range_noise);
        let mut points = Vec::with_capacity(columns * self.num_rings as usize);
        for column in 0..columns {
            let rel_time = column as f64 / columns as f64;
            let sensor_pose = start.compose(&motion.interpolate(rel_time));
            for ring in 0..self.num_rings {
                let direction = self.beam_direction(ring, column);
                let world_direction = sensor_pose.rotation * direction;
                let range = match scene.cast(&sensor_pose.translation, &world_direction) {
                    Some(range) => range,
                    None => continue,
                };
                let range = if self.range_noise > 0.0 {
                    range + rng.sample(noise)
                } else {
                    range
                };
                if range < self.min_range || range > self.max_range {
                    continue;
                }
                points.push(Point::new(
                    direction * range,
                    (100.0 / range) as f32,
                    ring,
                    rel_time as f32,
                ));
            }
        }
        points
    }

    /// Like [sweep](SyntheticSensor::sweep), wrapped into a message with the given timestamp
    pub fn message(
        &self,
        timestamp: f64,
        scene: &SyntheticScene,
        start: &Pose,
        motion: &Pose,
    ) -> SweepMessage {
        SweepMessage::new(timestamp, self.sweep(scene, start, motion))
    }
}
