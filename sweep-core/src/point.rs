use nalgebra::Vector3;
use static_assertions::assert_impl_all;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single LiDAR return. Points are plain values and never change after they were captured, every stage of the
/// pipeline that moves a point produces a new one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// Position in the sensor frame, in meters
    pub position: Vector3<f64>,
    /// Raw return intensity as reported by the sensor
    pub intensity: f32,
    /// Index of the laser ring that measured this point
    pub ring: u16,
    /// Time of measurement relative to the sweep, `0.0` at sweep start and `1.0` at sweep end
    pub rel_time: f32,
}

assert_impl_all!(Point: Send, Sync, Copy);

impl Point {
    /// Creates a new `Point`
    /// ```
    /// # use sweep_core::Point;
    /// # use sweep_core::nalgebra::Vector3;
    /// let point = Point::new(Vector3::new(1.0, 2.0, 3.0), 10.0, 4, 0.5);
    /// assert_eq!(point.ring, 4);
    /// ```
    pub fn new(position: Vector3<f64>, intensity: f32, ring: u16, rel_time: f32) -> Self {
        Self {
            position,
            intensity,
            ring,
            rel_time,
        }
    }

    /// Creates a `Point` at the given position with all other attributes set to zero
    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, 0.0, 0, 0.0)
    }

    /// Distance of this point to the sensor origin
    /// ```
    /// # use sweep_core::Point;
    /// # use sweep_core::nalgebra::Vector3;
    /// let point = Point::at(Vector3::new(3.0, 4.0, 0.0));
    /// assert_eq!(point.range(), 5.0);
    /// ```
    pub fn range(&self) -> f64 {
        self.position.norm()
    }

    /// Horizontal angle of this point around the sensor z-axis, in radians in `(-pi, pi]`
    pub fn azimuth(&self) -> f64 {
        self.position.y.atan2(self.position.x)
    }

    /// Vertical angle of this point above the sensor xy-plane, in radians
    pub fn elevation(&self) -> f64 {
        let horizontal = self.position.xy().norm();
        self.position.z.atan2(horizontal)
    }

    /// Returns `true` if all coordinates of this point are finite
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }

    /// Returns a copy of this point with its position replaced by `position`
    pub fn with_position(&self, position: Vector3<f64>) -> Self {
        Self { position, ..*self }
    }
}
