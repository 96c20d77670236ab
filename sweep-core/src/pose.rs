use std::ops::Mul;

use nalgebra::{Isometry3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6};

use crate::math;
use crate::Point;

/// A rigid body transformation, mapping `p` to `rotation * p + translation`.
///
/// The same type is used for the incremental motion between two sweeps and for the accumulated pose of the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Rotation3::identity(), Vector3::zeros())
    }

    /// Creates a `Pose` from a twist-like 6-vector `[omega, t]`, where `omega` is a rotation vector
    /// ```
    /// # use sweep_core::pose::Pose;
    /// # use sweep_core::nalgebra::{Vector3, Vector6};
    /// let pose = Pose::from_vector(&Vector6::new(0.0, 0.0, 0.1, 1.0, 2.0, 3.0));
    /// assert_eq!(pose.translation, Vector3::new(1.0, 2.0, 3.0));
    /// assert!((pose.rotation_angle() - 0.1).abs() < 1e-12);
    /// ```
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        let omega = Vector3::new(v[0], v[1], v[2]);
        Self::new(math::exp(&omega), Vector3::new(v[3], v[4], v[5]))
    }

    /// Inverse of [from_vector](Pose::from_vector)
    pub fn to_vector(&self) -> Vector6<f64> {
        let omega = math::log(&self.rotation);
        Vector6::new(
            omega.x,
            omega.y,
            omega.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        )
    }

    /// Creates a pose from yaw/pitch/roll angles (rotation about z, y and x, applied in that order) and a translation
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64, translation: Vector3<f64>) -> Self {
        Self::new(Rotation3::from_euler_angles(roll, pitch, yaw), translation)
    }

    /// Returns the pose that applies `other` first and `self` second
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.inverse();
        Pose::new(rotation, -(rotation * self.translation))
    }

    pub fn transform_vector(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Transforms the position of `point`, keeping all other attributes
    pub fn transform_point(&self, point: &Point) -> Point {
        point.with_position(self.transform_vector(&point.position))
    }

    /// Pose at fraction `s` of the motion from identity to `self`. The rotation is scaled along the geodesic,
    /// the translation linearly. `s == 0` yields identity, `s == 1` yields `self`.
    pub fn interpolate(&self, s: f64) -> Pose {
        let omega = math::log(&self.rotation);
        Pose::new(math::exp(&(omega * s)), self.translation * s)
    }

    /// Rotation angle of this pose, in radians
    pub fn rotation_angle(&self) -> f64 {
        math::log(&self.rotation).norm()
    }

    /// Translation distance of this pose
    pub fn translation_norm(&self) -> f64 {
        self.translation.norm()
    }

    /// The pose as a homogeneous 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.to_isometry().to_homogeneous()
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_rotation_matrix(&self.rotation),
        )
    }

    /// Rotation as a unit quaternion
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.rotation)
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(iso: Isometry3<f64>) -> Self {
        Pose::new(iso.rotation.to_rotation_matrix(), iso.translation.vector)
    }
}

/// A pose together with the timestamp of the sweep it belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedPose {
    pub timestamp: f64,
    pub pose: Pose,
}
