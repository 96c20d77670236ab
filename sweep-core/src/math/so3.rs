use nalgebra::{Matrix3, Rotation3, Vector3};

/// Below this angle, `exp` and `log` switch to their Taylor expansions
const SMALL_ANGLE: f64 = 1e-8;

/// Skew-symmetric cross product matrix of `v`, so that `skew(v) * w == v.cross(&w)`
/// ```
/// # use sweep_core::math::skew;
/// # use sweep_core::nalgebra::Vector3;
/// let v = Vector3::new(1.0, 2.0, 3.0);
/// let w = Vector3::new(-2.0, 0.5, 4.0);
/// assert_eq!(skew(&v) * w, v.cross(&w));
/// ```
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Inverse of [skew]: extracts the vector from the skew-symmetric part of `m`
pub fn vee(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(
        0.5 * (m[(2, 1)] - m[(1, 2)]),
        0.5 * (m[(0, 2)] - m[(2, 0)]),
        0.5 * (m[(1, 0)] - m[(0, 1)]),
    )
}

/// Exponential map from a rotation vector to a rotation, using Rodrigues' formula
/// `R = I + sin(t)/t K + (1 - cos(t))/t^2 K^2` with `K = skew(omega)` and `t = |omega|`
/// ```
/// # use sweep_core::math::exp;
/// # use sweep_core::nalgebra::Vector3;
/// let rot = exp(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
/// let rotated = rot * Vector3::new(1.0, 0.0, 0.0);
/// assert!((rotated - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
/// ```
pub fn exp(omega: &Vector3<f64>) -> Rotation3<f64> {
    let theta_sq = omega.norm_squared();
    let theta = theta_sq.sqrt();
    let k = skew(omega);
    let k_sq = k * k;
    let (a, b) = if theta < SMALL_ANGLE {
        (1.0 - theta_sq / 6.0, 0.5 - theta_sq / 24.0)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta_sq)
    };
    Rotation3::from_matrix_unchecked(Matrix3::identity() + k * a + k_sq * b)
}

/// Logarithm map from a rotation to its rotation vector, the inverse of [exp] for angles in `[0, pi)`
pub fn log(rotation: &Rotation3<f64>) -> Vector3<f64> {
    let m = rotation.matrix();
    let cos_theta = ((m.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    if theta < SMALL_ANGLE {
        return vee(m);
    }
    if std::f64::consts::PI - theta < 1e-6 {
        // sin(theta) vanishes, the axis has to be recovered from the symmetric part
        return rotation.scaled_axis();
    }
    vee(m) * (theta / theta.sin())
}

/// Geodesic angle between two rotations, in radians
pub fn angle_between(a: &Rotation3<f64>, b: &Rotation3<f64>) -> f64 {
    log(&(a.inverse() * b)).norm()
}
