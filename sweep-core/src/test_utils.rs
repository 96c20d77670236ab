use nalgebra::Vector3;
use rand::{distributions::Uniform, prelude::Distribution, Rng};

/// Random rotation vector with a uniformly distributed axis and an angle in `[0, max_angle)`
pub(crate) fn random_rotation_vector<R: Rng + ?Sized>(rng: &mut R, max_angle: f64) -> Vector3<f64> {
    random_unit_vector(rng) * rng.gen_range(0.0..max_angle)
}

pub(crate) fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    let dist = Uniform::new(-1.0, 1.0);
    loop {
        let v = Vector3::new(dist.sample(rng), dist.sample(rng), dist.sample(rng));
        let norm = v.norm();
        if norm > 1e-3 && norm <= 1.0 {
            return v / norm;
        }
    }
}

pub(crate) fn random_translation<R: Rng + ?Sized>(rng: &mut R, max_norm: f64) -> Vector3<f64> {
    random_unit_vector(rng) * rng.gen_range(0.0..max_norm)
}
