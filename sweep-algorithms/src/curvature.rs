use rayon::prelude::*;
use sweep_core::{nalgebra::Vector3, scan::Scan, Point};

/// Computes the curvature score of every point of a single ring.
///
/// The score of point `p_i` is `|p_i - mean(N_i)| / |p_i|`, where `N_i` are the `half_window` points before and
/// after `p_i` on the same ring. Normalizing by the range makes the score independent of the distance to the sensor.
/// Points on a straight line or a plane score close to zero, points at a corner score high. Points without a full
/// window on both sides get no score.
/// ```
/// # use sweep_algorithms::curvature::ring_curvature;
/// # use sweep_core::{Point, nalgebra::Vector3};
/// let line = (0..7)
///     .map(|i| Point::at(Vector3::new(10.0, -0.3 + i as f64 * 0.1, 0.0)))
///     .collect::<Vec<_>>();
/// let scores = ring_curvature(&line, 2);
/// assert_eq!(scores[1], None);
/// assert!(scores[3].unwrap() < 1e-12);
/// ```
///
/// # Panics
///
/// If `half_window` is zero
pub fn ring_curvature(points: &[Point], half_window: usize) -> Vec<Option<f64>> {
    if half_window == 0 {
        panic!("ring_curvature: half_window must be positive!");
    }
    let mut scores = vec![None; points.len()];
    let window = 2 * half_window + 1;
    if points.len() < window {
        return scores;
    }

    let mut window_sum: Vector3<f64> = points[..window].iter().map(|p| p.position).sum();
    let neighbours = (2 * half_window) as f64;
    for center in half_window..points.len() - half_window {
        if center > half_window {
            window_sum += points[center + half_window].position;
            window_sum -= points[center - half_window - 1].position;
        }
        let p = points[center].position;
        let range = p.norm();
        if range <= f64::EPSILON {
            continue;
        }
        let mean = (window_sum - p) / neighbours;
        scores[center] = Some((p - mean).norm() / range);
    }
    scores
}

/// Curvature scores of all points of `scan`, laid out like `scan.rings()`. Rings are processed in parallel.
pub fn scan_curvature(scan: &Scan, half_window: usize) -> Vec<Vec<Option<f64>>> {
    scan.rings()
        .par_iter()
        .map(|ring| ring_curvature(ring.points(), half_window))
        .collect()
}
