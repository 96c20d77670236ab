use sweep_core::{nalgebra::Vector3, Point};

/// Ten points with values that survive a text round trip at the default precision
pub(crate) fn test_points() -> Vec<Point> {
    (0..10)
        .map(|i| {
            let v = i as f64;
            Point::new(Vector3::new(v, v, v), (i + 1) as f32, i as u16, i as f32 / 10.0)
        })
        .collect()
}
