use sweep_core::{config::DeskewTarget, pose::Pose, Point};

/// Applies `pose` to the position of every point in `points`
/// ```
/// # use sweep_algorithms::deskew::transform_points;
/// # use sweep_core::{nalgebra::Vector3, pose::Pose, Point};
/// let pose = Pose::from_euler(0.0, 0.0, 0.0, Vector3::new(1.0, 0.0, 0.0));
/// let moved = transform_points(&[Point::at(Vector3::new(1.0, 2.0, 3.0))], &pose);
/// assert_eq!(moved[0].position, Vector3::new(2.0, 2.0, 3.0));
/// ```
pub fn transform_points(points: &[Point], pose: &Pose) -> Vec<Point> {
    points.iter().map(|p| pose.transform_point(p)).collect()
}

/// Removes the motion distortion of a sweep. `motion` is the sensor motion over the whole sweep, mapping
/// coordinates at the sweep end into the sweep start frame. Every point is moved from the sensor frame at its
/// capture time into the frame selected by `target`, interpolating the motion at the point's relative time.
pub fn deskew(points: &[Point], motion: &Pose, target: DeskewTarget) -> Vec<Point> {
    let end_from_start = motion.inverse();
    points
        .iter()
        .map(|p| {
            let start_from_point = motion.interpolate(p.rel_time as f64);
            match target {
                DeskewTarget::SweepStart => start_from_point.transform_point(p),
                DeskewTarget::SweepEnd => end_from_start
                    .compose(&start_from_point)
                    .transform_point(p),
            }
        })
        .collect()
}

/// Inverse of [deskew]: moves points from the `target` frame back into the sensor frame at their capture time
pub fn reskew(points: &[Point], motion: &Pose, target: DeskewTarget) -> Vec<Point> {
    points
        .iter()
        .map(|p| {
            let point_from_start = motion.interpolate(p.rel_time as f64).inverse();
            match target {
                DeskewTarget::SweepStart => point_from_start.transform_point(p),
                DeskewTarget::SweepEnd => point_from_start.compose(motion).transform_point(p),
            }
        })
        .collect()
}
