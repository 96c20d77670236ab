use std::f64::consts::PI;

use log::debug;
use sweep_core::{
    config::OrganizeConfig,
    message::{SkipReason, SweepMessage},
    scan::Scan,
    Point,
};

/// Organizes the points of `message` by ring.
///
/// The message is validated first (see [SweepMessage::validate]). Points with non-finite coordinates and points
/// outside of `[config.min_range, config.max_range]` are dropped. Within each ring, the points keep the order in
/// which they appear in the message.
///
/// # Errors
///
/// Returns the reason for skipping the sweep if the message is empty, malformed or if no point survives filtering
pub fn organize(message: &SweepMessage, config: &OrganizeConfig) -> Result<Scan, SkipReason> {
    message.validate(config.num_rings)?;

    let usable = message
        .points
        .iter()
        .filter(|p| p.is_finite())
        .filter(|p| {
            let range = p.range();
            range >= config.min_range && range <= config.max_range
        })
        .copied()
        .collect::<Vec<_>>();

    let dropped = message.len() - usable.len();
    if dropped > 0 {
        debug!(
            "Dropped {} of {} points outside of the usable range",
            dropped,
            message.len()
        );
    }
    if usable.is_empty() {
        return Err(SkipReason::NoUsablePoints);
    }

    Ok(Scan::from_points(message.timestamp, usable))
}

/// Assigns ring indices from the elevation angle of each point, for sensors whose driver does not report them.
/// `min_elevation_deg` maps to ring `0` and `max_elevation_deg` to ring `num_rings - 1`, assuming the rings are
/// spaced evenly in between. Elevations outside of that range are clamped.
///
/// # Panics
///
/// If `num_rings` is zero or `min_elevation_deg >= max_elevation_deg`
pub fn assign_rings_by_elevation(
    points: &mut [Point],
    num_rings: usize,
    min_elevation_deg: f64,
    max_elevation_deg: f64,
) {
    if num_rings == 0 {
        panic!("assign_rings_by_elevation: num_rings must be positive!");
    }
    if min_elevation_deg >= max_elevation_deg {
        panic!("assign_rings_by_elevation: Minimum elevation must be less than maximum elevation!");
    }
    let spacing = (max_elevation_deg - min_elevation_deg) / (num_rings.max(2) - 1) as f64;
    for point in points.iter_mut() {
        let elevation = point.elevation().to_degrees();
        let ring = ((elevation - min_elevation_deg) / spacing).round();
        point.ring = ring.max(0.0).min((num_rings - 1) as f64) as u16;
    }
}

/// Assigns relative times from the azimuth of each point, for sensors whose driver does not report them.
///
/// The sweep is assumed to start at the azimuth of the first point and to cover one full revolution. The
/// direction of rotation is taken from the majority of azimuth steps between consecutive points of the same ring.
pub fn assign_relative_time_by_azimuth(points: &mut [Point]) {
    let start = match points.first() {
        Some(p) => p.azimuth(),
        None => return,
    };

    let mut last_azimuth_per_ring: Vec<Option<f64>> = vec![];
    let mut direction_votes: i64 = 0;
    for point in points.iter() {
        let ring = point.ring as usize;
        if last_azimuth_per_ring.len() <= ring {
            last_azimuth_per_ring.resize(ring + 1, None);
        }
        let azimuth = point.azimuth();
        if let Some(previous) = last_azimuth_per_ring[ring] {
            let step = wrap_angle(azimuth - previous);
            if step > 0.0 {
                direction_votes += 1;
            } else if step < 0.0 {
                direction_votes -= 1;
            }
        }
        last_azimuth_per_ring[ring] = Some(azimuth);
    }
    let direction = if direction_votes < 0 { -1.0 } else { 1.0 };

    for point in points.iter_mut() {
        let progress = ((point.azimuth() - start) * direction).rem_euclid(2.0 * PI);
        point.rel_time = (progress / (2.0 * PI)).min(1.0) as f32;
    }
}

/// Wraps an angle into `(-pi, pi]`
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}
