use std::fmt;

use crate::Point;

/// One sweep as delivered by the sensor driver: a timestamp and a flat collection of points. The points are
/// expected in measurement order, which for a spinning sensor means ring-interleaved and ordered by azimuth
#[derive(Debug, Clone, Default)]
pub struct SweepMessage {
    /// Timestamp of the sweep start, in seconds
    pub timestamp: f64,
    pub points: Vec<Point>,
}

/// Reasons for skipping a sweep without touching the odometry state
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The sweep contained no points at all
    EmptySweep,
    /// No point of the sweep survived range filtering
    NoUsablePoints,
    /// The sweep violated a structural requirement
    Malformed(String),
    /// The sweep is not newer than the last processed sweep
    StaleTimestamp { previous: f64, current: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptySweep => write!(f, "sweep contains no points"),
            SkipReason::NoUsablePoints => write!(f, "no point of the sweep is within the usable range"),
            SkipReason::Malformed(why) => write!(f, "malformed sweep: {}", why),
            SkipReason::StaleTimestamp { previous, current } => write!(
                f,
                "sweep timestamp {} is not newer than previous timestamp {}",
                current, previous
            ),
        }
    }
}

impl SweepMessage {
    pub fn new(timestamp: f64, points: Vec<Point>) -> Self {
        Self { timestamp, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Checks the structural requirements of this sweep for a sensor with `num_rings` rings. Non-finite
    /// coordinates are not an error here, single invalid returns are filtered out later. A sweep is malformed if
    /// its timestamp is not finite, a ring index is out of range or a relative time lies outside of `[0, 1]`
    /// ```
    /// # use sweep_core::message::{SkipReason, SweepMessage};
    /// # use sweep_core::Point;
    /// # use sweep_core::nalgebra::Vector3;
    /// let empty = SweepMessage::new(0.0, vec![]);
    /// assert_eq!(empty.validate(16), Err(SkipReason::EmptySweep));
    ///
    /// let bad_ring = SweepMessage::new(0.0, vec![Point::new(Vector3::new(1.0, 0.0, 0.0), 0.0, 16, 0.0)]);
    /// assert!(matches!(bad_ring.validate(16), Err(SkipReason::Malformed(_))));
    /// ```
    pub fn validate(&self, num_rings: usize) -> Result<(), SkipReason> {
        if self.points.is_empty() {
            return Err(SkipReason::EmptySweep);
        }
        if !self.timestamp.is_finite() {
            return Err(SkipReason::Malformed(format!(
                "timestamp {} is not finite",
                self.timestamp
            )));
        }
        for (idx, point) in self.points.iter().enumerate() {
            if point.ring as usize >= num_rings {
                return Err(SkipReason::Malformed(format!(
                    "point {} has ring {} but the sensor has {} rings",
                    idx, point.ring, num_rings
                )));
            }
            if !(0.0..=1.0).contains(&point.rel_time) {
                return Err(SkipReason::Malformed(format!(
                    "point {} has relative time {} outside of [0, 1]",
                    idx, point.rel_time
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn point(ring: u16, rel_time: f32) -> Point {
        Point::new(Vector3::new(5.0, 0.0, 0.0), 1.0, ring, rel_time)
    }

    #[test]
    fn test_validate_accepts_well_formed_sweep() {
        let msg = SweepMessage::new(1.5, vec![point(0, 0.0), point(15, 1.0), point(3, 0.5)]);
        assert_eq!(Ok(()), msg.validate(16));
    }

    #[test]
    fn test_validate_rejects_relative_time() {
        let msg = SweepMessage::new(1.5, vec![point(0, 1.5)]);
        assert!(matches!(msg.validate(16), Err(SkipReason::Malformed(_))));
        let msg = SweepMessage::new(1.5, vec![point(0, f32::NAN)]);
        assert!(matches!(msg.validate(16), Err(SkipReason::Malformed(_))));
    }

    #[test]
    fn test_validate_rejects_timestamp() {
        let msg = SweepMessage::new(f64::NAN, vec![point(0, 0.0)]);
        assert!(matches!(msg.validate(16), Err(SkipReason::Malformed(_))));
    }

    #[test]
    fn test_validate_tolerates_non_finite_positions() {
        let mut bad = point(0, 0.0);
        bad.position.x = f64::NAN;
        let msg = SweepMessage::new(0.0, vec![bad, point(1, 0.1)]);
        assert_eq!(Ok(()), msg.validate(16));
    }
}
