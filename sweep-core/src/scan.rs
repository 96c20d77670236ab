use crate::Point;

/// The points of a single laser ring, in the order they were measured
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    index: u16,
    points: Vec<Point>,
}

impl Ring {
    pub fn new(index: u16, points: Vec<Point>) -> Self {
        Self { index, points }
    }

    /// Index of this ring on the sensor
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Azimuth of every point, unwrapped so that it changes continuously along the ring. The first point keeps its
    /// wrapped azimuth, every following angle differs from its predecessor by less than `pi`
    pub fn unwrapped_azimuths(&self) -> Vec<f64> {
        let mut azimuths = Vec::with_capacity(self.points.len());
        let mut offset = 0.0;
        let mut previous: Option<f64> = None;
        for point in &self.points {
            let raw = point.azimuth();
            if let Some(prev) = previous {
                let delta = raw + offset - prev;
                if delta > std::f64::consts::PI {
                    offset -= 2.0 * std::f64::consts::PI;
                } else if delta < -std::f64::consts::PI {
                    offset += 2.0 * std::f64::consts::PI;
                }
            }
            let unwrapped = raw + offset;
            azimuths.push(unwrapped);
            previous = Some(unwrapped);
        }
        azimuths
    }
}

/// A sweep organized by laser ring. Rings are stored by ascending ring index, which for all supported sensors
/// is also ascending elevation. Only rings that contain at least one point are stored. Within a ring, the
/// measurement order of the points is preserved, and no processing stage changes ring membership or order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    timestamp: f64,
    rings: Vec<Ring>,
}

/// Position of a point inside a [Scan]: the position of its ring in [Scan::rings] and its index inside that ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanIndex {
    pub ring: usize,
    pub index: usize,
}

impl Scan {
    /// Creates a new `Scan` from the given rings
    ///
    /// # Panics
    ///
    /// If the rings are not sorted by strictly ascending ring index
    pub fn new(timestamp: f64, rings: Vec<Ring>) -> Self {
        if rings.windows(2).any(|w| w[0].index >= w[1].index) {
            panic!("Scan::new: Rings must be sorted by strictly ascending ring index!");
        }
        Self { timestamp, rings }
    }

    /// Groups `points` by their ring index, keeping the relative order of the points within each ring
    /// ```
    /// # use sweep_core::scan::Scan;
    /// # use sweep_core::Point;
    /// # use sweep_core::nalgebra::Vector3;
    /// let points = vec![
    ///     Point::new(Vector3::new(1.0, 0.0, 0.0), 0.0, 1, 0.0),
    ///     Point::new(Vector3::new(2.0, 0.0, 0.0), 0.0, 0, 0.0),
    ///     Point::new(Vector3::new(3.0, 0.0, 0.0), 0.0, 1, 0.0),
    /// ];
    /// let scan = Scan::from_points(0.0, points);
    /// assert_eq!(scan.rings().len(), 2);
    /// assert_eq!(scan.rings()[1].points()[1].position.x, 3.0);
    /// ```
    pub fn from_points(timestamp: f64, points: impl IntoIterator<Item = Point>) -> Self {
        let mut by_ring: Vec<Vec<Point>> = vec![];
        for point in points {
            let ring = point.ring as usize;
            if by_ring.len() <= ring {
                by_ring.resize_with(ring + 1, Vec::new);
            }
            by_ring[ring].push(point);
        }
        let rings = by_ring
            .into_iter()
            .enumerate()
            .filter(|(_, points)| !points.is_empty())
            .map(|(index, points)| Ring::new(index as u16, points))
            .collect();
        Self { timestamp, rings }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Returns the point at the given `ScanIndex`
    ///
    /// # Panics
    ///
    /// If `idx` is out of bounds
    pub fn point(&self, idx: ScanIndex) -> &Point {
        &self.rings[idx.ring].points[idx.index]
    }

    /// Total number of points in this scan
    pub fn len(&self) -> usize {
        self.rings.iter().map(Ring::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(Ring::is_empty)
    }

    /// Iterates over all points, ring by ring
    pub fn iter_points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.rings.iter().flat_map(|ring| ring.points.iter())
    }

    /// Iterates over all points together with their `ScanIndex`
    pub fn iter_indexed(&self) -> impl Iterator<Item = (ScanIndex, &Point)> + '_ {
        self.rings.iter().enumerate().flat_map(|(ring, r)| {
            r.points
                .iter()
                .enumerate()
                .map(move |(index, point)| (ScanIndex { ring, index }, point))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_from_points_skips_missing_rings() {
        let points = vec![
            Point::new(Vector3::new(1.0, 0.0, 0.0), 0.0, 4, 0.0),
            Point::new(Vector3::new(2.0, 0.0, 0.0), 0.0, 2, 0.0),
        ];
        let scan = Scan::from_points(3.0, points);
        assert_eq!(scan.rings().len(), 2);
        assert_eq!(scan.rings()[0].index(), 2);
        assert_eq!(scan.rings()[1].index(), 4);
        assert_eq!(scan.len(), 2);
        assert_eq!(scan.timestamp(), 3.0);
    }

    #[test]
    fn test_iter_indexed_matches_point() {
        let points = (0..10)
            .map(|i| Point::new(Vector3::new(i as f64, 1.0, 0.0), 0.0, (i % 3) as u16, 0.0))
            .collect::<Vec<_>>();
        let scan = Scan::from_points(0.0, points);
        for (idx, point) in scan.iter_indexed() {
            assert_eq!(scan.point(idx), point);
        }
        assert_eq!(scan.iter_indexed().count(), 10);
    }

    #[test]
    #[should_panic]
    fn test_new_rejects_unsorted_rings() {
        Scan::new(0.0, vec![Ring::new(2, vec![]), Ring::new(1, vec![])]);
    }

    #[test]
    fn test_unwrapped_azimuths_cross_pi() {
        let angles = [170.0_f64, 179.0, -179.0, -170.0];
        let points = angles
            .iter()
            .map(|deg| {
                let rad = deg.to_radians();
                Point::at(Vector3::new(rad.cos(), rad.sin(), 0.0))
            })
            .collect();
        let ring = Ring::new(0, points);
        let unwrapped = ring.unwrapped_azimuths();
        assert_approx_eq!(unwrapped[2], 181.0_f64.to_radians());
        assert_approx_eq!(unwrapped[3], 190.0_f64.to_radians());
    }
}
