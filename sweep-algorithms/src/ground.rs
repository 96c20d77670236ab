use std::f64::consts::PI;

use sweep_core::{
    config::GroundConfig,
    scan::{Scan, ScanIndex},
};

/// Per-point ground flags of a [Scan], laid out like `scan.rings()`
#[derive(Debug, Clone, PartialEq)]
pub struct GroundMask {
    flags: Vec<Vec<bool>>,
}

impl GroundMask {
    /// A mask without any ground points
    pub fn none(scan: &Scan) -> Self {
        Self {
            flags: scan.rings().iter().map(|r| vec![false; r.len()]).collect(),
        }
    }

    pub fn is_ground(&self, idx: ScanIndex) -> bool {
        self.flags
            .get(idx.ring)
            .and_then(|ring| ring.get(idx.index))
            .copied()
            .unwrap_or(false)
    }

    /// Ground flags of the ring at position `ring` in `scan.rings()`
    pub fn ring(&self, ring: usize) -> &[bool] {
        &self.flags[ring]
    }

    /// Number of ground points
    pub fn count(&self) -> usize {
        self.flags.iter().flatten().filter(|g| **g).count()
    }
}

/// Marks the ground points of `scan`.
///
/// The points of the lowest `config.ground_rings` rings are projected into a range image with
/// `config.horizontal_resolution` azimuth columns. Two returns of vertically adjacent rings in the same column are
/// both ground if the segment between them is inclined by no more than `config.max_slope_deg`. Rings are assumed to
/// be ordered by ascending elevation, and only rings with adjacent ring indices are paired.
pub fn mark_ground(scan: &Scan, config: &GroundConfig) -> GroundMask {
    let mut mask = GroundMask::none(scan);
    if !config.enabled || config.horizontal_resolution == 0 {
        return mask;
    }

    let columns = config.horizontal_resolution;
    let max_slope = config.max_slope_deg.to_radians();
    let rings = scan.rings();
    let ground_rings = rings
        .iter()
        .take_while(|r| (r.index() as usize) < config.ground_rings)
        .count();

    let images = rings
        .iter()
        .take((ground_rings + 1).min(rings.len()))
        .map(|ring| {
            let mut image: Vec<Option<usize>> = vec![None; columns];
            for (idx, point) in ring.points().iter().enumerate() {
                let column = azimuth_column(point.azimuth(), columns);
                // Keep the closest return if several fall into one column
                match image[column] {
                    Some(existing) if ring.points()[existing].range() <= point.range() => {}
                    _ => image[column] = Some(idx),
                }
            }
            image
        })
        .collect::<Vec<_>>();

    for lower in 0..ground_rings {
        let upper = lower + 1;
        if upper >= images.len() || rings[upper].index() != rings[lower].index() + 1 {
            continue;
        }
        for column in 0..columns {
            let (a, b) = match (images[lower][column], images[upper][column]) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let diff = rings[upper].points()[b].position - rings[lower].points()[a].position;
            let horizontal = diff.xy().norm();
            if horizontal <= f64::EPSILON && diff.z.abs() <= f64::EPSILON {
                continue;
            }
            let slope = diff.z.abs().atan2(horizontal);
            if slope <= max_slope {
                mask.flags[lower][a] = true;
                mask.flags[upper][b] = true;
            }
        }
    }

    mask
}

fn azimuth_column(azimuth: f64, columns: usize) -> usize {
    let normalized = (azimuth + PI) / (2.0 * PI);
    ((normalized * columns as f64) as usize).min(columns - 1)
}
