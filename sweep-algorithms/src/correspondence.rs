use float_ord::FloatOrd;
use sweep_core::{
    config::CorrespondenceConfig,
    feature::{FeatureCategory, FeaturePoint},
    nalgebra::Vector3,
    pose::Pose,
};

use crate::spatial_index::{FeatureIndex, Neighbour};

/// Geometric target of a correspondence, expressed in the frame of the reference sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrespondenceTarget {
    /// Infinite line through two reference edge points
    Line { a: Vector3<f64>, b: Vector3<f64> },
    /// Plane `normal . p + offset = 0` through three reference planar points, `normal` has unit length
    Plane { normal: Vector3<f64>, offset: f64 },
}

impl CorrespondenceTarget {
    /// Creates a plane through three points. Returns `None` if the points are collinear
    pub fn plane_through(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let norm = normal.norm();
        if norm <= f64::EPSILON {
            return None;
        }
        let normal = normal / norm;
        Some(CorrespondenceTarget::Plane {
            normal,
            offset: -normal.dot(a),
        })
    }

    /// Distance of `p` to this target, together with the unit direction in which the distance grows fastest.
    ///
    /// For planes, the distance is signed and the direction is the plane normal. For lines, the distance is never
    /// negative and the direction points from the closest point on the line towards `p`. If `p` lies on the line,
    /// the direction is zero.
    pub fn residual(&self, p: &Vector3<f64>) -> (f64, Vector3<f64>) {
        match self {
            CorrespondenceTarget::Line { a, b } => {
                let direction = (b - a).normalize();
                let ap = p - a;
                let perpendicular = ap - direction * ap.dot(&direction);
                let distance = perpendicular.norm();
                if distance <= f64::EPSILON {
                    (0.0, Vector3::zeros())
                } else {
                    (distance, perpendicular / distance)
                }
            }
            CorrespondenceTarget::Plane { normal, offset } => (normal.dot(p) + offset, *normal),
        }
    }
}

/// A query feature of the current sweep paired with a target in the reference sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Position of the query feature in the frame of the current sweep
    pub source: Vector3<f64>,
    pub target: CorrespondenceTarget,
    pub category: FeatureCategory,
    /// Residual of the query at the pose the correspondence was built with
    pub residual: f64,
}

/// Builds point-to-line correspondences for the edge `queries` of the current sweep.
///
/// Each query is moved into the reference frame with `pose`. The first target point is the closest reference edge,
/// which must lie within `config.max_match_distance`. The second target point is taken from the
/// `config.candidate_count` reference edges nearest to the query. Among those within `config.max_match_distance`
/// that lie on a different ring, at most `config.max_ring_gap` rings away from the first, it is the one closest to
/// the first target point. Lines whose points are closer than `config.min_line_length`
/// or farther apart than `config.max_line_length` are rejected. Queries without a valid line are skipped.
pub fn build_edge_correspondences(
    queries: &[FeaturePoint],
    pose: &Pose,
    reference: &FeatureIndex,
    config: &CorrespondenceConfig,
) -> Vec<Correspondence> {
    queries
        .iter()
        .filter_map(|query| {
            let moved = pose.transform_vector(&query.point.position);
            let neighbours = reference.nearests(&moved, config.candidate_count);
            let first = neighbours.first()?;
            if first.distance > config.max_match_distance {
                return None;
            }
            let a = first.feature.point.position;
            let second = neighbours
                .iter()
                .skip(1)
                .filter(|n| {
                    n.distance <= config.max_match_distance && ring_gap(first, n, config.max_ring_gap)
                })
                .min_by_key(|n| FloatOrd((n.feature.point.position - a).norm_squared()))?;
            let b = second.feature.point.position;
            let length = (b - a).norm();
            if length < config.min_line_length || length > config.max_line_length {
                return None;
            }
            let target = CorrespondenceTarget::Line { a, b };
            Some(Correspondence {
                source: query.point.position,
                target,
                category: FeatureCategory::Edge,
                residual: target.residual(&moved).0,
            })
        })
        .collect()
}

/// Builds point-to-plane correspondences for the planar `queries` of the current sweep.
///
/// Each query is moved into the reference frame with `pose`. The plane is spanned by the closest reference planar
/// point, the next closest point on the same ring and the closest point on a different ring at most
/// `config.max_ring_gap` rings away. Planes through nearly collinear points (sine of the spanned angle below
/// `config.min_plane_sine`) and planes whose points are more than `config.max_plane_spread` apart are rejected.
pub fn build_planar_correspondences(
    queries: &[FeaturePoint],
    pose: &Pose,
    reference: &FeatureIndex,
    config: &CorrespondenceConfig,
) -> Vec<Correspondence> {
    queries
        .iter()
        .filter_map(|query| {
            let moved = pose.transform_vector(&query.point.position);
            let neighbours = reference.nearests(&moved, config.candidate_count);
            let first = neighbours.first()?;
            if first.distance > config.max_match_distance {
                return None;
            }
            let candidates = neighbours
                .iter()
                .skip(1)
                .filter(|n| n.distance <= config.max_match_distance);
            let same_ring = candidates
                .clone()
                .find(|n| n.feature.point.ring == first.feature.point.ring)?;
            let other_ring = candidates
                .clone()
                .find(|n| ring_gap(first, n, config.max_ring_gap))?;

            let a = first.feature.point.position;
            let b = same_ring.feature.point.position;
            let c = other_ring.feature.point.position;
            if plane_sine(&a, &b, &c) < config.min_plane_sine {
                return None;
            }
            let spread = (b - a).norm().max((c - a).norm()).max((c - b).norm());
            if spread > config.max_plane_spread {
                return None;
            }
            let target = CorrespondenceTarget::plane_through(&a, &b, &c)?;
            Some(Correspondence {
                source: query.point.position,
                target,
                category: FeatureCategory::Planar,
                residual: target.residual(&moved).0,
            })
        })
        .collect()
}

/// Returns `true` if `other` lies on a different ring than `first`, at most `max_gap` rings away
fn ring_gap(first: &Neighbour<'_>, other: &Neighbour<'_>, max_gap: u16) -> bool {
    let gap = (first.feature.point.ring as i32 - other.feature.point.ring as i32).abs();
    gap > 0 && gap <= max_gap as i32
}

/// Sine of the angle at `a` in the triangle `a, b, c`
fn plane_sine(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let denominator = ab.norm() * ac.norm();
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    ab.cross(&ac).norm() / denominator
}
