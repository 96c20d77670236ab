use std::collections::{HashMap, HashSet};

use float_ord::FloatOrd;
use log::trace;
use rayon::prelude::*;
use sweep_core::{
    config::FeatureConfig,
    feature::{FeatureCategory, FeaturePoint, FeatureSet},
    scan::{Ring, Scan},
    Point,
};

use crate::{curvature::scan_curvature, ground::GroundMask, voxel_grid::voxel_downsample};

/// Features selected from one ring, with the query sets still split by sector
struct RingSelection {
    edge: Vec<Vec<FeaturePoint>>,
    planar: Vec<Vec<FeaturePoint>>,
    reference_edge: Vec<FeaturePoint>,
    reference_planar: Vec<FeaturePoint>,
}

/// Classifies the points of `scan` into edge and planar features.
///
/// Every ring is split into `config.sectors` sectors of equal azimuth width. Points without a full curvature
/// window, points next to an occlusion boundary, points seen at a grazing angle and points at either end of a
/// sector are never selected. Within a sector, the highest scoring points above `config.edge_threshold` become
/// edges and the lowest scoring points below `config.planar_threshold` become planar features, up to the
/// per-sector quotas. Every selection makes its neighbourhood unavailable for further selections. Points flagged in
/// `ground` are never selected as edges. The planar reference set holds every available non-edge point scoring below
/// `config.planar_threshold`, thinned out on a voxel grid.
///
/// The global caps `config.max_edge_total` and `config.max_planar_total` are applied afterwards by taking features
/// from all sectors of all rings in turn, which keeps the angular coverage uniform. `scan` is not modified.
pub fn extract_features(
    scan: &Scan,
    config: &FeatureConfig,
    ground: Option<&GroundMask>,
) -> FeatureSet {
    let scores = scan_curvature(scan, config.curvature_half_window);

    let selections = scan
        .rings()
        .par_iter()
        .enumerate()
        .map(|(ring_pos, ring)| {
            let ground = ground.map(|g| g.ring(ring_pos));
            select_ring_features(ring, &scores[ring_pos], ground, config)
        })
        .collect::<Vec<_>>();

    let mut edge_buckets = vec![];
    let mut planar_buckets = vec![];
    let mut reference_edge = vec![];
    let mut planar_candidates = vec![];
    for selection in selections {
        edge_buckets.extend(selection.edge);
        planar_buckets.extend(selection.planar);
        reference_edge.extend(selection.reference_edge);
        planar_candidates.extend(selection.reference_planar);
    }

    let edge = take_round_robin(edge_buckets, config.max_edge_total);
    let planar = take_round_robin(planar_buckets, config.max_planar_total);

    let planar_keys = planar
        .iter()
        .map(|f| (f.point.ring, f.index))
        .collect::<HashSet<_>>();
    let remaining_candidates = planar_candidates
        .into_iter()
        .filter(|f| !planar_keys.contains(&(f.point.ring, f.index)))
        .collect::<Vec<_>>();
    let mut reference_planar = planar.clone();
    reference_planar.extend(voxel_downsample(
        &remaining_candidates,
        config.reference_voxel_size,
    ));

    trace!(
        "Selected {} edge ({} reference) and {} planar ({} reference) features",
        edge.len(),
        reference_edge.len(),
        planar.len(),
        reference_planar.len()
    );

    FeatureSet {
        timestamp: scan.timestamp(),
        edge,
        planar,
        reference_edge,
        reference_planar,
    }
}

/// Labels every point of `scan` with its category in `features`. Points that are no query feature are labeled
/// [FeatureCategory::Discarded]
pub fn label_points(scan: &Scan, features: &FeatureSet) -> Vec<Vec<FeatureCategory>> {
    let mut labels = scan
        .rings()
        .iter()
        .map(|r| vec![FeatureCategory::Discarded; r.len()])
        .collect::<Vec<_>>();
    let ring_positions = scan
        .rings()
        .iter()
        .enumerate()
        .map(|(pos, r)| (r.index(), pos))
        .collect::<HashMap<_, _>>();
    for feature in features.edge.iter().chain(features.planar.iter()) {
        if let Some(pos) = ring_positions.get(&feature.point.ring) {
            labels[*pos][feature.index] = feature.category;
        }
    }
    labels
}

fn select_ring_features(
    ring: &Ring,
    scores: &[Option<f64>],
    ground: Option<&[bool]>,
    config: &FeatureConfig,
) -> RingSelection {
    let points = ring.points();
    let half_window = config.curvature_half_window;
    let mut selection = RingSelection {
        edge: vec![vec![]; config.sectors],
        planar: vec![vec![]; config.sectors],
        reference_edge: vec![],
        reference_planar: vec![],
    };
    if points.len() < 2 * half_window + 1 {
        return selection;
    }

    let mut available = scores.iter().map(Option::is_some).collect::<Vec<_>>();
    mark_occlusions(points, half_window, config.occlusion_range_ratio, &mut available);
    mark_grazing(points, config.grazing_angle_deg, &mut available);

    let sectors = split_into_sectors(ring, half_window, config.sectors);
    for members in sectors.iter() {
        let margin = config.sector_margin.min(members.len());
        for idx in members[..margin].iter().chain(members[members.len() - margin..].iter()) {
            available[*idx] = false;
        }
    }

    let is_ground = |idx: usize| ground.map(|g| g[idx]).unwrap_or(false);
    let mut picked = vec![false; points.len()];
    let mut is_edge = vec![false; points.len()];

    for (sector, members) in sectors.iter().enumerate() {
        let mut candidates = members
            .iter()
            .copied()
            .filter(|idx| available[*idx])
            .filter_map(|idx| scores[idx].map(|score| (idx, score)))
            .collect::<Vec<_>>();
        candidates.sort_by_key(|(_, score)| FloatOrd(*score));

        let make_feature = |idx: usize, score: f64, category: FeatureCategory| FeaturePoint {
            point: points[idx],
            category,
            score,
            sector,
            index: idx,
        };

        let mut num_edges = 0;
        let mut num_reference_edges = 0;
        for (idx, score) in candidates.iter().rev().copied() {
            if score <= config.edge_threshold
                || num_reference_edges >= config.max_reference_edge_per_sector
            {
                break;
            }
            if picked[idx] || is_ground(idx) {
                continue;
            }
            let feature = make_feature(idx, score, FeatureCategory::Edge);
            if num_edges < config.max_edge_per_sector {
                selection.edge[sector].push(feature);
                num_edges += 1;
            }
            selection.reference_edge.push(feature);
            num_reference_edges += 1;
            picked[idx] = true;
            is_edge[idx] = true;
            suppress_neighbours(points, idx, config, &mut picked);
        }

        for (idx, score) in candidates.iter().copied() {
            if score >= config.planar_threshold
                || selection.planar[sector].len() >= config.max_planar_per_sector
            {
                break;
            }
            if picked[idx] {
                continue;
            }
            selection.planar[sector].push(make_feature(idx, score, FeatureCategory::Planar));
            picked[idx] = true;
            suppress_neighbours(points, idx, config, &mut picked);
        }

        for (idx, score) in candidates.iter().copied() {
            if score >= config.planar_threshold {
                break;
            }
            if !is_edge[idx] {
                selection
                    .reference_planar
                    .push(make_feature(idx, score, FeatureCategory::Planar));
            }
        }
    }

    selection
}

/// Splits the interior points of `ring` (those with a full curvature window) into `num_sectors` sectors of equal
/// azimuth width. Returns the point indices of every sector in ring order.
fn split_into_sectors(ring: &Ring, half_window: usize, num_sectors: usize) -> Vec<Vec<usize>> {
    let mut sectors = vec![vec![]; num_sectors];
    let n = ring.len();
    if n < 2 * half_window + 1 || num_sectors == 0 {
        return sectors;
    }
    let first = half_window;
    let last = n - half_window - 1;
    let azimuths = ring.unwrapped_azimuths();
    let span = azimuths[last] - azimuths[first];

    for idx in first..=last {
        let sector = if span.abs() <= f64::EPSILON {
            0
        } else {
            let fraction = (azimuths[idx] - azimuths[first]) / span;
            ((fraction * num_sectors as f64).floor().max(0.0) as usize).min(num_sectors - 1)
        };
        sectors[sector].push(idx);
    }
    sectors
}

/// Marks the points on the far side of a range discontinuity. These points are next to a surface that occludes
/// them from the sensor, so their neighbourhood changes with the viewpoint.
fn mark_occlusions(points: &[Point], half_window: usize, ratio: f64, available: &mut [bool]) {
    let n = points.len();
    for i in 0..n.saturating_sub(1) {
        let r0 = points[i].range();
        let r1 = points[i + 1].range();
        if (r0 - r1).abs() <= ratio * r0.min(r1) {
            continue;
        }
        if r0 > r1 {
            for flag in available[i.saturating_sub(half_window)..=i].iter_mut() {
                *flag = false;
            }
        } else {
            let end = (i + 1 + half_window).min(n - 1);
            for flag in available[i + 1..=end].iter_mut() {
                *flag = false;
            }
        }
    }
}

/// Marks points where the beam meets the surface at a shallow angle. The surface direction is approximated by the
/// chord between the two angular neighbours.
fn mark_grazing(points: &[Point], grazing_angle_deg: f64, available: &mut [bool]) {
    let min_sine = grazing_angle_deg.to_radians().sin();
    for i in 1..points.len().saturating_sub(1) {
        let tangent = points[i + 1].position - points[i - 1].position;
        let tangent_length = tangent.norm();
        let range = points[i].range();
        if tangent_length <= f64::EPSILON || range <= f64::EPSILON {
            continue;
        }
        let beam = points[i].position / range;
        if beam.cross(&tangent).norm() / tangent_length < min_sine {
            available[i] = false;
        }
    }
}

/// Makes the neighbours of `center` unavailable. Suppression does not extend across gaps between consecutive
/// points, since points beyond a gap belong to a different surface.
fn suppress_neighbours(points: &[Point], center: usize, config: &FeatureConfig, picked: &mut [bool]) {
    let n = points.len();
    for step in 1..=config.suppression_window {
        let idx = center + step;
        if idx >= n || is_gap(&points[idx - 1], &points[idx], config.suppression_max_gap_ratio) {
            break;
        }
        picked[idx] = true;
    }
    for step in 1..=config.suppression_window {
        if step > center {
            break;
        }
        let idx = center - step;
        if is_gap(&points[idx + 1], &points[idx], config.suppression_max_gap_ratio) {
            break;
        }
        picked[idx] = true;
    }
}

fn is_gap(a: &Point, b: &Point, ratio: f64) -> bool {
    (b.position - a.position).norm() > ratio * b.range()
}

/// Takes up to `cap` features from `buckets`, one from each bucket in turn
fn take_round_robin(buckets: Vec<Vec<FeaturePoint>>, cap: usize) -> Vec<FeaturePoint> {
    let mut iters = buckets.into_iter().map(Vec::into_iter).collect::<Vec<_>>();
    let mut taken = vec![];
    loop {
        let mut progressed = false;
        for iter in iters.iter_mut() {
            if taken.len() >= cap {
                return taken;
            }
            if let Some(feature) = iter.next() {
                taken.push(feature);
                progressed = true;
            }
        }
        if !progressed {
            return taken;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticScene, SyntheticSensor};
    use sweep_core::{nalgebra::Vector3, pose::Pose};

    /// Single ring looking at a corner at (10, 0) formed by two walls that recede towards the sensor
    fn corner_scan() -> (Scan, usize) {
        let mut points = vec![];
        let mut corner_index = 0;
        for step in -60..=80 {
            let azimuth = (step as f64 * 0.5).to_radians();
            let direction = Vector3::new(azimuth.cos(), azimuth.sin(), 0.0);
            // Wall through (10, 0) with direction (-1, +-1) / sqrt(2), i.e. x + |y| = 10
            let range = 10.0 / (direction.x + direction.y.abs());
            if step == 0 {
                corner_index = points.len();
            }
            points.push(Point::new(direction * range, 0.0, 0, 0.0));
        }
        (Scan::from_points(0.0, points), corner_index)
    }

    /// Several rings hitting a flat wall at x = 10
    fn wall_scan() -> Scan {
        let mut points = vec![];
        for ring in 0..5u16 {
            let elevation = (-4.0 + 2.0 * ring as f64).to_radians();
            for step in -80..=80 {
                let azimuth = (step as f64 * 0.5).to_radians();
                let direction = Vector3::new(
                    elevation.cos() * azimuth.cos(),
                    elevation.cos() * azimuth.sin(),
                    elevation.sin(),
                );
                let range = 10.0 / direction.x;
                points.push(Point::new(direction * range, 0.0, ring, 0.0));
            }
        }
        Scan::from_points(0.0, points)
    }

    fn room_scan() -> Scan {
        let sensor = SyntheticSensor::default();
        let points = sensor.sweep(&SyntheticScene::room(), &Pose::identity(), &Pose::identity());
        Scan::from_points(0.0, points)
    }

    #[test]
    fn test_flat_wall_has_only_planar_features() {
        let scan = wall_scan();
        let config = FeatureConfig::default();
        let features = extract_features(&scan, &config, None);
        assert!(features.edge.is_empty());
        assert!(features.reference_edge.is_empty());
        assert!(!features.planar.is_empty());
        for feature in features.planar.iter().chain(features.reference_planar.iter()) {
            assert_eq!(feature.category, FeatureCategory::Planar);
            assert!(feature.score < config.planar_threshold);
        }
        for feature in features.planar.iter() {
            assert!(feature.score < 1e-3);
        }
    }

    #[test]
    fn test_reference_planar_scores_stay_below_planar_threshold() {
        let scan = room_scan();
        let config = FeatureConfig::default();
        let features = extract_features(&scan, &config, None);
        assert!(!features.reference_planar.is_empty());
        let above = features
            .reference_planar
            .iter()
            .filter(|f| f.score >= config.planar_threshold)
            .map(|f| f.score)
            .collect::<Vec<_>>();
        assert!(above.is_empty(), "{:?}", above);
    }

    #[test]
    fn test_corner_is_edge_and_not_planar() {
        let (scan, corner_index) = corner_scan();
        let features = extract_features(&scan, &FeatureConfig::default(), None);
        assert!(features
            .edge
            .iter()
            .any(|f| f.index == corner_index && f.category == FeatureCategory::Edge));
        assert!(features.planar.iter().all(|f| f.index != corner_index));
        assert!(features
            .reference_planar
            .iter()
            .all(|f| f.index != corner_index));
    }

    #[test]
    fn test_sector_quotas_are_respected() {
        let scan = room_scan();
        let config = FeatureConfig::default();
        let features = extract_features(&scan, &config, None);
        assert!(!features.edge.is_empty());
        assert!(!features.planar.is_empty());

        let mut edges = HashMap::new();
        let mut reference_edges = HashMap::new();
        let mut planar = HashMap::new();
        for f in features.edge.iter() {
            *edges.entry((f.ring(), f.sector)).or_insert(0) += 1;
        }
        for f in features.reference_edge.iter() {
            *reference_edges.entry((f.ring(), f.sector)).or_insert(0) += 1;
        }
        for f in features.planar.iter() {
            *planar.entry((f.ring(), f.sector)).or_insert(0) += 1;
        }
        assert!(edges.values().all(|c| *c <= config.max_edge_per_sector));
        assert!(reference_edges
            .values()
            .all(|c| *c <= config.max_reference_edge_per_sector));
        assert!(planar.values().all(|c| *c <= config.max_planar_per_sector));
        assert!(features.edge.len() <= config.max_edge_total);
        assert!(features.planar.len() <= config.max_planar_total);
    }

    #[test]
    fn test_global_caps_spread_over_rings() {
        let scan = room_scan();
        let config = FeatureConfig {
            max_edge_total: 16,
            max_planar_total: 32,
            ..Default::default()
        };
        let features = extract_features(&scan, &config, None);
        assert_eq!(16, features.edge.len());
        assert_eq!(32, features.planar.len());
        let rings = features
            .planar
            .iter()
            .map(|f| f.ring())
            .collect::<HashSet<_>>();
        assert!(rings.len() > 1);
    }

    #[test]
    fn test_sets_are_disjoint_and_queries_are_references() {
        let scan = room_scan();
        let features = extract_features(&scan, &FeatureConfig::default(), None);
        let key = |f: &FeaturePoint| (f.ring(), f.index);
        let edges = features.reference_edge.iter().map(key).collect::<HashSet<_>>();
        let planar = features.reference_planar.iter().map(key).collect::<HashSet<_>>();
        assert!(edges.is_disjoint(&planar));
        assert!(features.edge.iter().all(|f| edges.contains(&key(f))));
        assert!(features.planar.iter().all(|f| planar.contains(&key(f))));
    }

    #[test]
    fn test_ground_points_are_never_edges() {
        let scan = room_scan();
        let ground = crate::ground::mark_ground(&scan, &Default::default());
        let features = extract_features(&scan, &FeatureConfig::default(), Some(&ground));
        let ring_positions = scan
            .rings()
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.index(), pos))
            .collect::<HashMap<_, _>>();
        for f in features.reference_edge.iter() {
            let ring = ring_positions[&f.ring()];
            assert!(!ground.ring(ring)[f.index]);
        }
    }

    #[test]
    fn test_occlusion_marks_far_side() {
        let mut points = vec![];
        for i in 0..10 {
            points.push(Point::at(Vector3::new(5.0, i as f64 * 0.05, 0.0)));
        }
        for i in 10..20 {
            points.push(Point::at(Vector3::new(10.0, i as f64 * 0.1, 0.0)));
        }
        let mut available = vec![true; points.len()];
        mark_occlusions(&points, 3, 0.1, &mut available);
        assert!(available[..10].iter().all(|a| *a));
        assert!(available[10..14].iter().all(|a| !*a));
        assert!(available[14..].iter().all(|a| *a));
    }

    #[test]
    fn test_grazing_points_are_marked() {
        // A wall almost parallel to the beams
        let points = (0..5)
            .map(|i| Point::at(Vector3::new(5.0 + i as f64, 0.01 * i as f64 + 1.0, 0.0)))
            .collect::<Vec<_>>();
        let mut available = vec![true; points.len()];
        mark_grazing(&points, 10.0, &mut available);
        assert!(available[1..4].iter().all(|a| !*a));
    }

    #[test]
    fn test_round_robin() {
        let feature = |index| FeaturePoint {
            point: Point::at(Vector3::new(1.0, 0.0, 0.0)),
            category: FeatureCategory::Edge,
            score: 1.0,
            sector: 0,
            index,
        };
        let buckets = vec![vec![feature(0), feature(1), feature(2)], vec![], vec![feature(3)]];
        let taken = take_round_robin(buckets.clone(), 3);
        assert_eq!(
            vec![0, 3, 1],
            taken.iter().map(|f| f.index).collect::<Vec<_>>()
        );
        assert_eq!(4, take_round_robin(buckets, 10).len());
    }

    #[test]
    fn test_label_points() {
        let (scan, corner_index) = corner_scan();
        let features = extract_features(&scan, &FeatureConfig::default(), None);
        let labels = label_points(&scan, &features);
        assert_eq!(labels[0][corner_index], FeatureCategory::Edge);
        assert_eq!(labels[0][0], FeatureCategory::Discarded);
        let planar = labels[0]
            .iter()
            .filter(|l| **l == FeatureCategory::Planar)
            .count();
        assert_eq!(planar, features.planar.len());
    }
}
