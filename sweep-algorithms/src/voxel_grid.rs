use std::collections::HashMap;

use float_ord::FloatOrd;
use sweep_core::{feature::FeaturePoint, nalgebra::Vector3};

struct Voxel {
    sum: Vector3<f64>,
    members: Vec<usize>,
}

/// Downsamples `features` by applying a voxel grid filter with cubic voxels of edge length `leaf_size`.
///
/// Unlike a centroid filter, every voxel is represented by the original feature closest to the centroid of the
/// voxel, so that the ring and sector information of the surviving features stays valid. The output keeps the
/// order in which the voxels were first hit. A non-positive `leaf_size` returns the input unchanged.
pub fn voxel_downsample(features: &[FeaturePoint], leaf_size: f64) -> Vec<FeaturePoint> {
    if leaf_size <= 0.0 {
        return features.to_vec();
    }

    let mut voxels: Vec<Voxel> = vec![];
    let mut voxel_of_key: HashMap<(i64, i64, i64), usize> = HashMap::new();
    for (idx, feature) in features.iter().enumerate() {
        let p = feature.point.position;
        let key = (
            (p.x / leaf_size).floor() as i64,
            (p.y / leaf_size).floor() as i64,
            (p.z / leaf_size).floor() as i64,
        );
        let slot = *voxel_of_key.entry(key).or_insert_with(|| {
            voxels.push(Voxel {
                sum: Vector3::zeros(),
                members: vec![],
            });
            voxels.len() - 1
        });
        voxels[slot].sum += p;
        voxels[slot].members.push(idx);
    }

    voxels
        .iter()
        .filter_map(|voxel| {
            let centroid = voxel.sum / voxel.members.len() as f64;
            voxel
                .members
                .iter()
                .map(|idx| &features[*idx])
                .min_by_key(|f| FloatOrd((f.point.position - centroid).norm_squared()))
                .copied()
        })
        .collect()
}
