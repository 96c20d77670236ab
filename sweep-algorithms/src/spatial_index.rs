use kd_tree::{KdPoint, KdTree};
use sweep_core::{feature::FeaturePoint, nalgebra::Vector3};

/// Position of a feature inside the tree, together with the slot of the feature in [FeatureIndex::features]
#[derive(Debug, Clone, Copy)]
struct IndexedPosition {
    position: [f64; 3],
    slot: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f64;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f64 {
        self.position[k]
    }
}

/// A feature found by a query, with its Euclidean distance to the query position
#[derive(Debug, Clone, Copy)]
pub struct Neighbour<'a> {
    pub feature: &'a FeaturePoint,
    pub distance: f64,
}

/// K-d tree over the positions of a set of features. The index is built once per sweep and feature category and
/// then queried for every correspondence.
pub struct FeatureIndex {
    features: Vec<FeaturePoint>,
    tree: KdTree<IndexedPosition>,
}

impl FeatureIndex {
    /// Builds an index over `features`
    pub fn build(features: &[FeaturePoint]) -> Self {
        let positions = features
            .iter()
            .enumerate()
            .map(|(slot, f)| IndexedPosition {
                position: [f.point.position.x, f.point.position.y, f.point.position.z],
                slot,
            })
            .collect::<Vec<_>>();
        Self {
            features: features.to_vec(),
            tree: KdTree::build_by_ordered_float(positions),
        }
    }

    pub fn features(&self) -> &[FeaturePoint] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The feature closest to `position`, or `None` if the index is empty
    pub fn nearest(&self, position: &Vector3<f64>) -> Option<Neighbour<'_>> {
        if self.features.is_empty() {
            return None;
        }
        let query = [position.x, position.y, position.z];
        self.tree.nearest(&query).map(|found| Neighbour {
            feature: &self.features[found.item.slot],
            distance: found.squared_distance.sqrt(),
        })
    }

    /// The `count` features closest to `position`, ordered by increasing distance
    pub fn nearests(&self, position: &Vector3<f64>, count: usize) -> Vec<Neighbour<'_>> {
        if self.features.is_empty() || count == 0 {
            return vec![];
        }
        let query = [position.x, position.y, position.z];
        self.tree
            .nearests(&query, count)
            .into_iter()
            .map(|found| Neighbour {
                feature: &self.features[found.item.slot],
                distance: found.squared_distance.sqrt(),
            })
            .collect()
    }
}
