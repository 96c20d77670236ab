use crate::Point;

/// Geometric category of a classified point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    /// High curvature, the point lies on a sharp edge or corner
    Edge,
    /// Low curvature, the point lies on a locally flat surface
    Planar,
    /// Neither, or excluded from selection. Discarded points never take part in correspondence search
    Discarded,
}

/// A point tagged with its feature category. The category is fixed at classification time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturePoint {
    pub point: Point,
    pub category: FeatureCategory,
    /// Curvature score of the point
    pub score: f64,
    /// Angular sector of the ring that the point was selected from
    pub sector: usize,
    /// Index of the point within its ring
    pub index: usize,
}

impl FeaturePoint {
    pub fn ring(&self) -> u16 {
        self.point.ring
    }
}

/// Output of feature classification for one scan.
///
/// `edge` and `planar` are the sparse query sets that are matched against the previous sweep. `reference_edge` and
/// `reference_planar` are denser sets that the next sweep is matched against. Each query set is contained in the
/// reference set of the same category.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub timestamp: f64,
    pub edge: Vec<FeaturePoint>,
    pub planar: Vec<FeaturePoint>,
    pub reference_edge: Vec<FeaturePoint>,
    pub reference_planar: Vec<FeaturePoint>,
}

impl FeatureSet {
    /// Query set for the given category. Returns an empty slice for [FeatureCategory::Discarded]
    pub fn queries(&self, category: FeatureCategory) -> &[FeaturePoint] {
        match category {
            FeatureCategory::Edge => &self.edge,
            FeatureCategory::Planar => &self.planar,
            FeatureCategory::Discarded => &[],
        }
    }

    /// Reference set for the given category. Returns an empty slice for [FeatureCategory::Discarded]
    pub fn references(&self, category: FeatureCategory) -> &[FeaturePoint] {
        match category {
            FeatureCategory::Edge => &self.reference_edge,
            FeatureCategory::Planar => &self.reference_planar,
            FeatureCategory::Discarded => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edge.is_empty() && self.planar.is_empty()
    }
}
