use anyhow::Result;

use crate::feature::FeaturePoint;
use crate::Point;

/// Label of the full sweep cloud
pub const CLOUD_LABEL: &str = "cloud";
/// Label of the edge feature cloud
pub const EDGE_LABEL: &str = "edges";
/// Label of the planar feature cloud
pub const PLANAR_LABEL: &str = "planar";

/// Tint of the full sweep cloud
pub const CLOUD_COLOR: [u8; 3] = [155, 155, 155];
/// Tint of edge features
pub const EDGE_COLOR: [u8; 3] = [255, 0, 0];
/// Tint of planar features
pub const PLANAR_COLOR: [u8; 3] = [0, 120, 255];

/// A named, uniformly tinted set of points that a [VisualizationSink] can show
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledCloud {
    pub label: String,
    pub color: [u8; 3],
    pub points: Vec<Point>,
}

impl LabeledCloud {
    pub fn new(label: &str, color: [u8; 3], points: Vec<Point>) -> Self {
        Self {
            label: label.to_owned(),
            color,
            points,
        }
    }

    /// The complete cloud of a sweep, tinted gray
    pub fn full_cloud(points: &[Point]) -> Self {
        Self::new(CLOUD_LABEL, CLOUD_COLOR, points.to_vec())
    }

    /// Edge features, tinted red
    pub fn edges(features: &[FeaturePoint]) -> Self {
        Self::new(
            EDGE_LABEL,
            EDGE_COLOR,
            features.iter().map(|f| f.point).collect(),
        )
    }

    /// Planar features, tinted blue
    pub fn planar(features: &[FeaturePoint]) -> Self {
        Self::new(
            PLANAR_LABEL,
            PLANAR_COLOR,
            features.iter().map(|f| f.point).collect(),
        )
    }
}

/// Receiver for intermediate clouds of the pipeline. Sinks only present data, nothing they do feeds back into the
/// odometry.
pub trait VisualizationSink {
    /// Presents the given clouds for the sweep with the given timestamp
    fn present(&mut self, timestamp: f64, clouds: &[LabeledCloud]) -> Result<()>;
}

/// A sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn present(&mut self, _timestamp: f64, _clouds: &[LabeledCloud]) -> Result<()> {
        Ok(())
    }
}
