use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::debug;
use plotters::coord::types::RangedCoordf32;
use plotters::prelude::*;
use sweep_core::viz::{LabeledCloud, VisualizationSink, CLOUD_LABEL};

/// Renders every presented sweep as a bird's-eye PNG, looking down the sensor z-axis with x pointing right. One
/// file is written per sweep, named after the running frame number.
pub struct PlotSink {
    output_dir: PathBuf,
    size: (u32, u32),
    extent: f32,
    frame: usize,
}

impl PlotSink {
    /// Creates a sink writing into `output_dir`, which is created if it does not exist
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Could not create plot directory {}", output_dir.display()))?;
        Ok(Self {
            output_dir,
            size: (800, 800),
            extent: 30.0,
            frame: 0,
        })
    }

    /// Shows the square `[-extent, extent]` around the sensor, in meters
    pub fn with_extent(mut self, extent: f32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Path of the image for the given frame
    pub fn frame_path(&self, frame: usize) -> PathBuf {
        self.output_dir.join(format!("sweep_{:06}.png", frame))
    }

    fn draw(&self, path: &Path, clouds: &[LabeledCloud]) -> Result<()> {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("{}", e))?;

        let extent = self.extent;
        let root = root.apply_coord_spec(Cartesian2d::<RangedCoordf32, RangedCoordf32>::new(
            -extent..extent,
            -extent..extent,
            (0..self.size.0 as i32, 0..self.size.1 as i32),
        ));

        // Full clouds first, so that features are drawn on top
        let mut ordered = clouds.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|cloud| cloud.label != CLOUD_LABEL);

        for cloud in ordered {
            let color = RGBColor(cloud.color[0], cloud.color[1], cloud.color[2]);
            let radius = if cloud.label == CLOUD_LABEL { 1 } else { 3 };
            for point in cloud.points.iter() {
                // Pixel rows grow downwards, so y is flipped to keep the frame right-handed
                let x = point.position.x as f32;
                let y = -point.position.y as f32;
                if x.abs() > extent || y.abs() > extent {
                    continue;
                }
                root.draw(&Circle::new(
                    (x, y),
                    radius,
                    ShapeStyle::from(&color).filled(),
                ))
                .map_err(|e| anyhow!("{}", e))?;
            }
        }

        root.present().map_err(|e| anyhow!("{}", e))?;
        Ok(())
    }
}

impl VisualizationSink for PlotSink {
    fn present(&mut self, timestamp: f64, clouds: &[LabeledCloud]) -> Result<()> {
        let path = self.frame_path(self.frame);
        self.draw(&path, clouds)
            .with_context(|| format!("Could not plot sweep {} to {}", timestamp, path.display()))?;
        debug!("Plotted sweep {} to {}", timestamp, path.display());
        self.frame += 1;
        Ok(())
    }
}
