use anyhow::Result;
use sweep_core::{message::SweepMessage, Point};

/// Base trait for all types that read a single sweep
pub trait SweepReader {
    /// Reads all points of the sweep
    fn read_points(&mut self) -> Result<Vec<Point>>;

    /// Reads all points of the sweep and wraps them into a message with the given timestamp
    fn read_sweep(&mut self, timestamp: f64) -> Result<SweepMessage> {
        Ok(SweepMessage::new(timestamp, self.read_points()?))
    }
}
