use anyhow::Result;
use sweep_core::Point;

/// Base trait for all types that write points of a sweep
pub trait SweepWriter {
    /// Writes `points` after all previously written points
    fn write(&mut self, points: &[Point]) -> Result<()>;
    /// Flushes all written points to the underlying sink
    fn flush(&mut self) -> Result<()>;
}
