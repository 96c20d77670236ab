#![warn(clippy::all)]
//! Input and output for the sweep odometry crates: sweeps from ASCII and KITTI binary files, trajectories in KITTI
//! and TUM format, and JSON configuration files.

/// Common traits and the file-extension based reader
pub mod base;

/// Plain text sweeps with a configurable column format
pub mod ascii;

/// Binary sweeps as stored in the KITTI odometry dataset
pub mod kitti;

/// Trajectory files
pub mod trajectory;

/// JSON configuration files
pub mod config;
