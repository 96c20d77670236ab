#![warn(clippy::all)]
//! Algorithms of the LiDAR odometry pipeline.
//!
//! Every stage is a pure function of its inputs: a sweep is organized into a scan, the scan is classified into
//! feature sets, feature sets of two sweeps are registered into an incremental pose and the pose is used to
//! de-skew the sweep. [Odometry](crate::odometry::Odometry) chains the stages and owns the state that is carried
//! from one sweep to the next.

// Turns raw sweep messages into scans, plus ring and timing reconstruction for sensors that don't report them.
pub mod organize;
// Marks ground returns on the lowest rings using a range-image column search.
pub mod ground;
// Same-ring curvature scores.
pub mod curvature;
// Sector-based selection of edge and planar features.
pub mod features;
// Voxel grid thinning of feature sets.
pub mod voxel_grid;
// K-d tree over a feature set.
pub mod spatial_index;
// Point-to-line and point-to-plane correspondences between two feature sets.
pub mod correspondence;
// Gauss-Newton solver for the rigid motion between two sweeps.
pub mod solver;
// Alternates correspondence search and solving until the estimate settles.
pub mod registration;
// Motion compensation of points captured during a moving sweep.
pub mod deskew;
// The stateful odometry pipeline.
pub mod odometry;
// Capacity-1 hand-off between the sensor and the odometry thread.
pub mod slot;
// Background thread that runs the odometry pipeline.
pub mod worker;
// Ray-cast sweeps of simple scenes, used for testing and benchmarking.
pub mod synthetic;
