#![warn(clippy::all)]

//! Core data structures for LiDAR sweep odometry
//!
//! A sweep arrives as a flat [SweepMessage](crate::message::SweepMessage) and is organized into a
//! [Scan](crate::scan::Scan), whose points are grouped by laser ring in the order they were measured. Feature
//! extraction turns a scan into a [FeatureSet](crate::feature::FeatureSet), and registration of two feature sets
//! yields a rigid [Pose](crate::pose::Pose). The algorithms themselves live in `sweep-algorithms`, this crate only
//! contains the shared types, the rotation math and the configuration.

pub extern crate nalgebra;

/// Runtime configuration of the odometry pipeline
pub mod config;
/// Feature categories and feature sets
pub mod feature;
/// Rotation math on SO(3)
pub mod math;
/// Inbound sweep messages
pub mod message;
mod point;
pub use self::point::*;
/// Rigid poses
pub mod pose;
/// Sweeps organized by ring
pub mod scan;
/// Presentation hooks for labeled clouds
pub mod viz;

#[cfg(test)]
pub(crate) mod test_utils;
