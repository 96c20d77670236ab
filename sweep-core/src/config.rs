use std::time::Duration;

use anyhow::{bail, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::math::RobustKernel;

/// Complete configuration of the odometry pipeline. All sections have sensible defaults for a 16-ring spinning
/// sensor, so usually only a few values need to be changed:
/// ```
/// # use sweep_core::config::OdometryConfig;
/// let mut config = OdometryConfig::default();
/// config.organize.num_rings = 32;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OdometryConfig {
    pub organize: OrganizeConfig,
    pub ground: GroundConfig,
    pub features: FeatureConfig,
    pub correspondence: CorrespondenceConfig,
    pub solver: SolverConfig,
    pub registration: RegistrationConfig,
    pub deskew: DeskewConfig,
    pub pipeline: PipelineConfig,
}

impl OdometryConfig {
    /// Checks all values for consistency. Returns an error naming the first offending value
    pub fn validate(&self) -> Result<()> {
        self.organize.validate()?;
        self.ground.validate()?;
        self.features.validate()?;
        self.correspondence.validate()?;
        self.solver.validate()?;
        self.registration.validate()?;
        Ok(())
    }
}

/// How raw sweeps are turned into scans
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrganizeConfig {
    /// Number of laser rings of the sensor. Points with a larger ring index make a sweep malformed
    pub num_rings: usize,
    /// Returns closer than this are dropped, they usually hit the vehicle carrying the sensor
    pub min_range: f64,
    /// Returns farther away than this are dropped
    pub max_range: f64,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self {
            num_rings: 16,
            min_range: 1.0,
            max_range: 120.0,
        }
    }
}

impl OrganizeConfig {
    fn validate(&self) -> Result<()> {
        if self.num_rings == 0 || self.num_rings > u16::MAX as usize {
            bail!("organize.num_rings must be in [1, {}]", u16::MAX);
        }
        if !(self.min_range >= 0.0 && self.min_range < self.max_range) {
            bail!(
                "organize.min_range ({}) must be non-negative and less than organize.max_range ({})",
                self.min_range,
                self.max_range
            );
        }
        Ok(())
    }
}

/// Ground marking on the lowest rings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GroundConfig {
    pub enabled: bool,
    /// Number of lowest rings that can contain ground points
    pub ground_rings: usize,
    /// Number of azimuth columns of the range image used to pair points of adjacent rings
    pub horizontal_resolution: usize,
    /// Maximum slope between two vertically adjacent returns that still counts as ground, in degrees
    pub max_slope_deg: f64,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ground_rings: 4,
            horizontal_resolution: 1800,
            max_slope_deg: 10.0,
        }
    }
}

impl GroundConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.horizontal_resolution == 0 {
            bail!("ground.horizontal_resolution must be positive");
        }
        if !(0.0..90.0).contains(&self.max_slope_deg) {
            bail!("ground.max_slope_deg must be in [0, 90)");
        }
        Ok(())
    }
}

/// Curvature computation and feature selection
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeatureConfig {
    /// Number of same-ring neighbours on each side that enter the curvature score
    pub curvature_half_window: usize,
    /// Number of equal-width angular sectors per ring
    pub sectors: usize,
    /// Number of points at either end of a sector that are never selected
    pub sector_margin: usize,
    /// Points scoring above this are edge candidates
    pub edge_threshold: f64,
    /// Points scoring below this are planar candidates
    pub planar_threshold: f64,
    /// Edge queries selected per ring and sector
    pub max_edge_per_sector: usize,
    /// Reference edges selected per ring and sector, including the edge queries
    pub max_reference_edge_per_sector: usize,
    /// Planar queries selected per ring and sector
    pub max_planar_per_sector: usize,
    /// Global cap on edge queries per scan
    pub max_edge_total: usize,
    /// Global cap on planar queries per scan
    pub max_planar_total: usize,
    /// Neighbours on each side of a selected point that cannot be selected anymore
    pub suppression_window: usize,
    /// Suppression stops at a gap between consecutive points larger than this fraction of their range
    pub suppression_max_gap_ratio: f64,
    /// Relative range difference between angular neighbours that marks an occlusion boundary
    pub occlusion_range_ratio: f64,
    /// Points whose beam meets the surface at a shallower angle than this are excluded, in degrees
    pub grazing_angle_deg: f64,
    /// Edge length of the voxel grid used to thin out the planar reference set
    pub reference_voxel_size: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            curvature_half_window: 5,
            sectors: 6,
            sector_margin: 1,
            edge_threshold: 0.005,
            planar_threshold: 0.002,
            max_edge_per_sector: 2,
            max_reference_edge_per_sector: 20,
            max_planar_per_sector: 4,
            max_edge_total: 192,
            max_planar_total: 384,
            suppression_window: 5,
            suppression_max_gap_ratio: 0.05,
            occlusion_range_ratio: 0.1,
            grazing_angle_deg: 10.0,
            reference_voxel_size: 0.2,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if self.curvature_half_window == 0 {
            bail!("features.curvature_half_window must be positive");
        }
        if self.sectors == 0 {
            bail!("features.sectors must be positive");
        }
        if self.planar_threshold > self.edge_threshold {
            bail!(
                "features.planar_threshold ({}) must not exceed features.edge_threshold ({})",
                self.planar_threshold,
                self.edge_threshold
            );
        }
        if self.max_reference_edge_per_sector < self.max_edge_per_sector {
            bail!("features.max_reference_edge_per_sector must be at least features.max_edge_per_sector");
        }
        if self.reference_voxel_size < 0.0 {
            bail!("features.reference_voxel_size must not be negative");
        }
        if !(0.0..90.0).contains(&self.grazing_angle_deg) {
            bail!("features.grazing_angle_deg must be in [0, 90)");
        }
        Ok(())
    }
}

/// Geometric checks of the correspondence search
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CorrespondenceConfig {
    /// Queries without a reference point within this distance get no correspondence
    pub max_match_distance: f64,
    /// Number of nearest reference points searched for the second and third target point
    pub candidate_count: usize,
    /// Maximum ring distance between target points taken from different rings
    pub max_ring_gap: u16,
    /// Line targets with points closer than this are rejected
    pub min_line_length: f64,
    /// Line targets with points farther apart than this are rejected
    pub max_line_length: f64,
    /// Plane targets whose points span an angle with a smaller sine than this are rejected as collinear
    pub min_plane_sine: f64,
    /// Plane targets whose points are farther apart than this are rejected
    pub max_plane_spread: f64,
}

impl Default for CorrespondenceConfig {
    fn default() -> Self {
        Self {
            max_match_distance: 2.0,
            candidate_count: 16,
            max_ring_gap: 2,
            min_line_length: 0.05,
            max_line_length: 3.0,
            min_plane_sine: 0.1,
            max_plane_spread: 3.0,
        }
    }
}

impl CorrespondenceConfig {
    fn validate(&self) -> Result<()> {
        if self.max_match_distance <= 0.0 {
            bail!("correspondence.max_match_distance must be positive");
        }
        if self.candidate_count < 2 {
            bail!("correspondence.candidate_count must be at least 2");
        }
        if self.max_ring_gap == 0 {
            bail!("correspondence.max_ring_gap must be positive");
        }
        if self.min_line_length >= self.max_line_length {
            bail!("correspondence.min_line_length must be less than correspondence.max_line_length");
        }
        if !(0.0..1.0).contains(&self.min_plane_sine) {
            bail!("correspondence.min_plane_sine must be in [0, 1)");
        }
        Ok(())
    }
}

/// Gauss-Newton solver settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// The solve converged once the norm of the update step falls below this
    pub convergence_tolerance: f64,
    /// Down-weighting of large residuals
    pub robust_kernel: RobustKernel,
    /// Absolute lower bound for the smallest eigenvalue of the normal equations
    pub min_eigenvalue: f64,
    /// Lower bound for the ratio of smallest to largest eigenvalue of the normal equations
    pub min_eigenvalue_ratio: f64,
    /// Levenberg damping added to the diagonal of the normal equations
    pub damping: f64,
    /// Solves with fewer correspondences diverge immediately
    pub min_correspondences: usize,
    /// Wall clock budget of a single solve in milliseconds, unlimited if `None`
    pub time_budget_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_tolerance: 1e-5,
            robust_kernel: RobustKernel::Huber { delta: 0.1 },
            min_eigenvalue: 1e-6,
            min_eigenvalue_ratio: 1e-8,
            damping: 0.0,
            min_correspondences: 10,
            time_budget_ms: None,
        }
    }
}

impl SolverConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("solver.max_iterations must be positive");
        }
        if self.convergence_tolerance <= 0.0 {
            bail!("solver.convergence_tolerance must be positive");
        }
        if self.min_correspondences < 6 {
            bail!("solver.min_correspondences must be at least 6 to constrain all degrees of freedom");
        }
        if self.damping < 0.0 || self.min_eigenvalue < 0.0 || self.min_eigenvalue_ratio < 0.0 {
            bail!("solver.damping, solver.min_eigenvalue and solver.min_eigenvalue_ratio must not be negative");
        }
        self.robust_kernel.validate()
    }
}

/// Initial estimate of the motion between two sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialGuess {
    /// Assume the sensor did not move
    Identity,
    /// Assume the sensor moved like it did between the previous two sweeps
    ConstantVelocity,
}

/// Outer loop that alternates correspondence search and solving
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistrationConfig {
    /// How often correspondences are rebuilt from the latest estimate
    pub association_rounds: usize,
    /// Edge queries and references needed to use edges at all
    pub min_edge_features: usize,
    /// Planar queries and references needed to use planes at all
    pub min_planar_features: usize,
    pub initial_guess: InitialGuess,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            association_rounds: 4,
            min_edge_features: 5,
            min_planar_features: 10,
            initial_guess: InitialGuess::ConstantVelocity,
        }
    }
}

impl RegistrationConfig {
    fn validate(&self) -> Result<()> {
        if self.association_rounds == 0 {
            bail!("registration.association_rounds must be positive");
        }
        Ok(())
    }
}

/// The frame that de-skewed points are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeskewTarget {
    SweepStart,
    SweepEnd,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeskewConfig {
    pub enabled: bool,
    pub target: DeskewTarget,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: DeskewTarget::SweepEnd,
        }
    }
}

/// What happens to a sweep that arrives while another one is still pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OverflowPolicy {
    /// The pending sweep is replaced by the newer one
    Overwrite,
    /// The newer sweep is dropped
    DropIncoming,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Keep the estimate of a solve that hit the iteration cap instead of falling back to the previous pose
    pub accept_unconverged: bool,
    pub overflow_policy: OverflowPolicy,
    /// Keep the de-skewed cloud of the latest sweep
    pub keep_deskewed_cloud: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accept_unconverged: true,
            overflow_policy: OverflowPolicy::Overwrite,
            keep_deskewed_cloud: true,
        }
    }
}
