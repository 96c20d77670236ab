use std::time::Instant;

use log::debug;
use sweep_core::{
    config::{CorrespondenceConfig, OdometryConfig, RegistrationConfig},
    feature::FeatureSet,
    pose::Pose,
};

use crate::{
    correspondence::{build_edge_correspondences, build_planar_correspondences},
    solver::{DivergenceReason, GaussNewtonSolver, SolverStatus},
    spatial_index::FeatureIndex,
};

/// Pose change of a converged round below which correspondences are not rebuilt anymore
const ASSOCIATION_TOLERANCE: f64 = 1e-4;

/// The feature set of a sweep that later sweeps are registered against, with one spatial index per category
pub struct ReferenceModel {
    features: FeatureSet,
    edge_index: FeatureIndex,
    planar_index: FeatureIndex,
}

impl ReferenceModel {
    pub fn new(features: FeatureSet) -> Self {
        let edge_index = FeatureIndex::build(&features.reference_edge);
        let planar_index = FeatureIndex::build(&features.reference_planar);
        Self {
            features,
            edge_index,
            planar_index,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }
}

/// Outcome of registering two sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Converged,
    /// The last solve hit its iteration cap
    MaxIterations,
    Diverged(DivergenceReason),
    TimedOut,
    /// Neither edges nor planar features were numerous enough to be used
    InsufficientFeatures,
}

impl From<SolverStatus> for RegistrationStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Converged => RegistrationStatus::Converged,
            SolverStatus::MaxIterations => RegistrationStatus::MaxIterations,
            SolverStatus::Diverged(reason) => RegistrationStatus::Diverged(reason),
            SolverStatus::TimedOut => RegistrationStatus::TimedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationResult {
    /// Estimated motion that maps points of the current sweep into the frame of the reference sweep. Equals the
    /// initial guess unless [has_estimate](RegistrationResult::has_estimate) is `true`
    pub pose: Pose,
    pub status: RegistrationStatus,
    /// Number of association rounds that were run
    pub rounds: usize,
    /// Solver iterations summed over all rounds
    pub iterations: usize,
    /// Solver iterations of the longest round
    pub max_round_iterations: usize,
    pub edge_correspondences: usize,
    pub planar_correspondences: usize,
    pub used_edges: bool,
    pub used_planar: bool,
    pub final_cost: f64,
    pub min_eigenvalue: f64,
}

impl RegistrationResult {
    fn failed(initial: &Pose, status: RegistrationStatus) -> Self {
        Self {
            pose: *initial,
            status,
            rounds: 0,
            iterations: 0,
            max_round_iterations: 0,
            edge_correspondences: 0,
            planar_correspondences: 0,
            used_edges: false,
            used_planar: false,
            final_cost: 0.0,
            min_eigenvalue: 0.0,
        }
    }

    pub fn has_estimate(&self) -> bool {
        matches!(
            self.status,
            RegistrationStatus::Converged | RegistrationStatus::MaxIterations
        )
    }
}

/// Scan-to-scan registration: alternates correspondence search and Gauss-Newton solves
pub struct Registration {
    correspondence: CorrespondenceConfig,
    registration: RegistrationConfig,
    solver: GaussNewtonSolver,
}

impl Registration {
    pub fn new(config: &OdometryConfig) -> Self {
        Self {
            correspondence: config.correspondence.clone(),
            registration: config.registration.clone(),
            solver: GaussNewtonSolver::new(config.solver.clone()),
        }
    }

    /// Estimates the motion between `reference` and `current`, starting at `initial`.
    ///
    /// A feature category takes part only if both the query set of `current` and the reference set of `reference`
    /// contain at least the configured minimum number of features. Correspondences are rebuilt from the latest
    /// estimate up to `association_rounds` times. The solver time budget covers all rounds together.
    pub fn register(
        &self,
        reference: &ReferenceModel,
        current: &FeatureSet,
        initial: &Pose,
    ) -> RegistrationResult {
        let min_edges = self.registration.min_edge_features;
        let min_planar = self.registration.min_planar_features;
        let used_edges =
            current.edge.len() >= min_edges && reference.edge_index.len() >= min_edges;
        let used_planar =
            current.planar.len() >= min_planar && reference.planar_index.len() >= min_planar;
        if !used_edges && !used_planar {
            debug!(
                "Not enough features to register: {} edges against {}, {} planar against {}",
                current.edge.len(),
                reference.edge_index.len(),
                current.planar.len(),
                reference.planar_index.len()
            );
            return RegistrationResult::failed(initial, RegistrationStatus::InsufficientFeatures);
        }

        let deadline = self
            .solver
            .config()
            .time_budget()
            .map(|budget| Instant::now() + budget);
        let mut result = RegistrationResult::failed(initial, RegistrationStatus::Converged);
        result.used_edges = used_edges;
        result.used_planar = used_planar;
        let mut pose = *initial;

        for round in 1..=self.registration.association_rounds {
            let mut correspondences = vec![];
            if used_edges {
                correspondences.extend(build_edge_correspondences(
                    &current.edge,
                    &pose,
                    &reference.edge_index,
                    &self.correspondence,
                ));
            }
            let num_edge_correspondences = correspondences.len();
            if used_planar {
                correspondences.extend(build_planar_correspondences(
                    &current.planar,
                    &pose,
                    &reference.planar_index,
                    &self.correspondence,
                ));
            }

            let report = self.solver.solve_until(&correspondences, &pose, deadline);
            result.rounds = round;
            result.iterations += report.iterations;
            result.max_round_iterations = result.max_round_iterations.max(report.iterations);
            result.edge_correspondences = num_edge_correspondences;
            result.planar_correspondences = correspondences.len() - num_edge_correspondences;
            result.status = report.status.into();
            result.final_cost = report.final_cost;
            result.min_eigenvalue = report.min_eigenvalue;

            if !report.has_estimate() {
                debug!("Registration failed in round {}: {:?}", round, report.status);
                result.pose = *initial;
                return result;
            }

            let change = pose.inverse().compose(&report.pose).to_vector().norm();
            pose = report.pose;
            result.pose = pose;
            if report.is_converged() && change < ASSOCIATION_TOLERANCE {
                break;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::extract_features,
        synthetic::{SyntheticScene, SyntheticSensor},
    };
    use sweep_core::{
        math::{self, RobustKernel},
        nalgebra::{Vector3, Vector6},
        scan::Scan,
    };

    fn features_at(pose: &Pose, config: &OdometryConfig) -> FeatureSet {
        let sensor = SyntheticSensor::default();
        let points = sensor.sweep(&SyntheticScene::room(), pose, &Pose::identity());
        let scan = Scan::from_points(0.0, points);
        extract_features(&scan, &config.features, None)
    }

    #[test]
    fn test_recovers_motion_between_synthetic_sweeps() {
        let config = OdometryConfig::default();
        let truth = Pose::from_vector(&Vector6::new(
            0.0,
            0.0,
            1.0_f64.to_radians(),
            0.2,
            0.05,
            0.0,
        ));
        let reference = ReferenceModel::new(features_at(&Pose::identity(), &config));
        let current = features_at(&truth, &config);

        let result = Registration::new(&config).register(&reference, &current, &Pose::identity());
        assert_eq!(RegistrationStatus::Converged, result.status);
        assert!(
            result.max_round_iterations < config.solver.max_iterations,
            "{:?}",
            result
        );
        assert!(result.used_edges);
        assert!(result.used_planar);
        assert!(result.edge_correspondences > 0);
        assert!(result.planar_correspondences > 0);
        assert!(
            (result.pose.translation - truth.translation).norm() < 0.05,
            "{:?}",
            result.pose
        );
        assert!(
            math::angle_between(&result.pose.rotation, &truth.rotation) < 0.5_f64.to_radians(),
            "{:?}",
            result.pose
        );
    }

    #[test]
    fn test_small_step_converges_with_huber_weights() {
        let config = OdometryConfig::default();
        assert!(matches!(
            config.solver.robust_kernel,
            RobustKernel::Huber { .. }
        ));
        let truth = Pose::from_euler(0.0, 0.0, 0.5_f64.to_radians(), Vector3::new(0.15, 0.02, 0.0));
        let reference = ReferenceModel::new(features_at(&Pose::identity(), &config));
        let current = features_at(&truth, &config);

        let result = Registration::new(&config).register(&reference, &current, &Pose::identity());
        assert_eq!(RegistrationStatus::Converged, result.status);
        assert!(result.max_round_iterations < config.solver.max_iterations);
        assert!((result.pose.translation - truth.translation).norm() < 0.05);
    }

    #[test]
    fn test_insufficient_features() {
        let config = OdometryConfig::default();
        let reference = ReferenceModel::new(FeatureSet::default());
        let current = features_at(&Pose::identity(), &config);
        let initial = Pose::from_vector(&Vector6::new(0.0, 0.0, 0.0, 0.1, 0.0, 0.0));
        let result = Registration::new(&config).register(&reference, &current, &initial);
        assert_eq!(RegistrationStatus::InsufficientFeatures, result.status);
        assert_eq!(initial, result.pose);
        assert!(!result.has_estimate());
    }

    #[test]
    fn test_identical_sweeps_give_identity() {
        let config = OdometryConfig::default();
        let features = features_at(&Pose::identity(), &config);
        let reference = ReferenceModel::new(features.clone());
        let result = Registration::new(&config).register(&reference, &features, &Pose::identity());
        assert_eq!(RegistrationStatus::Converged, result.status);
        assert!(result.pose.translation.norm() < 1e-3);
        assert!(result.pose.rotation_angle() < 1e-4);
    }
}
