use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, warn};
use sweep_core::{
    config::{InitialGuess, OdometryConfig},
    feature::FeatureSet,
    message::{SkipReason, SweepMessage},
    pose::{Pose, StampedPose},
    viz::{LabeledCloud, VisualizationSink},
    Point,
};

use crate::{
    deskew::deskew,
    features::extract_features,
    ground::mark_ground,
    organize::organize,
    registration::{ReferenceModel, Registration, RegistrationStatus},
};

/// How much a pose estimate can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// The previous pose was carried forward, or the solver ran out of iterations and its best estimate was
    /// accepted anyway
    Low,
    /// The solver converged
    High,
}

/// Summary of a registered sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepReport {
    pub timestamp: f64,
    /// Motion from this sweep to the previous one. Identity if the registration failed
    pub increment: Pose,
    /// Accumulated pose after this sweep
    pub pose: Pose,
    pub status: RegistrationStatus,
    pub rounds: usize,
    pub iterations: usize,
    pub edge_features: usize,
    pub planar_features: usize,
    pub edge_correspondences: usize,
    pub planar_correspondences: usize,
    pub min_eigenvalue: f64,
    pub elapsed: Duration,
}

impl SweepReport {
    pub fn confidence(&self) -> Confidence {
        match self.status {
            RegistrationStatus::Converged => Confidence::High,
            _ => Confidence::Low,
        }
    }
}

/// What [Odometry::process] did with a sweep
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// The sweep was rejected, the odometry state is unchanged
    Skipped(SkipReason),
    /// The first usable sweep, which anchors the trajectory at the identity pose
    Initialized,
    /// The sweep was registered and the state advanced
    Updated(SweepReport),
    /// The registration failed or was rejected. The previous pose is carried forward and the previous sweep stays
    /// the reference for the next one
    Fallback(SweepReport),
}

impl SweepOutcome {
    pub fn report(&self) -> Option<&SweepReport> {
        match self {
            SweepOutcome::Updated(report) | SweepOutcome::Fallback(report) => Some(report),
            _ => None,
        }
    }
}

/// Everything that is carried from one sweep to the next
struct OdometryState {
    reference: Option<ReferenceModel>,
    pose: Pose,
    last_increment: Pose,
    last_timestamp: Option<f64>,
    trajectory: Vec<StampedPose>,
    deskewed: Vec<Point>,
    sweeps_processed: usize,
}

impl Default for OdometryState {
    fn default() -> Self {
        Self {
            reference: None,
            pose: Pose::identity(),
            last_increment: Pose::identity(),
            last_timestamp: None,
            trajectory: vec![],
            deskewed: vec![],
            sweeps_processed: 0,
        }
    }
}

/// Scan-to-scan LiDAR odometry. Feed sweeps in temporal order into [process](Odometry::process) and read the
/// trajectory through the accessors.
/// ```
/// # use sweep_algorithms::odometry::{Odometry, SweepOutcome};
/// # use sweep_algorithms::synthetic::{SyntheticScene, SyntheticSensor};
/// # use sweep_core::{config::OdometryConfig, pose::Pose};
/// let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
/// let sensor = SyntheticSensor::default();
/// let sweep = sensor.message(0.0, &SyntheticScene::room(), &Pose::identity(), &Pose::identity());
/// assert_eq!(SweepOutcome::Initialized, odometry.process(sweep));
/// assert_eq!(1, odometry.trajectory().len());
/// ```
pub struct Odometry {
    config: OdometryConfig,
    registration: Registration,
    state: OdometryState,
    sink: Option<Box<dyn VisualizationSink + Send>>,
}

impl Odometry {
    /// Creates a new pipeline.
    ///
    /// # Errors
    ///
    /// If `config` is invalid
    pub fn new(config: OdometryConfig) -> Result<Self> {
        config.validate().context("Invalid odometry configuration")?;
        Ok(Self {
            registration: Registration::new(&config),
            config,
            state: OdometryState::default(),
            sink: None,
        })
    }

    /// Presents the full cloud and the features of every processed sweep to `sink`
    pub fn with_sink(mut self, sink: Box<dyn VisualizationSink + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &OdometryConfig {
        &self.config
    }

    /// Accumulated pose of the latest sweep in the frame of the first sweep
    pub fn pose(&self) -> Pose {
        self.state.pose
    }

    /// One pose per sweep that was not skipped
    pub fn trajectory(&self) -> &[StampedPose] {
        &self.state.trajectory
    }

    /// Last accepted motion between two sweeps
    pub fn last_increment(&self) -> Pose {
        self.state.last_increment
    }

    /// Points of the last accepted sweep with the motion distortion removed. Empty if de-skewed clouds are not
    /// kept
    pub fn deskewed_cloud(&self) -> &[Point] {
        &self.state.deskewed
    }

    /// Features of the sweep that the next sweep will be registered against
    pub fn last_features(&self) -> Option<&FeatureSet> {
        self.state.reference.as_ref().map(|r| r.features())
    }

    /// Number of sweeps that were not skipped
    pub fn sweeps_processed(&self) -> usize {
        self.state.sweeps_processed
    }

    /// Forgets all state, the next sweep starts a new trajectory
    pub fn reset(&mut self) {
        self.state = OdometryState::default();
    }

    /// Runs one sweep through the pipeline
    pub fn process(&mut self, message: SweepMessage) -> SweepOutcome {
        let start = Instant::now();

        let scan = match organize(&message, &self.config.organize) {
            Ok(scan) => scan,
            Err(reason) => return self.skip(reason),
        };
        if let Some(previous) = self.state.last_timestamp {
            if message.timestamp <= previous {
                return self.skip(SkipReason::StaleTimestamp {
                    previous,
                    current: message.timestamp,
                });
            }
        }

        let ground = mark_ground(&scan, &self.config.ground);
        let features = extract_features(&scan, &self.config.features, Some(&ground));
        let points = scan.iter_points().copied().collect::<Vec<_>>();
        self.present(message.timestamp, &points, &features);

        self.state.sweeps_processed += 1;
        self.state.last_timestamp = Some(message.timestamp);

        let reference = match self.state.reference.as_ref() {
            Some(reference) => reference,
            None => {
                debug!(
                    "Initialized odometry at {} with {} edge and {} planar features",
                    message.timestamp,
                    features.edge.len(),
                    features.planar.len()
                );
                self.state.trajectory.push(StampedPose {
                    timestamp: message.timestamp,
                    pose: self.state.pose,
                });
                if self.config.pipeline.keep_deskewed_cloud {
                    self.state.deskewed = points;
                }
                self.state.reference = Some(ReferenceModel::new(features));
                return SweepOutcome::Initialized;
            }
        };

        let initial = match self.config.registration.initial_guess {
            InitialGuess::Identity => Pose::identity(),
            InitialGuess::ConstantVelocity => self.state.last_increment,
        };
        let result = self.registration.register(reference, &features, &initial);

        let accepted = match result.status {
            RegistrationStatus::Converged => true,
            RegistrationStatus::MaxIterations => self.config.pipeline.accept_unconverged,
            _ => false,
        };

        let mut report = SweepReport {
            timestamp: message.timestamp,
            increment: Pose::identity(),
            pose: self.state.pose,
            status: result.status,
            rounds: result.rounds,
            iterations: result.iterations,
            edge_features: features.edge.len(),
            planar_features: features.planar.len(),
            edge_correspondences: result.edge_correspondences,
            planar_correspondences: result.planar_correspondences,
            min_eigenvalue: result.min_eigenvalue,
            elapsed: Duration::default(),
        };

        if !accepted {
            self.state.trajectory.push(StampedPose {
                timestamp: message.timestamp,
                pose: self.state.pose,
            });
            report.elapsed = start.elapsed();
            warn!(
                "Registration of sweep {} failed ({:?}), keeping the previous pose",
                message.timestamp, result.status
            );
            return SweepOutcome::Fallback(report);
        }

        let increment = result.pose;
        self.state.pose = self.state.pose.compose(&increment);
        self.state.last_increment = increment;
        self.state.trajectory.push(StampedPose {
            timestamp: message.timestamp,
            pose: self.state.pose,
        });
        if self.config.pipeline.keep_deskewed_cloud {
            self.state.deskewed = if self.config.deskew.enabled {
                deskew(&points, &increment, self.config.deskew.target)
            } else {
                points
            };
        }
        self.state.reference = Some(ReferenceModel::new(features));

        report.increment = increment;
        report.pose = self.state.pose;
        report.elapsed = start.elapsed();
        debug!(
            "Sweep {}: {:?} after {} iterations, moved {:.3}m / {:.3}deg in {:?}",
            message.timestamp,
            result.status,
            result.iterations,
            increment.translation_norm(),
            increment.rotation_angle().to_degrees(),
            report.elapsed
        );
        SweepOutcome::Updated(report)
    }

    fn skip(&self, reason: SkipReason) -> SweepOutcome {
        warn!("Skipping sweep: {}", reason);
        SweepOutcome::Skipped(reason)
    }

    fn present(&mut self, timestamp: f64, points: &[Point], features: &FeatureSet) {
        if let Some(sink) = self.sink.as_mut() {
            let clouds = [
                LabeledCloud::full_cloud(points),
                LabeledCloud::edges(&features.edge),
                LabeledCloud::planar(&features.planar),
            ];
            if let Err(e) = sink.present(timestamp, &clouds) {
                warn!("Visualization failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solver::DivergenceReason,
        synthetic::{AxisBox, SyntheticScene, SyntheticSensor},
    };
    use std::sync::{Arc, Mutex};
    use sweep_core::{math, nalgebra::Vector3};

    fn static_sweep(timestamp: f64, at: &Pose) -> SweepMessage {
        SyntheticSensor::default().message(timestamp, &SyntheticScene::room(), at, &Pose::identity())
    }

    #[test]
    fn test_empty_sweep_is_skipped() {
        let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
        assert_eq!(
            SweepOutcome::Skipped(SkipReason::EmptySweep),
            odometry.process(SweepMessage::new(0.0, vec![]))
        );
        assert_eq!(0, odometry.sweeps_processed());
        assert!(odometry.trajectory().is_empty());
        assert!(odometry.last_features().is_none());

        assert_eq!(
            SweepOutcome::Initialized,
            odometry.process(static_sweep(0.0, &Pose::identity()))
        );
        let pose = odometry.pose();
        assert!(matches!(
            odometry.process(SweepMessage::new(0.1, vec![])),
            SweepOutcome::Skipped(SkipReason::EmptySweep)
        ));
        assert_eq!(1, odometry.sweeps_processed());
        assert_eq!(1, odometry.trajectory().len());
        assert_eq!(pose, odometry.pose());
    }

    #[test]
    fn test_stale_timestamp_is_skipped() {
        let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
        odometry.process(static_sweep(1.0, &Pose::identity()));
        assert!(matches!(
            odometry.process(static_sweep(1.0, &Pose::identity())),
            SweepOutcome::Skipped(SkipReason::StaleTimestamp { .. })
        ));
        assert_eq!(1, odometry.sweeps_processed());
    }

    #[test]
    fn test_tracks_constant_motion() {
        let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
        let step = Pose::from_euler(0.0, 0.0, 0.5_f64.to_radians(), Vector3::new(0.15, 0.02, 0.0));
        let mut truth = Pose::identity();
        assert_eq!(SweepOutcome::Initialized, odometry.process(static_sweep(0.0, &truth)));
        for k in 1..4 {
            truth = truth.compose(&step);
            match odometry.process(static_sweep(k as f64 * 0.1, &truth)) {
                SweepOutcome::Updated(report) => {
                    assert_eq!(Confidence::High, report.confidence());
                    assert!(report.iterations < OdometryConfig::default().solver.max_iterations * 4);
                }
                other => panic!("Unexpected outcome {:?}", other),
            }
        }
        assert_eq!(4, odometry.trajectory().len());
        assert!((odometry.pose().translation - truth.translation).norm() < 0.1);
        assert!(math::angle_between(&odometry.pose().rotation, &truth.rotation) < 1.0_f64.to_radians());
        assert!((odometry.last_increment().translation - step.translation).norm() < 0.05);
        assert!(!odometry.deskewed_cloud().is_empty());
    }

    #[test]
    fn test_insufficient_features_fall_back() {
        let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
        odometry.process(static_sweep(0.0, &Pose::identity()));
        let reference_edges = odometry.last_features().unwrap().edge.len();

        // Too few points on a ring for any curvature window
        let sparse = (0..8)
            .map(|i| Point::new(Vector3::new(5.0, i as f64 * 0.1, 0.0), 1.0, 8, i as f32 / 8.0))
            .collect();
        match odometry.process(SweepMessage::new(0.1, sparse)) {
            SweepOutcome::Fallback(report) => {
                assert_eq!(RegistrationStatus::InsufficientFeatures, report.status);
                assert_eq!(Confidence::Low, report.confidence());
                assert_eq!(Pose::identity(), report.increment);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(2, odometry.trajectory().len());
        assert_eq!(odometry.trajectory()[0].pose, odometry.trajectory()[1].pose);
        assert_eq!(reference_edges, odometry.last_features().unwrap().edge.len());
        assert_eq!(Pose::identity(), odometry.last_increment());
    }

    /// Only the floor is within range, so nothing constrains horizontal motion or yaw
    fn floor_sweep(timestamp: f64, at: &Pose) -> SweepMessage {
        let scene = SyntheticScene {
            room: AxisBox::new(Vector3::new(-200.0, -200.0, -1.5), Vector3::new(200.0, 200.0, 200.0)),
            obstacles: vec![],
        };
        SyntheticSensor::default().message(timestamp, &scene, at, &Pose::identity())
    }

    #[test]
    fn test_degenerate_geometry_falls_back() {
        let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
        assert_eq!(
            SweepOutcome::Initialized,
            odometry.process(floor_sweep(0.0, &Pose::identity()))
        );
        let moved = Pose::from_euler(0.0, 0.0, 0.0, Vector3::new(0.1, 0.0, 0.0));
        match odometry.process(floor_sweep(0.1, &moved)) {
            SweepOutcome::Fallback(report) => {
                assert_eq!(
                    RegistrationStatus::Diverged(DivergenceReason::Degenerate),
                    report.status
                );
                assert_eq!(Confidence::Low, report.confidence());
                assert_eq!(Pose::identity(), report.increment);
                assert_eq!(Pose::identity(), report.pose);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(Pose::identity(), odometry.pose());
        assert_eq!(2, odometry.trajectory().len());
        assert_eq!(Pose::identity(), odometry.trajectory()[1].pose);
        assert_eq!(Pose::identity(), odometry.last_increment());
    }

    #[test]
    fn test_time_budget_falls_back() {
        let mut config = OdometryConfig::default();
        config.solver.time_budget_ms = Some(0);
        let mut odometry = Odometry::new(config).unwrap();
        odometry.process(static_sweep(0.0, &Pose::identity()));
        let step = Pose::from_euler(0.0, 0.0, 0.5_f64.to_radians(), Vector3::new(0.15, 0.02, 0.0));
        match odometry.process(static_sweep(0.1, &step)) {
            SweepOutcome::Fallback(report) => {
                assert_eq!(RegistrationStatus::TimedOut, report.status);
                assert_eq!(Confidence::Low, report.confidence());
                assert_eq!(Pose::identity(), report.increment);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(Pose::identity(), odometry.pose());
        assert_eq!(2, odometry.trajectory().len());
        assert_eq!(odometry.trajectory()[0].pose, odometry.trajectory()[1].pose);
    }

    #[test]
    fn test_unconverged_estimate_has_low_confidence() {
        let mut config = OdometryConfig::default();
        config.solver.max_iterations = 1;
        config.solver.convergence_tolerance = 1e-12;
        let mut odometry = Odometry::new(config).unwrap();
        odometry.process(static_sweep(0.0, &Pose::identity()));
        let step = Pose::from_euler(0.0, 0.0, 0.5_f64.to_radians(), Vector3::new(0.15, 0.02, 0.0));
        match odometry.process(static_sweep(0.1, &step)) {
            SweepOutcome::Updated(report) => {
                assert_eq!(RegistrationStatus::MaxIterations, report.status);
                assert_eq!(Confidence::Low, report.confidence());
                assert_ne!(Pose::identity(), report.increment);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }

        let mut config = OdometryConfig::default();
        config.solver.max_iterations = 1;
        config.solver.convergence_tolerance = 1e-12;
        config.pipeline.accept_unconverged = false;
        let mut odometry = Odometry::new(config).unwrap();
        odometry.process(static_sweep(0.0, &Pose::identity()));
        match odometry.process(static_sweep(0.1, &step)) {
            SweepOutcome::Fallback(report) => {
                assert_eq!(RegistrationStatus::MaxIterations, report.status);
                assert_eq!(Confidence::Low, report.confidence());
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(Pose::identity(), odometry.pose());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = OdometryConfig::default();
        config.organize.num_rings = 0;
        assert!(Odometry::new(config).is_err());
    }

    struct RecordingSink(Arc<Mutex<Vec<(f64, Vec<String>)>>>);

    impl VisualizationSink for RecordingSink {
        fn present(&mut self, timestamp: f64, clouds: &[LabeledCloud]) -> Result<()> {
            let labels = clouds.iter().map(|c| c.label.clone()).collect();
            self.0.lock().unwrap().push((timestamp, labels));
            Ok(())
        }
    }

    #[test]
    fn test_sink_receives_clouds() {
        let recorded = Arc::new(Mutex::new(vec![]));
        let mut odometry = Odometry::new(OdometryConfig::default())
            .unwrap()
            .with_sink(Box::new(RecordingSink(recorded.clone())));
        odometry.process(static_sweep(0.5, &Pose::identity()));
        odometry.process(SweepMessage::new(0.6, vec![]));
        let recorded = recorded.lock().unwrap();
        assert_eq!(1, recorded.len());
        assert_eq!(0.5, recorded[0].0);
        assert_eq!(vec!["cloud", "edges", "planar"], recorded[0].1);
    }
}
