use anyhow::Result;
use sweep_algorithms::{
    odometry::{Odometry, SweepOutcome},
    registration::RegistrationStatus,
    synthetic::{SyntheticScene, SyntheticSensor},
};
use sweep_core::{
    config::{InitialGuess, OdometryConfig},
    math,
    message::{SkipReason, SweepMessage},
    nalgebra::Vector3,
    pose::Pose,
    Point,
};

fn noisy_sensor() -> SyntheticSensor {
    SyntheticSensor {
        range_noise: 0.005,
        ..Default::default()
    }
}

/// Runs `steps` stop-and-go sweeps through a fresh pipeline and returns it together with the true final pose
fn run_sequence(config: OdometryConfig, step: &Pose, steps: usize) -> Result<(Odometry, Pose)> {
    let mut odometry = Odometry::new(config)?;
    let scene = SyntheticScene::room();
    let mut truth = Pose::identity();
    for k in 0..=steps {
        let mut sensor = noisy_sensor();
        sensor.seed = k as u64;
        let outcome = odometry.process(sensor.message(k as f64 * 0.1, &scene, &truth, &Pose::identity()));
        match (k, outcome) {
            (0, SweepOutcome::Initialized) => {}
            (_, SweepOutcome::Updated(report)) => {
                assert!(matches!(
                    report.status,
                    RegistrationStatus::Converged | RegistrationStatus::MaxIterations
                ));
            }
            (_, other) => panic!("Unexpected outcome for sweep {}: {:?}", k, other),
        }
        truth = truth.compose(step);
    }
    Ok((odometry, truth.compose(&step.inverse())))
}

#[test]
fn tracks_translation_and_yaw() -> Result<()> {
    let step = Pose::from_euler(0.0, 0.0, 1.0_f64.to_radians(), Vector3::new(0.15, -0.05, 0.02));
    let (odometry, truth) = run_sequence(OdometryConfig::default(), &step, 5)?;

    assert_eq!(6, odometry.trajectory().len());
    assert!(
        (odometry.pose().translation - truth.translation).norm() < 0.15,
        "{:?} vs {:?}",
        odometry.pose(),
        truth
    );
    assert!(math::angle_between(&odometry.pose().rotation, &truth.rotation) < 1.5_f64.to_radians());
    let increment = odometry.last_increment();
    assert!((increment.translation - step.translation).norm() < 0.05);
    assert!(math::angle_between(&increment.rotation, &step.rotation) < 0.5_f64.to_radians());
    Ok(())
}

#[test]
fn identity_initial_guess_also_converges() -> Result<()> {
    let mut config = OdometryConfig::default();
    config.registration.initial_guess = InitialGuess::Identity;
    let step = Pose::from_euler(0.0, 0.0, 0.0, Vector3::new(0.1, 0.0, 0.0));
    let (odometry, truth) = run_sequence(config, &step, 3)?;
    assert!((odometry.pose().translation - truth.translation).norm() < 0.1);
    Ok(())
}

#[test]
fn skipped_sweeps_leave_state_untouched() -> Result<()> {
    let mut odometry = Odometry::new(OdometryConfig::default())?;
    let scene = SyntheticScene::room();
    let sensor = SyntheticSensor::default();
    odometry.process(sensor.message(1.0, &scene, &Pose::identity(), &Pose::identity()));

    let pose = odometry.pose();
    let trajectory = odometry.trajectory().to_vec();
    let deskewed = odometry.deskewed_cloud().len();

    let mut malformed = sensor.message(2.0, &scene, &Pose::identity(), &Pose::identity());
    malformed.points[0].ring = 200;
    let outcomes = vec![
        odometry.process(SweepMessage::new(2.0, vec![])),
        odometry.process(malformed),
        odometry.process(sensor.message(0.5, &scene, &Pose::identity(), &Pose::identity())),
    ];
    assert!(matches!(outcomes[0], SweepOutcome::Skipped(SkipReason::EmptySweep)));
    assert!(matches!(outcomes[1], SweepOutcome::Skipped(SkipReason::Malformed(_))));
    assert!(matches!(
        outcomes[2],
        SweepOutcome::Skipped(SkipReason::StaleTimestamp { .. })
    ));

    assert_eq!(pose, odometry.pose());
    assert_eq!(trajectory, odometry.trajectory());
    assert_eq!(deskewed, odometry.deskewed_cloud().len());
    assert_eq!(1, odometry.sweeps_processed());
    Ok(())
}

#[test]
fn deskewed_cloud_is_dropped_when_not_kept() -> Result<()> {
    let mut config = OdometryConfig::default();
    config.pipeline.keep_deskewed_cloud = false;
    let mut odometry = Odometry::new(config)?;
    let sensor = SyntheticSensor::default();
    odometry.process(sensor.message(0.0, &SyntheticScene::room(), &Pose::identity(), &Pose::identity()));
    assert!(odometry.deskewed_cloud().is_empty());
    Ok(())
}

/// Median distance between the points of `cloud`, taken as seen from `pose`, and the surfaces of `scene` along the
/// same beams
fn median_surface_distance(scene: &SyntheticScene, pose: &Pose, cloud: &[Point]) -> f64 {
    let mut distances = cloud
        .iter()
        .filter_map(|p| {
            let range = p.position.norm();
            let direction = pose.rotation * (p.position / range);
            scene
                .cast(&pose.translation, &direction)
                .map(|surface| (surface - range).abs())
        })
        .collect::<Vec<_>>();
    assert!(!distances.is_empty());
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
    distances[distances.len() / 2]
}

#[test]
fn deskewing_removes_motion_distortion() -> Result<()> {
    let mut odometry = Odometry::new(OdometryConfig::default())?;
    let scene = SyntheticScene::room();
    let sensor = SyntheticSensor::default();
    // The sensor keeps moving while it spins, every sweep ends where the next one starts
    let step = Pose::from_euler(0.0, 0.0, 1.0_f64.to_radians(), Vector3::new(0.15, 0.02, 0.0));
    let mut start = Pose::identity();
    let mut raw = vec![];
    for k in 0..4 {
        let message = sensor.message(k as f64 * 0.1, &scene, &start, &step);
        raw = message.points.clone();
        match (k, odometry.process(message)) {
            (0, SweepOutcome::Initialized) => {}
            (_, SweepOutcome::Updated(_)) => {}
            (_, other) => panic!("Unexpected outcome for sweep {}: {:?}", k, other),
        }
        start = start.compose(&step);
    }
    // `start` is where the last sweep ended
    let end = start;

    assert!((odometry.last_increment().translation - step.translation).norm() < 0.05);
    let deskewed = odometry.deskewed_cloud();
    assert!(!deskewed.is_empty());
    let raw_error = median_surface_distance(&scene, &end, &raw);
    let deskewed_error = median_surface_distance(&scene, &end, deskewed);
    assert!(
        deskewed_error < 0.5 * raw_error,
        "de-skewed {} vs raw {}",
        deskewed_error,
        raw_error
    );
    Ok(())
}
