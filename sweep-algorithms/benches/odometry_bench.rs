use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sweep_algorithms::{
    features::extract_features,
    ground::mark_ground,
    odometry::Odometry,
    registration::{ReferenceModel, Registration},
    synthetic::{SyntheticScene, SyntheticSensor},
};
use sweep_core::{
    config::OdometryConfig,
    nalgebra::Vector3,
    pose::Pose,
    scan::Scan,
};

fn synthetic_scan(at: &Pose) -> Scan {
    let sensor = SyntheticSensor {
        range_noise: 0.01,
        ..Default::default()
    };
    Scan::from_points(
        0.0,
        sensor.sweep(&SyntheticScene::room(), at, &Pose::identity()),
    )
}

fn bench(c: &mut Criterion) {
    let config = OdometryConfig::default();
    let step = Pose::from_euler(0.0, 0.0, 0.01, Vector3::new(0.2, 0.05, 0.0));
    let first = synthetic_scan(&Pose::identity());
    let second = synthetic_scan(&step);

    c.bench_function("ground_marking", |b| {
        b.iter(|| black_box(mark_ground(&first, &config.ground)));
    });

    c.bench_function("feature_extraction", |b| {
        b.iter(|| black_box(extract_features(&first, &config.features, None)));
    });

    let reference = ReferenceModel::new(extract_features(&first, &config.features, None));
    let current = extract_features(&second, &config.features, None);
    let registration = Registration::new(&config);
    c.bench_function("registration", |b| {
        b.iter(|| black_box(registration.register(&reference, &current, &Pose::identity())));
    });

    let sensor = SyntheticSensor::default();
    let scene = SyntheticScene::room();
    let sweeps = (0..5)
        .map(|k| {
            let mut start = Pose::identity();
            for _ in 0..k {
                start = start.compose(&step);
            }
            sensor.message(k as f64 * 0.1, &scene, &start, &step)
        })
        .collect::<Vec<_>>();
    c.bench_function("odometry_five_sweeps", |b| {
        b.iter(|| {
            let mut odometry = Odometry::new(OdometryConfig::default()).unwrap();
            for sweep in sweeps.iter() {
                black_box(odometry.process(sweep.clone()));
            }
        });
    });
}

criterion_group! {
    name = odometry;
    config = Criterion::default().sample_size(20);
    targets = bench
}
criterion_main!(odometry);
