use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{thread_rng, Rng};
use sweep_core::math;
use sweep_core::nalgebra::{Rotation3, Vector3};

fn gen_random_rotation_vectors(count: usize) -> Vec<Vector3<f64>> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect()
}

fn rodrigues_exp(omegas: &[Vector3<f64>]) {
    for omega in omegas {
        black_box(math::exp(omega));
    }
}

fn nalgebra_exp(omegas: &[Vector3<f64>]) {
    for omega in omegas {
        black_box(Rotation3::new(*omega));
    }
}

fn exp_log(omegas: &[Vector3<f64>]) {
    for omega in omegas {
        black_box(math::log(&math::exp(omega)));
    }
}

fn bench(c: &mut Criterion) {
    let omegas = gen_random_rotation_vectors(4096);

    c.bench_function("so3_exp_rodrigues", |b| {
        b.iter(|| rodrigues_exp(&omegas));
    });
    c.bench_function("so3_exp_nalgebra", |b| {
        b.iter(|| nalgebra_exp(&omegas));
    });
    c.bench_function("so3_exp_log", |b| {
        b.iter(|| exp_log(&omegas));
    });
}

criterion_group! {
    name = so3;
    config = Criterion::default().sample_size(40);
    targets = bench
}
criterion_main!(so3);
