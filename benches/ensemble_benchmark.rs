use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use edrvfl::solver::{RidgeForm, solve_with_form};
use edrvfl::{EnsembleDeepRvfl, ModelConfig};
use ndarray::{Array1, Array2};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_problem(n_samples: usize, n_features: usize) -> (Array2<f64>, Array1<usize>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + n_samples as u64);
    let features = Array2::from_shape_fn((n_samples, n_features), |_| rng.sample(Standard));
    let labels = Array1::from_shape_fn(n_samples, |i| i % 10);
    (features, labels)
}

fn one_hot(labels: &Array1<usize>, num_classes: usize) -> Array2<f64> {
    Array2::from_shape_fn((labels.len(), num_classes), |(i, j)| {
        if labels[i] == j { 1.0 } else { 0.0 }
    })
}

fn benchmark_training(c: &mut Criterion) {
    let sizes = [200_usize, 800, 1600];
    let problems: Vec<_> = sizes
        .iter()
        .map(|&size| (size, random_problem(size, 64)))
        .collect();

    let mut group = c.benchmark_group("ensemble_train");
    group.sample_size(10);
    for (size, (features, labels)) in problems.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("relu_5x50", size), size, |b, _| {
            b.iter(|| {
                let config = ModelConfig::default().with_seed(7);
                let mut model = EnsembleDeepRvfl::new(config).unwrap();
                model
                    .train(black_box(features.view()), labels.view(), 10)
                    .unwrap();
                black_box(model);
            });
        });
    }
    group.finish();
}

fn benchmark_ridge_forms(c: &mut Criterion) {
    // Same design solved both ways: the primal form factorizes [p, p], the dual [n, n].
    let (design, labels) = random_problem(400, 120);
    let targets = one_hot(&labels, 10);

    let mut group = c.benchmark_group("ridge_solve");
    for form in [RidgeForm::Primal, RidgeForm::Dual] {
        group.bench_function(format!("{:?}", form), |b| {
            b.iter(|| {
                let solution =
                    solve_with_form(black_box(design.view()), targets.view(), 0.05, form)
                        .unwrap();
                black_box(solution);
            });
        });
    }
    group.finish();
}

criterion_group!(ensemble_benchmark, benchmark_training, benchmark_ridge_forms);
criterion_main!(ensemble_benchmark);
