use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use softreg::{Hyperparameters, SeedPolicy, SoftmaxRegression};

const N_FEATURES: usize = 16;
const N_CLASSES: usize = 8;

fn synthetic_clusters(n_samples: usize) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(7);
    let labels: Vec<usize> = (0..n_samples).map(|i| i % N_CLASSES).collect();
    let features = Array2::from_shape_fn((n_samples, N_FEATURES), |(row, col)| {
        let center = if col % N_CLASSES == labels[row] { 2.0 } else { 0.0 };
        center + rng.random_range(-0.5..0.5)
    });
    (features, labels)
}

fn bench_fit(c: &mut Criterion) {
    let hyperparameters = Hyperparameters {
        n_iter: 50,
        ..Hyperparameters::default()
    };
    for n_samples in [256usize, 2_048] {
        let data = synthetic_clusters(n_samples);
        c.bench_with_input(BenchmarkId::new("fit_50_iter", n_samples), &data, |b, (x, y)| {
            b.iter(|| {
                let mut model =
                    SoftmaxRegression::new(hyperparameters).with_seed(SeedPolicy::Fixed(1));
                model.fit(black_box(x), black_box(y));
                model
            });
        });
    }
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = synthetic_clusters(4_096);
    let mut model = SoftmaxRegression::new(Hyperparameters {
        n_iter: 200,
        ..Hyperparameters::default()
    })
    .with_seed(SeedPolicy::Fixed(1));
    model.fit(&x, &y);
    c.bench_with_input(BenchmarkId::new("predict", x.nrows()), &x, |b, x| {
        b.iter(|| model.predict(black_box(x)));
    });
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
