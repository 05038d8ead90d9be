use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fedguard::aggregators::{Bicotti, FedAvg, MutualInformation, ServerAggregator};
use fedguard::probe::{Activation, LinearProbe};
use fedguard::{ModelParams, ServerState};
use ndarray::{Array1, Array2};

const INPUT_DIM: usize = 32;
const OUTPUT_DIM: usize = 10;

fn client_updates(n_clients: usize, n_params: usize) -> Vec<ModelParams> {
    (0..n_clients)
        .map(|i| {
            ModelParams::from_flat(
                (0..n_params)
                    .map(|j| ((i * n_params + j) as f32).sin() * 0.01)
                    .collect(),
            )
        })
        .collect()
}

fn linear_updates(n_clients: usize) -> Vec<ModelParams> {
    (0..n_clients)
        .map(|i| {
            ModelParams::new(vec![
                Array2::from_shape_fn((INPUT_DIM, OUTPUT_DIM), |(r, c)| {
                    ((i * 31 + r * OUTPUT_DIM + c) as f32).cos() * 0.01
                })
                .into_dyn(),
                Array1::from_elem(OUTPUT_DIM, 0.001 * i as f32).into_dyn(),
            ])
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for &n_clients in &[10, 50] {
        for &n_params in &[1_000usize, 100_000] {
            let updates = client_updates(n_clients, n_params);
            let state = ServerState::new(ModelParams::from_flat(vec![0.0; n_params]));
            let id = format!("{}c_{}p", n_clients, n_params);

            group.bench_with_input(BenchmarkId::new("fedavg", &id), &updates, |b, updates| {
                let mut agg = FedAvg::new(1.0, 0.0);
                b.iter(|| agg.apply_gradients(&state, updates).unwrap())
            });

            group.bench_with_input(BenchmarkId::new("bicotti", &id), &updates, |b, updates| {
                let mut agg = Bicotti::new(1.0, 0.0);
                b.iter(|| agg.apply_gradients(&state, updates).unwrap())
            });
        }
    }

    for &n_clients in &[10, 30] {
        let updates = linear_updates(n_clients);
        let state = ServerState::new(updates[0].zeros_like());
        let data = Array2::from_shape_fn((64, INPUT_DIM), |(r, c)| ((r * INPUT_DIM + c) as f32).sin());

        group.bench_with_input(
            BenchmarkId::new("mi", format!("{}c", n_clients)),
            &updates,
            |b, updates| {
                let mut agg = MutualInformation::new(
                    LinearProbe::new(INPUT_DIM, OUTPUT_DIM, Activation::Softmax),
                    data.clone(),
                    1.0,
                    0.9,
                );
                b.iter(|| agg.apply_gradients(&state, updates).unwrap())
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_aggregation);
criterion_main!(benches);
