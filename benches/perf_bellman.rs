use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use markov_dp::problems::cake_eating::CakeEating;
use markov_dp::problems::shortest_path::ShortestPathGraph;
use markov_dp::problems::stopping::binomial_put;
use markov_dp::{
    solve_backward_induction, solve_bellman, solve_continuous, BellmanOptions, ContinuousOptions,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_graph(rng: &mut StdRng, n: usize, degree: usize) -> ShortestPathGraph {
    let adjacency = (0..n)
        .map(|u| {
            if u == n - 1 {
                Vec::new()
            } else {
                (0..degree)
                    .map(|_| (rng.gen_range(0..n), rng.gen_range(1.0..10.0)))
                    .collect()
            }
        })
        .collect();
    ShortestPathGraph::from_adjacency(adjacency, n - 1).expect("valid graph")
}

fn bench_value_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_iteration");
    for &n in &[100usize, 1_000] {
        let mut rng = StdRng::seed_from_u64(n as u64);
        let graph = random_graph(&mut rng, n, 6);
        let options = BellmanOptions::default().with_max_iterations(10 * n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &graph, |b, graph| {
            b.iter(|| criterion::black_box(solve_bellman(graph, &options).expect("converged")))
        });
    }
    group.finish();
}

fn bench_backward_induction(c: &mut Criterion) {
    let problem = binomial_put(100.0, 100.0, 1.02, 0.001, 250).expect("valid grid");
    c.bench_function("american_put_250", |b| {
        b.iter(|| criterion::black_box(solve_backward_induction(&problem).expect("solved")))
    });
}

fn bench_cake_eating(c: &mut Criterion) {
    let problem = CakeEating::new(0.9, 0.5).expect("valid parameters");
    let grid: Vec<f64> = (0..50).map(|i| 2.0 * i as f64 / 49.0).collect();
    let options = ContinuousOptions::default();
    c.bench_function("cake_eating_50", |b| {
        b.iter(|| {
            criterion::black_box(solve_continuous(&problem, &grid, &options).expect("converged"))
        })
    });
}

criterion_group!(benches, bench_value_iteration, bench_backward_induction, bench_cake_eating);
criterion_main!(benches);
