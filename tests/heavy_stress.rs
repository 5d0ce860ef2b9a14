#![cfg(feature = "heavy")]

use markov_dp::hmm::{empirical_marginals, ffbs_ensemble, forward_backward_model};
use markov_dp::problems::shortest_path::ShortestPathGraph;
use markov_dp::{solve_bellman, BellmanOptions, HiddenMarkovModel, RecursionMode};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_stochastic(rng: &mut StdRng, rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| {
            let raw: Vec<f64> = (0..cols).map(|_| rng.gen_range(0.05..1.0)).collect();
            let total: f64 = raw.iter().sum();
            raw.into_iter().map(|x| x / total).collect()
        })
        .collect()
}

#[test]
fn heavy_stress_long_sequence() {
    let mut rng = StdRng::seed_from_u64(123);
    let model = HiddenMarkovModel::from_matrices(
        random_stochastic(&mut rng, 8, 8),
        random_stochastic(&mut rng, 8, 16),
        None,
    )
    .unwrap();
    let (_, obs) = model.sample(200_000, &mut rng).unwrap();
    let post = forward_backward_model(&model, &obs, RecursionMode::LogDomain).unwrap();
    assert!(post.log_likelihood.is_finite());
    assert!(post.warnings.is_empty());
    for row in &post.smoothed {
        let total: f64 = row.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn heavy_stress_ffbs_ensemble() {
    let mut rng = StdRng::seed_from_u64(7);
    let model = HiddenMarkovModel::from_matrices(
        random_stochastic(&mut rng, 4, 4),
        random_stochastic(&mut rng, 4, 6),
        None,
    )
    .unwrap();
    let (_, obs) = model.sample(2_000, &mut rng).unwrap();
    let post = forward_backward_model(&model, &obs, RecursionMode::LogDomain).unwrap();
    let paths = ffbs_ensemble(&post, model.chain(), 99, 20_000).unwrap();
    let marginals = empirical_marginals(&paths, 4).unwrap();
    let worst = marginals
        .iter()
        .zip(&post.smoothed)
        .flat_map(|(emp, exact)| emp.iter().zip(exact).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);
    assert!(worst < 0.025, "worst marginal deviation {worst}");
}

#[test]
fn heavy_stress_dense_graph() {
    let mut rng = StdRng::seed_from_u64(2024);
    let n = 400;
    let adjacency: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|u| {
            if u == n - 1 {
                return Vec::new();
            }
            (0..8).map(|_| (rng.gen_range(0..n), rng.gen_range(1.0..10.0))).collect()
        })
        .collect();
    let graph = ShortestPathGraph::from_adjacency(adjacency, n - 1).unwrap();
    let options = BellmanOptions::default().with_max_iterations(10_000);
    let sol = solve_bellman(&graph, &options).unwrap();
    assert_eq!(sol.values[n - 1], 0.0);
    assert!(sol.values.iter().all(|v| *v >= 0.0));
}
