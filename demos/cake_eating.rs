//! Example: grid value iteration for CRRA cake eating against the closed form.
//!
//! Run with:
//! `cargo run --example cake_eating`

use markov_dp::problems::cake_eating::CakeEating;
use markov_dp::{solve_continuous, ContinuousOptions, Result, ValueAt};

fn main() -> Result<()> {
    let cake = CakeEating::new(0.9, 0.5)?;
    let grid: Vec<f64> = (0..=100).map(|i| 2.5 * i as f64 / 100.0).collect();

    let solution = solve_continuous(&cake, &grid, &ContinuousOptions::default())?;
    println!(
        "converged after {} iterations (residual {:.2e})",
        solution.iterations, solution.residual
    );

    let value = solution.value_function();
    let policy = solution.policy_function();
    println!("{:>6} {:>10} {:>10} {:>10} {:>10}", "x", "V(x)", "exact", "c(x)", "exact");
    for x in [0.5, 1.0, 1.5, 2.0, 2.5] {
        let exact_v = cake.analytic_value(x).unwrap_or(f64::NAN);
        println!(
            "{x:>6.2} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            value.value_at(x),
            exact_v,
            policy.value_at(x),
            cake.analytic_policy(x)
        );
    }
    Ok(())
}
