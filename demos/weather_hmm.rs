//! Example: filtering, decoding and posterior sampling on the weather HMM.
//!
//! Run with:
//! `cargo run --example weather_hmm`

use markov_dp::hmm::empirical_marginals;
use markov_dp::{EngineBuilder, HiddenMarkovModel, Result};

const STATES: [&str; 2] = ["rainy", "sunny"];
const ACTIVITIES: [&str; 3] = ["walk", "shop", "clean"];

fn main() -> Result<()> {
    let model = HiddenMarkovModel::from_matrices(
        vec![vec![0.7, 0.3], vec![0.4, 0.6]],
        vec![vec![0.1, 0.4, 0.5], vec![0.6, 0.3, 0.1]],
        Some(vec![0.6, 0.4]),
    )?;
    let engine = EngineBuilder::new(model).build();

    // walk, shop, clean, clean, walk
    let obs = vec![0, 1, 2, 2, 0];

    let posterior = engine.forward_backward(&obs)?;
    println!("log P(y) = {:.6}", posterior.log_likelihood);
    println!("{:>3} {:>6} {:>10} {:>10}", "t", "obs", "P(rainy)", "smoothed");
    for (t, &y) in obs.iter().enumerate() {
        println!(
            "{t:>3} {:>6} {:>10.4} {:>10.4}",
            ACTIVITIES[y], posterior.filtered[t][0], posterior.smoothed[t][0]
        );
    }

    let best = engine.viterbi(&obs)?;
    let names: Vec<&str> = best.states.iter().map(|&s| STATES[s]).collect();
    println!("\nViterbi path: {} (log p = {:.6})", names.join(" -> "), best.log_probability);

    let draws = engine.sample_posterior_ensemble(&obs, 2024, 5_000)?;
    let marginals = empirical_marginals(&draws, STATES.len())?;
    println!("\nFFBS P(rainy) from {} draws:", draws.len());
    for (t, row) in marginals.iter().enumerate() {
        println!("  t = {t}: {:.4}", row[0]);
    }
    Ok(())
}
