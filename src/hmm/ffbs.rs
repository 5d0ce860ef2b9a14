//! Forward filtering, backward sampling.
//!
//! Draws a hidden path from `P(x_0..x_{T-1} | y)` using the forward table of a
//! finished [`Posterior`]: `x_{T-1}` from the last filtered row, then for
//! `t = T-2 .. 0`
//!
//! ```text
//! P(x_t = i | x_{t+1}, y_0..=y_t) ∝ alpha[t, i] P[i, x_{t+1}]
//! ```
//!
//! Weights are formed from the log tables and normalized before sampling.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{DpError, Result};
use crate::hmm::Posterior;
use crate::model::{categorical, FiniteMarkovChain};
#[cfg(feature = "parallel")]
use crate::utils::default_chunk_len;
use crate::utils::normalize_log;

/// Draw one posterior path.
///
/// # Errors
/// [`DpError::DimensionMismatch`] if the chain and posterior disagree on the
/// state count, [`DpError::EmptyObservations`] for an empty posterior, and
/// [`DpError::DegenerateDistribution`] when every weight at some step is zero.
pub fn ffbs<R: Rng + ?Sized>(
    posterior: &Posterior,
    chain: &FiniteMarkovChain,
    rng: &mut R,
) -> Result<Vec<usize>> {
    check_dimensions(posterior, chain)?;
    let len = posterior.len();
    let log_p = chain.log_matrix();
    let log_alpha = &posterior.log_alpha;

    let mut path = vec![0; len];
    path[len - 1] = draw(&log_alpha[len - 1], len - 1, rng)?;

    let mut log_weights = vec![0.0; chain.n_states()];
    for t in (0..len - 1).rev() {
        let next = path[t + 1];
        for (i, w) in log_weights.iter_mut().enumerate() {
            *w = log_alpha[t][i] + log_p[i][next];
        }
        path[t] = draw(&log_weights, t, rng)?;
    }
    Ok(path)
}

fn draw<R: Rng + ?Sized>(log_weights: &[f64], t: usize, rng: &mut R) -> Result<usize> {
    let weights = normalize_log(log_weights).ok_or(DpError::DegenerateDistribution { t })?;
    Ok(categorical(&weights, t)?.sample(rng))
}

fn check_dimensions(posterior: &Posterior, chain: &FiniteMarkovChain) -> Result<()> {
    if posterior.is_empty() {
        return Err(DpError::EmptyObservations);
    }
    if posterior.n_states() != chain.n_states() {
        return Err(DpError::DimensionMismatch {
            what: "posterior states",
            expected: chain.n_states(),
            got: posterior.n_states(),
        });
    }
    Ok(())
}

/// Seed of draw `index` in an ensemble seeded with `seed`.
#[inline]
pub fn draw_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// `draws` independent FFBS paths.
///
/// Draw `i` uses its own `StdRng` seeded with [`draw_seed`]`(seed, i)`, so the
/// output depends only on `seed` and is the same with or without the
/// `parallel` feature.
pub fn ffbs_ensemble(
    posterior: &Posterior,
    chain: &FiniteMarkovChain,
    seed: u64,
    draws: usize,
) -> Result<Vec<Vec<usize>>> {
    check_dimensions(posterior, chain)?;

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("ffbs_ensemble", draws, len = posterior.len());
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let one = |i: usize| {
        let mut rng = StdRng::seed_from_u64(draw_seed(seed, i));
        ffbs(posterior, chain, &mut rng)
    };

    #[cfg(feature = "parallel")]
    {
        (0..draws)
            .into_par_iter()
            .with_min_len(default_chunk_len(draws))
            .map(one)
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..draws).map(one).collect()
    }
}

/// Per-time state frequencies across sampled paths (`T × n_states`).
///
/// Returns an empty table for an empty ensemble.
///
/// # Errors
/// [`DpError::DimensionMismatch`] when the paths differ in length or a path
/// visits a state `>= n_states`.
pub fn empirical_marginals(paths: &[Vec<usize>], n_states: usize) -> Result<Vec<Vec<f64>>> {
    let Some(len) = paths.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    let mut counts = vec![vec![0usize; n_states]; len];
    for path in paths {
        if path.len() != len {
            return Err(DpError::DimensionMismatch {
                what: "sampled path length",
                expected: len,
                got: path.len(),
            });
        }
        for (row, &s) in counts.iter_mut().zip(path) {
            let slot = row.get_mut(s).ok_or(DpError::DimensionMismatch {
                what: "sampled state",
                expected: n_states,
                got: s,
            })?;
            *slot += 1;
        }
    }
    let total = paths.len() as f64;
    Ok(counts
        .into_iter()
        .map(|row| row.into_iter().map(|c| c as f64 / total).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::{forward_backward_model, RecursionMode};
    use crate::model::HiddenMarkovModel;

    fn sticky() -> HiddenMarkovModel {
        HiddenMarkovModel::from_matrices(
            vec![vec![0.9, 0.1], vec![0.2, 0.8]],
            vec![vec![0.8, 0.2], vec![0.3, 0.7]],
            None,
        )
        .unwrap()
    }

    #[test]
    fn same_seed_same_path() {
        let model = sticky();
        let post =
            forward_backward_model(&model, &[0, 1, 1, 0, 1], RecursionMode::LogDomain).unwrap();
        let a = ffbs(&post, model.chain(), &mut StdRng::seed_from_u64(3)).unwrap();
        let b = ffbs(&post, model.chain(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn zero_transitions_are_never_sampled() {
        // state 1 is absorbing and unreachable from state 0
        let model = HiddenMarkovModel::from_matrices(
            vec![vec![0.5, 0.5], vec![0.0, 1.0]],
            vec![vec![0.5, 0.5], vec![0.5, 0.5]],
            None,
        )
        .unwrap();
        let post = forward_backward_model(&model, &[0, 1, 0, 1], RecursionMode::LogDomain).unwrap();
        let paths = ffbs_ensemble(&post, model.chain(), 11, 200).unwrap();
        for path in &paths {
            assert!(path.windows(2).all(|w| !(w[0] == 1 && w[1] == 0)));
        }
    }

    #[test]
    fn ensemble_matches_sequential_seeding() {
        let model = sticky();
        let post = forward_backward_model(&model, &[1, 1, 0], RecursionMode::LogDomain).unwrap();
        let ensemble = ffbs_ensemble(&post, model.chain(), 42, 8).unwrap();
        for (i, path) in ensemble.iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(draw_seed(42, i));
            assert_eq!(path, &ffbs(&post, model.chain(), &mut rng).unwrap());
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let model = sticky();
        let post = forward_backward_model(&model, &[0], RecursionMode::LogDomain).unwrap();
        let other = FiniteMarkovChain::new(vec![vec![1.0]]).unwrap();
        assert!(matches!(
            ffbs(&post, &other, &mut StdRng::seed_from_u64(0)),
            Err(DpError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn marginals_count_visits() {
        let m = empirical_marginals(&[vec![0, 1], vec![1, 1]], 2).unwrap();
        assert_eq!(m, vec![vec![0.5, 0.5], vec![0.0, 1.0]]);
        assert!(empirical_marginals(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn marginals_reject_foreign_paths() {
        assert!(matches!(
            empirical_marginals(&[vec![0, 2]], 2),
            Err(DpError::DimensionMismatch { what: "sampled state", expected: 2, got: 2 })
        ));
        assert!(matches!(
            empirical_marginals(&[vec![0, 1], vec![1]], 2),
            Err(DpError::DimensionMismatch { what: "sampled path length", .. })
        ));
    }
}
