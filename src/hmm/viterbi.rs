//! Viterbi decoding in the log domain.
//!
//! Backward pass over cost-to-go tables, then a forward argmax sweep:
//!
//! ```text
//! log_mu[T-1, i] = 0
//! log_mu[t-1, i] = max_j log E[j, y_t] + log P[i, j] + log_mu[t, j]
//! x*_0 = argmax_i log E[i, y0] + log π₀[i] + log_mu[0, i]
//! x*_t = argmax_i log E[i, y_t] + log P[x*_{t-1}, i] + log_mu[t, i]
//! ```
//!
//! Ties go to the lowest state index at every step.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{DpError, Result};
use crate::model::{validate_observations, HiddenMarkovModel, Matrix};
use crate::utils::argmax_first;
#[cfg(feature = "parallel")]
use crate::utils::default_chunk_len;

/// Most likely hidden path and its joint log-probability with the observations.
#[derive(Clone, Debug, PartialEq)]
pub struct ViterbiPath {
    pub states: Vec<usize>,
    /// `log P(x*, y)`.
    pub log_probability: f64,
}

/// Decode on raw matrices; `initial = None` selects the uniform distribution.
pub fn viterbi(
    p: &[Vec<f64>],
    e: &[Vec<f64>],
    obs: &[usize],
    initial: Option<&[f64]>,
) -> Result<ViterbiPath> {
    let model =
        HiddenMarkovModel::from_matrices(p.to_vec(), e.to_vec(), initial.map(<[f64]>::to_vec))?;
    viterbi_model(&model, obs)
}

/// Decode on a validated model.
///
/// # Errors
/// Observation validation errors, or [`DpError::ZeroLikelihood`] when every
/// path has probability zero.
pub fn viterbi_model(model: &HiddenMarkovModel, obs: &[usize]) -> Result<ViterbiPath> {
    validate_observations(obs, model.emission().n_symbols())?;

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!(
        "viterbi",
        n_states = model.chain().n_states(),
        len = obs.len()
    );
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let log_p = model.chain().log_matrix();
    let log_e = model.emission().log_matrix();
    let log_pi = model.initial().log_probabilities();
    let n = log_p.len();

    let log_mu = cost_to_go(log_p, log_e, obs);

    let mut scores: Vec<f64> = (0..n)
        .map(|i| log_e[i][obs[0]] + log_pi[i] + log_mu[0][i])
        .collect();
    let (first, best) = argmax_first(&scores).ok_or(DpError::ZeroLikelihood)?;
    if best == f64::NEG_INFINITY {
        return Err(DpError::ZeroLikelihood);
    }

    let mut states = Vec::with_capacity(obs.len());
    states.push(first);
    let mut log_probability = log_pi[first] + log_e[first][obs[0]];
    for (t, &y) in obs.iter().enumerate().skip(1) {
        let prev = states[t - 1];
        for (i, score) in scores.iter_mut().enumerate() {
            *score = log_e[i][y] + log_p[prev][i] + log_mu[t][i];
        }
        let (next, _) = argmax_first(&scores).ok_or(DpError::ZeroLikelihood)?;
        log_probability += log_p[prev][next] + log_e[next][y];
        states.push(next);
    }

    Ok(ViterbiPath {
        states,
        log_probability,
    })
}

fn cost_to_go(log_p: &[Vec<f64>], log_e: &[Vec<f64>], obs: &[usize]) -> Matrix {
    let n = log_p.len();
    let len = obs.len();
    let mut log_mu = vec![vec![0.0; n]; len];
    for t in (1..len).rev() {
        let y = obs[t];
        for i in 0..n {
            let best = (0..n)
                .map(|j| log_e[j][y] + log_p[i][j] + log_mu[t][j])
                .fold(f64::NEG_INFINITY, f64::max);
            log_mu[t - 1][i] = best;
        }
    }
    log_mu
}

/// Decode many sequences against one model; parallel under `parallel`.
///
/// Fails on the first invalid sequence.
pub fn viterbi_batch(
    model: &HiddenMarkovModel,
    sequences: &[Vec<usize>],
) -> Result<Vec<ViterbiPath>> {
    #[cfg(feature = "parallel")]
    {
        sequences
            .par_iter()
            .with_min_len(default_chunk_len(sequences.len()))
            .map(|obs| viterbi_model(model, obs))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        sequences.iter().map(|obs| viterbi_model(model, obs)).collect()
    }
}
