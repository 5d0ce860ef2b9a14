//! Forward-backward filtering and smoothing.
//!
//! ```text
//! alpha[0, i] = E[i, y0] π₀[i]
//! alpha[t, i] = E[i, y_t] Σ_j alpha[t-1, j] P[j, i]
//! beta[T-1, i] = 1
//! beta[t, i]  = Σ_j E[j, y_{t+1}] beta[t+1, j] P[i, j]
//! ```
//!
//! Filtered marginals normalize `alpha[t, ·]`, smoothed marginals normalize
//! `alpha[t, ·] beta[t, ·]`, and the log-likelihood is `log Σ_i alpha[T-1, i]`.
//! Both tables are allocated per call and handed to the caller.

use std::fmt;

use crate::error::{DpError, Result};
use crate::hmm::RecursionMode;
use crate::model::{validate_observations, HiddenMarkovModel, Matrix};
use crate::utils::{log_sum_exp, normalize, normalize_log};

/// A row of the linear forward table that underflowed to exactly zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrecisionWarning {
    /// Time index of the zero row.
    pub t: usize,
}

impl fmt::Display for PrecisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alpha row at t = {} underflowed to zero; use RecursionMode::LogDomain",
            self.t
        )
    }
}

/// Everything one forward-backward pass produces. All tables are `T × n`.
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
    pub alpha: Matrix,
    pub beta: Matrix,
    pub log_alpha: Matrix,
    pub log_beta: Matrix,
    /// `P(x_t | y_0..=y_t)`.
    pub filtered: Matrix,
    /// `P(x_t | y_0..y_{T-1})`.
    pub smoothed: Matrix,
    pub log_likelihood: f64,
    pub mode: RecursionMode,
    /// Rows lost to underflow; always empty in log-domain mode.
    pub warnings: Vec<PrecisionWarning>,
}

impl Posterior {
    /// Sequence length `T`.
    pub fn len(&self) -> usize {
        self.log_alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_alpha.is_empty()
    }

    pub fn n_states(&self) -> usize {
        self.log_alpha.first().map_or(0, Vec::len)
    }
}

/// Run forward-backward on raw matrices in log-domain mode.
///
/// `initial = None` selects the uniform distribution.
///
/// # Errors
/// Any model validation error, an empty or out-of-alphabet observation
/// sequence, or [`DpError::ZeroLikelihood`].
pub fn forward_backward(
    p: &[Vec<f64>],
    e: &[Vec<f64>],
    obs: &[usize],
    initial: Option<&[f64]>,
) -> Result<Posterior> {
    let model =
        HiddenMarkovModel::from_matrices(p.to_vec(), e.to_vec(), initial.map(<[f64]>::to_vec))?;
    forward_backward_model(&model, obs, RecursionMode::LogDomain)
}

/// Run forward-backward on a validated model.
pub fn forward_backward_model(
    model: &HiddenMarkovModel,
    obs: &[usize],
    mode: RecursionMode,
) -> Result<Posterior> {
    validate_observations(obs, model.emission().n_symbols())?;

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!(
        "forward_backward",
        n_states = model.chain().n_states(),
        len = obs.len(),
        mode = ?mode
    );
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let posterior = match mode {
        RecursionMode::LogDomain => log_domain(model, obs)?,
        RecursionMode::Termwise => termwise(model, obs),
    };

    #[cfg(feature = "tracing")]
    if let Some(first) = posterior.warnings.first() {
        tracing::warn!(
            first_t = first.t,
            rows = posterior.warnings.len(),
            "forward table underflowed; use RecursionMode::LogDomain"
        );
    }

    Ok(posterior)
}

fn log_domain(model: &HiddenMarkovModel, obs: &[usize]) -> Result<Posterior> {
    let log_alpha = forward_log(model, obs);
    let log_beta = backward_log(model, obs);

    let log_likelihood = log_alpha.last().map_or(f64::NEG_INFINITY, |row| log_sum_exp(row));
    if log_likelihood == f64::NEG_INFINITY {
        return Err(DpError::ZeroLikelihood);
    }

    let filtered = log_alpha
        .iter()
        .map(|row| normalize_log(row).ok_or(DpError::ZeroLikelihood))
        .collect::<Result<Matrix>>()?;
    // log_beta[T-1] is all zeros, so the last smoothed row repeats the
    // filtered computation bit for bit.
    let smoothed = log_alpha
        .iter()
        .zip(&log_beta)
        .map(|(a, b)| {
            let joint: Vec<f64> = a.iter().zip(b).map(|(x, y)| x + y).collect();
            normalize_log(&joint).ok_or(DpError::ZeroLikelihood)
        })
        .collect::<Result<Matrix>>()?;

    Ok(Posterior {
        alpha: exp_table(&log_alpha),
        beta: exp_table(&log_beta),
        log_alpha,
        log_beta,
        filtered,
        smoothed,
        log_likelihood,
        mode: RecursionMode::LogDomain,
        warnings: Vec::new(),
    })
}

fn forward_log(model: &HiddenMarkovModel, obs: &[usize]) -> Matrix {
    let log_p = model.chain().log_matrix();
    let log_e = model.emission().log_matrix();
    let log_pi = model.initial().log_probabilities();
    let n = log_p.len();

    #[cfg(feature = "tracing")]
    let span = tracing::trace_span!("forward_sweep", len = obs.len());
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut log_alpha: Matrix = Vec::with_capacity(obs.len());
    log_alpha.push((0..n).map(|i| log_e[i][obs[0]] + log_pi[i]).collect());
    let mut terms = vec![0.0; n];
    for &y in &obs[1..] {
        let prev = &log_alpha[log_alpha.len() - 1];
        let row: Vec<f64> = (0..n)
            .map(|i| {
                for (j, term) in terms.iter_mut().enumerate() {
                    *term = prev[j] + log_p[j][i];
                }
                log_e[i][y] + log_sum_exp(&terms)
            })
            .collect();
        log_alpha.push(row);
    }
    log_alpha
}

fn backward_log(model: &HiddenMarkovModel, obs: &[usize]) -> Matrix {
    let log_p = model.chain().log_matrix();
    let log_e = model.emission().log_matrix();
    let n = log_p.len();
    let len = obs.len();

    #[cfg(feature = "tracing")]
    let span = tracing::trace_span!("backward_sweep", len);
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut log_beta = vec![vec![0.0; n]; len];
    let mut terms = vec![0.0; n];
    for t in (0..len - 1).rev() {
        let y = obs[t + 1];
        for i in 0..n {
            for (j, term) in terms.iter_mut().enumerate() {
                *term = log_e[j][y] + log_p[i][j] + log_beta[t + 1][j];
            }
            log_beta[t][i] = log_sum_exp(&terms);
        }
    }
    log_beta
}

fn termwise(model: &HiddenMarkovModel, obs: &[usize]) -> Posterior {
    let p = model.chain().matrix();
    let e = model.emission().matrix();
    let pi = model.initial().probabilities();
    let log_p = model.chain().log_matrix();
    let log_e = model.emission().log_matrix();
    let n = p.len();
    let len = obs.len();

    let mut alpha: Matrix = Vec::with_capacity(len);
    alpha.push((0..n).map(|i| e[i][obs[0]] * pi[i]).collect());
    for &y in &obs[1..] {
        let prev = &alpha[alpha.len() - 1];
        let row: Vec<f64> = (0..n)
            .map(|i| e[i][y] * (0..n).map(|j| prev[j] * p[j][i]).sum::<f64>())
            .collect();
        alpha.push(row);
    }

    let mut beta: Matrix = vec![vec![1.0; n]; len];
    for t in (0..len - 1).rev() {
        let y = obs[t + 1];
        for i in 0..n {
            beta[t][i] = (0..n)
                .map(|j| (log_e[j][y] + beta[t + 1][j].ln() + log_p[i][j]).exp())
                .sum();
        }
    }

    let warnings: Vec<PrecisionWarning> = alpha
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().sum::<f64>() == 0.0)
        .map(|(t, _)| PrecisionWarning { t })
        .collect();

    // rows that underflowed normalize to NaN
    let filtered: Matrix = alpha
        .iter()
        .map(|row| normalize(row).unwrap_or_else(|| vec![f64::NAN; n]))
        .collect();
    let smoothed: Matrix = alpha
        .iter()
        .zip(&beta)
        .map(|(a, b)| {
            let joint: Vec<f64> = a.iter().zip(b).map(|(x, y)| x * y).collect();
            normalize(&joint).unwrap_or_else(|| vec![f64::NAN; n])
        })
        .collect();

    let log_likelihood = alpha[len - 1].iter().sum::<f64>().ln();

    Posterior {
        log_alpha: ln_table(&alpha),
        log_beta: ln_table(&beta),
        alpha,
        beta,
        filtered,
        smoothed,
        log_likelihood,
        mode: RecursionMode::Termwise,
        warnings,
    }
}

fn exp_table(m: &[Vec<f64>]) -> Matrix {
    m.iter().map(|row| row.iter().map(|x| x.exp()).collect()).collect()
}

fn ln_table(m: &[Vec<f64>]) -> Matrix {
    m.iter().map(|row| row.iter().map(|x| x.ln()).collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> HiddenMarkovModel {
        HiddenMarkovModel::from_matrices(
            vec![vec![0.7, 0.3], vec![0.4, 0.6]],
            vec![vec![0.1, 0.4, 0.5], vec![0.6, 0.3, 0.1]],
            Some(vec![0.6, 0.4]),
        )
        .unwrap()
    }

    #[test]
    fn single_observation_filtered_equals_smoothed() {
        let post = forward_backward_model(&weather(), &[2], RecursionMode::LogDomain).unwrap();
        // alpha[0] = (0.5 * 0.6, 0.1 * 0.4) = (0.30, 0.04)
        assert!((post.filtered[0][0] - 0.30 / 0.34).abs() < 1e-12);
        assert_eq!(post.filtered, post.smoothed);
        assert!((post.log_likelihood - 0.34f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn two_step_likelihood_by_hand() {
        let post = forward_backward_model(&weather(), &[0, 1], RecursionMode::LogDomain).unwrap();
        // alpha[0] = (0.06, 0.24)
        // alpha[1] = (0.4 * (0.06*0.7 + 0.24*0.4), 0.3 * (0.06*0.3 + 0.24*0.6))
        let a1: [f64; 2] = [0.4 * (0.042 + 0.096), 0.3 * (0.018 + 0.144)];
        let expected = (a1[0] + a1[1]).ln();
        assert!((post.log_likelihood - expected).abs() < 1e-12);
        assert!((post.alpha[1][0] - a1[0]).abs() < 1e-12);
        assert_eq!(post.beta[1], vec![1.0, 1.0]);
    }

    #[test]
    fn modes_agree_on_short_sequences() {
        let obs = [0, 2, 1, 1, 0, 2, 2, 1];
        let log = forward_backward_model(&weather(), &obs, RecursionMode::LogDomain).unwrap();
        let lin = forward_backward_model(&weather(), &obs, RecursionMode::Termwise).unwrap();
        assert!(lin.warnings.is_empty());
        assert!((log.log_likelihood - lin.log_likelihood).abs() < 1e-10);
        for (a, b) in log.smoothed.iter().flatten().zip(lin.smoothed.iter().flatten()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn impossible_observations_are_zero_likelihood() {
        let hmm = HiddenMarkovModel::from_matrices(
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            None,
        )
        .unwrap();
        assert_eq!(
            forward_backward_model(&hmm, &[0, 1], RecursionMode::LogDomain).unwrap_err(),
            DpError::ZeroLikelihood
        );
        let lin = forward_backward_model(&hmm, &[0, 1], RecursionMode::Termwise).unwrap();
        assert_eq!(lin.warnings, vec![PrecisionWarning { t: 1 }]);
        assert!(lin.filtered[1].iter().all(|x| x.is_nan()));
    }

    #[test]
    fn raw_matrix_entry_point_validates() {
        let err = forward_backward(&[vec![0.5, 0.4]], &[vec![1.0]], &[0], None).unwrap_err();
        assert!(matches!(err, DpError::RowNotNormalized { .. }));
        let err = forward_backward(&[vec![1.0]], &[vec![1.0]], &[], None).unwrap_err();
        assert_eq!(err, DpError::EmptyObservations);
    }
}
