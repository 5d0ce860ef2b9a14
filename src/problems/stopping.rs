//! Finite-horizon optimal stopping by backward induction.
//!
//! ```text
//! V_T(s) = g(s)
//! V_t(s) = max{ exercise(s), (1 / (1 + r)) Σ_{s'} P[s][s'] V_{t+1}(s') }
//! ```
//!
//! Exactly `T` sweeps, newest period first. Ties record `Exercise`.

use crate::error::{DpError, Result};
use crate::model::FiniteMarkovChain;
use crate::traits::{DiscreteSystem, ProblemKind};

/// Decision recorded per `(t, s)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoppingDecision {
    Exercise,
    Continue,
}

/// Optimal stopping over a Markov chain on a state grid.
#[derive(Clone, Debug, PartialEq)]
pub struct StoppingProblem {
    chain: FiniteMarkovChain,
    exercise: Vec<f64>,
    terminal: Vec<f64>,
    rate: f64,
    horizon: usize,
}

impl StoppingProblem {
    /// `exercise[s]` is paid on stopping before `T`, `terminal[s]` at `T`.
    ///
    /// # Errors
    /// Payoff vectors whose length differs from the chain's state count,
    /// non-finite payoffs, or a rate `r <= -1` (no positive discount factor).
    pub fn new(
        chain: FiniteMarkovChain,
        exercise: Vec<f64>,
        terminal: Vec<f64>,
        rate: f64,
        horizon: usize,
    ) -> Result<Self> {
        let n = chain.n_states();
        for (what, payoff) in [("exercise payoff", &exercise), ("terminal payoff", &terminal)] {
            if payoff.len() != n {
                return Err(DpError::DimensionMismatch {
                    what,
                    expected: n,
                    got: payoff.len(),
                });
            }
            if let Some(s) = payoff.iter().position(|v| !v.is_finite()) {
                return Err(DpError::NonFiniteCost {
                    context: format!("{what} at state {s}"),
                    value: payoff[s],
                });
            }
        }
        if !(rate.is_finite() && rate > -1.0) {
            return Err(DpError::InvalidDiscount {
                value: rate,
                range: "(-1, ∞)",
            });
        }
        Ok(Self {
            chain,
            exercise,
            terminal,
            rate,
            horizon,
        })
    }

    pub fn chain(&self) -> &FiniteMarkovChain {
        &self.chain
    }

    pub fn exercise_values(&self) -> &[f64] {
        &self.exercise
    }

    pub fn terminal_values(&self) -> &[f64] {
        &self.terminal
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// One-period discount factor `1 / (1 + r)`.
    #[inline]
    pub fn discount(&self) -> f64 {
        1.0 / (1.0 + self.rate)
    }

    /// Discounted expected value of waiting one period from `state`.
    pub fn continuation_value(&self, state: usize, next_values: &[f64]) -> f64 {
        let expected: f64 = self.chain.matrix()[state]
            .iter()
            .zip(next_values)
            .map(|(p, v)| p * v)
            .sum();
        self.discount() * expected
    }
}

impl DiscreteSystem for StoppingProblem {
    fn kind(&self) -> ProblemKind {
        ProblemKind::OptimalStopping
    }

    fn n_states(&self) -> usize {
        self.chain.n_states()
    }
}

/// Value and decision grids of a solved stopping problem.
#[derive(Clone, Debug, PartialEq)]
pub struct StoppingSolution {
    /// `(T + 1) × n`; row `T` is the terminal payoff.
    pub values: Vec<Vec<f64>>,
    /// `T × n`.
    pub decisions: Vec<Vec<StoppingDecision>>,
}

impl StoppingSolution {
    /// `V_0(s)`.
    pub fn initial_value(&self, state: usize) -> f64 {
        self.values[0][state]
    }

    /// First period at which the policy exercises along `path`, if any.
    ///
    /// `path[t]` is the state at period `t`; entries past the horizon are ignored.
    pub fn stopping_time(&self, path: &[usize]) -> Option<usize> {
        path.iter()
            .zip(&self.decisions)
            .position(|(&s, row)| row[s] == StoppingDecision::Exercise)
    }
}

/// Solve by backward induction over the horizon.
pub fn solve_backward_induction(problem: &StoppingProblem) -> Result<StoppingSolution> {
    let n = problem.n_states();
    let horizon = problem.horizon;

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("backward_induction", n_states = n, horizon);
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut values = vec![Vec::new(); horizon + 1];
    let mut decisions = vec![Vec::new(); horizon];
    values[horizon] = problem.terminal.clone();

    for t in (0..horizon).rev() {
        let mut row = Vec::with_capacity(n);
        let mut choice = Vec::with_capacity(n);
        for s in 0..n {
            let wait = problem.continuation_value(s, &values[t + 1]);
            let stop = problem.exercise[s];
            if stop >= wait {
                row.push(stop);
                choice.push(StoppingDecision::Exercise);
            } else {
                row.push(wait);
                choice.push(StoppingDecision::Continue);
            }
        }
        values[t] = row;
        decisions[t] = choice;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(sweeps = horizon, "backward induction finished");

    Ok(StoppingSolution { values, decisions })
}

/// American put on a recombining binomial price grid.
///
/// States `0..=2h` carry prices `spot · up^(k - h)`, so the spot sits at state
/// index `horizon`. Each period the price moves up with the risk-neutral
/// probability `q = (1 + r - d) / (u - d)` (`d = 1 / u`) and down otherwise;
/// the outermost states reflect. Exercise and terminal payoffs are both
/// `max(strike - price, 0)`.
///
/// # Errors
/// `up <= 1`, a non-positive spot or strike, or parameters that leave `q`
/// outside `(0, 1)`.
pub fn binomial_put(
    spot: f64,
    strike: f64,
    up: f64,
    rate: f64,
    horizon: usize,
) -> Result<StoppingProblem> {
    if !(spot > 0.0 && strike > 0.0 && spot.is_finite() && strike.is_finite()) {
        return Err(DpError::InvalidGrid {
            reason: "spot and strike must be positive and finite",
        });
    }
    if !(up.is_finite() && up > 1.0) {
        return Err(DpError::InvalidGrid {
            reason: "up factor must exceed one",
        });
    }
    let down = 1.0 / up;
    let q = (1.0 + rate - down) / (up - down);
    if !(q > 0.0 && q < 1.0) {
        return Err(DpError::InvalidProbability {
            what: "risk-neutral up probability",
            row: 0,
            col: 0,
            value: q,
        });
    }

    let n = 2 * horizon + 1;
    let mut p = vec![vec![0.0; n]; n];
    for (k, row) in p.iter_mut().enumerate() {
        row[(k + 1).min(n - 1)] += q;
        row[k.saturating_sub(1)] += 1.0 - q;
    }
    let payoff: Vec<f64> = (0..n)
        .map(|k| {
            let price = spot * up.powi(k as i32 - horizon as i32);
            (strike - price).max(0.0)
        })
        .collect();

    StoppingProblem::new(
        FiniteMarkovChain::new(p)?,
        payoff.clone(),
        payoff,
        rate,
        horizon,
    )
}
