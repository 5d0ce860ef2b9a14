//! Value iteration for Bellman fixed-point problems.
//!
//! Given any [`BellmanProblem`], repeatedly apply the Bellman operator
//!
//! ```text
//! V_{n+1}(s) = opt_a  action_value(s, a, V_n)
//! ```
//!
//! (Jacobi sweep: every update reads the previous iterate) until the sup-norm
//! change drops below the tolerance, then extract a greedy policy.
//!
//! Convergence is *assumed*, not proven here: discounted control problems
//! with `β < 1` are contractions, and shortest-path problems without negative
//! cycles stabilise after at most `n` sweeps from the `+∞` initial guess. Any
//! other problem is bounded only by `max_iterations`, and hitting that cap is
//! reported as [`DpError::NonConvergence`] by [`solve_bellman`].

use crate::error::{DpError, Result};
use crate::traits::{BellmanProblem, Objective};
use crate::utils::sup_distance;

/// Default stopping tolerance for discrete problems.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Starting point of value iteration.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum InitialGuess {
    /// `+∞` for cost minimization, `0` for reward maximization.
    #[default]
    Auto,
    /// The same value at every non-terminal state.
    Constant(f64),
    /// An explicit vector (length must equal the state count).
    Values(Vec<f64>),
}

/// Tolerance, iteration cap and starting point for value iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct BellmanOptions {
    /// Stop once `max_s |V_{n+1}(s) - V_n(s)| < tolerance`.
    pub tolerance: f64,
    /// Give up after this many sweeps.
    pub max_iterations: usize,
    /// Starting value function.
    pub initial: InitialGuess,
}

impl Default for BellmanOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial: InitialGuess::Auto,
        }
    }
}

impl BellmanOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_initial(mut self, initial: InitialGuess) -> Self {
        self.initial = initial;
        self
    }

    /// Reject non-positive tolerances and a zero iteration cap.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DpError::InvalidTolerance {
                value: self.tolerance,
            });
        }
        if self.max_iterations == 0 {
            return Err(DpError::InvalidIterationCap);
        }
        Ok(())
    }
}

/// Converged (or last) value function and its greedy policy.
#[derive(Clone, Debug, PartialEq)]
pub struct BellmanSolution<A> {
    /// `V(s)` per state; unreachable states hold the objective's sentinel.
    pub values: Vec<f64>,
    /// Greedy action per state; `None` for terminal states and states with
    /// no finite-valued action.
    pub policy: Vec<Option<A>>,
    /// Sweeps performed.
    pub iterations: usize,
    /// Sup-norm change of the final sweep.
    pub residual: f64,
    /// Whether the tolerance was met within the cap.
    pub converged: bool,
}

/// Value-iteration driver over a borrowed problem.
pub struct ValueIteration<'a, P: BellmanProblem> {
    problem: &'a P,
    options: BellmanOptions,
}

impl<'a, P: BellmanProblem> ValueIteration<'a, P> {
    pub fn new(problem: &'a P) -> Self {
        Self::with_options(problem, BellmanOptions::default())
    }

    pub fn with_options(problem: &'a P, options: BellmanOptions) -> Self {
        Self { problem, options }
    }

    pub fn options(&self) -> &BellmanOptions {
        &self.options
    }

    /// Iterate to the tolerance or the cap, whichever comes first.
    ///
    /// Unlike [`solve_bellman`], hitting the cap is not an error here: the
    /// last iterate is returned with `converged == false`.
    pub fn run(&self) -> Result<BellmanSolution<P::Action>> {
        self.options.validate()?;
        let problem = self.problem;

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "value_iteration",
            kind = %problem.kind(),
            n_states = problem.n_states()
        );
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let mut values = self.initial_values()?;
        let mut next = values.clone();
        let mut residual = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.options.max_iterations {
            bellman_sweep(problem, &values, &mut next);
            residual = sup_distance(&next, &values);
            std::mem::swap(&mut values, &mut next);
            iterations += 1;
            if residual < self.options.tolerance {
                break;
            }
        }
        let converged = residual < self.options.tolerance;

        #[cfg(feature = "tracing")]
        if converged {
            tracing::debug!(iterations, residual, "value iteration converged");
        } else {
            tracing::warn!(iterations, residual, "value iteration hit the iteration cap");
        }

        let policy = greedy_policy(problem, &values);
        Ok(BellmanSolution {
            values,
            policy,
            iterations,
            residual,
            converged,
        })
    }

    fn initial_values(&self) -> Result<Vec<f64>> {
        let problem = self.problem;
        let n = problem.n_states();
        let fill = match &self.options.initial {
            InitialGuess::Auto => match problem.objective() {
                Objective::Minimize => f64::INFINITY,
                Objective::Maximize => 0.0,
            },
            InitialGuess::Constant(v) => *v,
            InitialGuess::Values(v) => {
                if v.len() != n {
                    return Err(DpError::DimensionMismatch {
                        what: "initial value function",
                        expected: n,
                        got: v.len(),
                    });
                }
                return Ok((0..n)
                    .map(|s| problem.boundary_value(s).unwrap_or(v[s]))
                    .collect());
            }
        };
        Ok((0..n)
            .map(|s| problem.boundary_value(s).unwrap_or(fill))
            .collect())
    }
}

/// Solve a Bellman problem, failing if the tolerance is not met in time.
///
/// # Errors
/// [`DpError::NonConvergence`] when `max_iterations` sweeps do not reach the
/// tolerance, plus any option-validation error.
pub fn solve_bellman<P: BellmanProblem>(
    problem: &P,
    options: &BellmanOptions,
) -> Result<BellmanSolution<P::Action>> {
    let solution = ValueIteration::with_options(problem, options.clone()).run()?;
    if !solution.converged {
        return Err(DpError::NonConvergence {
            iterations: solution.iterations,
            residual: solution.residual,
        });
    }
    Ok(solution)
}

/// One application of the Bellman operator: `next = T(values)`.
pub fn bellman_sweep<P: BellmanProblem>(problem: &P, values: &[f64], next: &mut [f64]) {
    let objective = problem.objective();
    for (s, out) in next.iter_mut().enumerate() {
        *out = match problem.boundary_value(s) {
            Some(v) => v,
            None => best_action(problem, objective, s, values)
                .map_or(objective.sentinel(), |b| b.1),
        };
    }
}

/// Greedy policy with respect to `values`; the first optimal action wins.
pub fn greedy_policy<P: BellmanProblem>(problem: &P, values: &[f64]) -> Vec<Option<P::Action>> {
    let objective = problem.objective();
    (0..problem.n_states())
        .map(|s| {
            if problem.boundary_value(s).is_some() {
                return None;
            }
            best_action(problem, objective, s, values)
                .filter(|&(_, v)| v.is_finite())
                .map(|(a, _)| problem.action(s, a))
        })
        .collect()
}

fn best_action<P: BellmanProblem>(
    problem: &P,
    objective: Objective,
    state: usize,
    values: &[f64],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for a in 0..problem.num_actions(state) {
        let v = problem.action_value(state, a, values);
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, incumbent)) if !objective.improves(v, incumbent) => {}
            _ => best = Some((a, v)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{DiscreteSystem, ProblemKind};

    /// Single state, single action: V = 1 + β V, so V* = 1 / (1 - β).
    struct Annuity {
        beta: f64,
    }

    impl DiscreteSystem for Annuity {
        fn kind(&self) -> ProblemKind {
            ProblemKind::Control
        }
        fn n_states(&self) -> usize {
            1
        }
    }

    impl BellmanProblem for Annuity {
        type Action = ();
        fn objective(&self) -> Objective {
            Objective::Maximize
        }
        fn num_actions(&self, _state: usize) -> usize {
            1
        }
        fn action(&self, _state: usize, _index: usize) -> Self::Action {}
        fn action_value(&self, _state: usize, _index: usize, values: &[f64]) -> f64 {
            1.0 + self.beta * values[0]
        }
    }

    #[test]
    fn contraction_reaches_closed_form() {
        let sol = solve_bellman(&Annuity { beta: 0.5 }, &BellmanOptions::default()).unwrap();
        assert!(sol.converged);
        assert!((sol.values[0] - 2.0).abs() < 1e-9);
        assert_eq!(sol.policy, vec![Some(())]);
    }

    #[test]
    fn cap_is_reported_not_hidden() {
        let opts = BellmanOptions::default().with_max_iterations(3);
        let err = solve_bellman(&Annuity { beta: 0.99 }, &opts).unwrap_err();
        assert!(matches!(err, DpError::NonConvergence { iterations: 3, .. }));

        let last = ValueIteration::with_options(&Annuity { beta: 0.99 }, opts)
            .run()
            .unwrap();
        assert!(!last.converged);
        assert_eq!(last.iterations, 3);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = BellmanOptions::default().with_tolerance(0.0);
        assert!(matches!(
            solve_bellman(&Annuity { beta: 0.5 }, &opts),
            Err(DpError::InvalidTolerance { .. })
        ));
        let opts = BellmanOptions::default().with_initial(InitialGuess::Values(vec![0.0; 2]));
        assert!(matches!(
            solve_bellman(&Annuity { beta: 0.5 }, &opts),
            Err(DpError::DimensionMismatch { .. })
        ));
    }
}
