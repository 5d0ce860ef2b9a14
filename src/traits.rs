//! Core trait definitions shared by the decision and inference algorithms.
//!
//! Every problem the crate solves is a *finite discrete dynamic system*: a
//! finite state space plus either a reward structure (Bellman problems) or an
//! emission structure (hidden Markov models). The [`ProblemKind`] tag names
//! which one an instance is; the solver selected for it follows from the
//! capability traits it implements:
//!
//! - [`MarkovModel`]: exposes a row-stochastic transition matrix.
//! - [`HiddenMarkov`]: adds emissions and an initial distribution; consumed by
//!   forward-backward, Viterbi and FFBS.
//! - [`BellmanProblem`]: enumerable actions with a one-step lookahead value;
//!   consumed by value iteration.
//! - [`ValueAt`]: evaluation of a value function at an arbitrary point, used by
//!   the continuous-state variant.

use std::fmt;

/// Problem-kind tag carried by every [`DiscreteSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// Uncontrolled finite Markov chain.
    MarkovChain,
    /// Deterministic shortest path to a terminal vertex.
    ShortestPath,
    /// Infinite-horizon discounted control over finite states and actions.
    Control,
    /// Finite-horizon optimal stopping solved by backward induction.
    OptimalStopping,
    /// Hidden Markov model with discrete emissions.
    HiddenMarkov,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProblemKind::MarkovChain => "markov_chain",
            ProblemKind::ShortestPath => "shortest_path",
            ProblemKind::Control => "control",
            ProblemKind::OptimalStopping => "optimal_stopping",
            ProblemKind::HiddenMarkov => "hidden_markov",
        };
        f.write_str(name)
    }
}

/// A finite discrete dynamic system over states `0..n_states()`.
pub trait DiscreteSystem {
    /// Which family of problem this instance belongs to.
    fn kind(&self) -> ProblemKind;

    /// Number of states `n`.
    fn n_states(&self) -> usize;
}

/// A system whose state evolves by a row-stochastic transition matrix.
pub trait MarkovModel: DiscreteSystem {
    /// `P[i][j] = P(x_{t+1} = j | x_t = i)`; validated on construction.
    fn transition_probabilities(&self) -> &[Vec<f64>];
}

/// A Markov model observed through discrete emissions.
pub trait HiddenMarkov: MarkovModel {
    /// `E[i][k] = P(y_t = k | x_t = i)`; validated on construction.
    fn emission_probabilities(&self) -> &[Vec<f64>];

    /// Distribution of the first hidden state `π₀`.
    fn initial_distribution(&self) -> &[f64];

    /// Size `k` of the observation alphabet.
    fn n_symbols(&self) -> usize {
        self.emission_probabilities().first().map_or(0, Vec::len)
    }
}

/// Direction of optimization in a Bellman equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Objective {
    /// Costs: `J(s) = min_a ...`; unreachable states sit at `+∞`.
    Minimize,
    /// Rewards: `V(s) = max_a ...`; states without actions sit at `-∞`.
    Maximize,
}

impl Objective {
    /// Value of a state with an empty action set.
    pub fn sentinel(self) -> f64 {
        match self {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    }

    /// True when `candidate` strictly improves on `incumbent`.
    #[inline]
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Objective::Minimize => candidate < incumbent,
            Objective::Maximize => candidate > incumbent,
        }
    }
}

/// A problem solvable by value iteration.
///
/// Semantics:
/// - Actions at a state are enumerated as `0..num_actions(state)`; the
///   enumeration order fixes tie-breaking (first optimal action wins).
/// - `action_value(s, a, V)` is the one-step lookahead `r(s, a) + β E[V(s')]`
///   (or `cost(s, a) + J(s')` for shortest paths) under the current iterate.
/// - `boundary_value(s)` pins terminal states; those states are never
///   updated and carry no action in the policy.
pub trait BellmanProblem: DiscreteSystem {
    /// Action label reported in the policy.
    type Action: Clone + fmt::Debug + PartialEq;

    /// Minimize costs or maximize rewards.
    fn objective(&self) -> Objective;

    /// Number of actions available in `state`.
    fn num_actions(&self, state: usize) -> usize;

    /// Label of the `index`-th action available in `state`.
    fn action(&self, state: usize, index: usize) -> Self::Action;

    /// One-step lookahead value of taking action `index` in `state`.
    fn action_value(&self, state: usize, index: usize, values: &[f64]) -> f64;

    /// Fixed value for terminal states, `None` for states that are iterated.
    fn boundary_value(&self, _state: usize) -> Option<f64> {
        None
    }
}

/// Evaluation of a value function at an arbitrary point of a continuous
/// state space.
pub trait ValueAt {
    /// Value at `x`.
    fn value_at(&self, x: f64) -> f64;
}

impl<F: Fn(f64) -> f64> ValueAt for F {
    fn value_at(&self, x: f64) -> f64 {
        self(x)
    }
}
