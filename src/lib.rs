//! Discrete-state sequential decision and inference.
//!
//! Two families of dynamic programs over finite state spaces:
//!
//! 1. **Bellman problems.** Value iteration for shortest paths and
//!    discounted control ([`solve_bellman`]), backward induction for
//!    finite-horizon optimal stopping ([`solve_backward_induction`]) and a
//!    grid-based continuous-state variant ([`solve_continuous`]).
//! 2. **Hidden Markov models.** Forward-backward filtering and smoothing
//!    ([`forward_backward`]), Viterbi decoding ([`viterbi`]) and forward
//!    filtering, backward sampling ([`ffbs`]).
//!
//! Inputs are plain matrices and sequences, validated eagerly into the types
//! in [`model`]; outputs are value functions, policies, probability tables
//! and state paths. Everything runs synchronously on the calling thread
//! unless the `parallel` feature is enabled for batch operations.
//!
//! ## Quick start
//! ```
//! use markov_dp::{solve_bellman, BellmanOptions};
//! use markov_dp::problems::shortest_path::ShortestPathGraph;
//!
//! let graph = ShortestPathGraph::from_edges(
//!     "G",
//!     &[("A", "B", 1.0), ("B", "G", 2.0), ("A", "G", 5.0)],
//! )
//! .unwrap();
//! let solution = solve_bellman(&graph, &BellmanOptions::default()).unwrap();
//! assert_eq!(solution.values[graph.index_of("A").unwrap()], 3.0);
//! ```
//!
//! ## Features
//! - `parallel`: run [`hmm::viterbi_batch`] and [`hmm::ffbs_ensemble`] on
//!   rayon.
//! - `tracing`: spans and events around every recursion.
//! - `heavy`: long-running stress tests.

pub mod bellman;
pub mod builder;
pub mod continuous;
pub mod engine;
pub mod error;
pub mod hmm;
pub mod model;
pub mod problems;
pub mod traits;
pub mod utils;

pub use crate::bellman::{
    solve_bellman, BellmanOptions, BellmanSolution, InitialGuess, ValueIteration,
};
pub use crate::builder::EngineBuilder;
pub use crate::continuous::{solve_continuous, ContinuousControl, ContinuousOptions, GridSolution};
pub use crate::engine::InferenceEngine;
pub use crate::error::{DpError, Result};
pub use crate::hmm::{
    ffbs, forward_backward, viterbi, Posterior, PrecisionWarning, RecursionMode, ViterbiPath,
};
pub use crate::model::{
    EmissionMatrix, FiniteMarkovChain, HiddenMarkovModel, InitialDistribution, ObservationSequence,
};
pub use crate::problems::stopping::{solve_backward_induction, StoppingProblem, StoppingSolution};
pub use crate::traits::{
    BellmanProblem, DiscreteSystem, HiddenMarkov, MarkovModel, Objective, ProblemKind, ValueAt,
};
