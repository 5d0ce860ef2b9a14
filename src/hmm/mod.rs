//! Inference over hidden Markov models.
//!
//! - [`forward_backward`]: α/β recursions, filtered and smoothed marginals,
//!   log-likelihood.
//! - [`viterbi`]: most likely hidden path.
//! - [`ffbs`]: exact posterior path sampling from the forward tables.
//!
//! The free functions accept raw matrices and validate them on every call;
//! the `*_model` variants take an already validated [`HiddenMarkovModel`].
//!
//! [`HiddenMarkovModel`]: crate::model::HiddenMarkovModel

pub mod ffbs;
pub mod forward_backward;
pub mod viterbi;

pub use ffbs::{draw_seed, empirical_marginals, ffbs, ffbs_ensemble};
pub use forward_backward::{forward_backward, forward_backward_model, Posterior, PrecisionWarning};
pub use viterbi::{viterbi, viterbi_batch, viterbi_model, ViterbiPath};

/// How the forward-backward recursions handle small probabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecursionMode {
    /// Both recursions in log space with log-sum-exp reductions.
    #[default]
    LogDomain,
    /// Linear α; β with each inner term formed in log space and
    /// exponentiated before summing. Long sequences underflow, which is
    /// reported through [`PrecisionWarning`]s rather than an error.
    Termwise,
}
