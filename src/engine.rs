//! Reusable inference front end over one hidden Markov model.
//!
//! [`InferenceEngine`] owns a validated [`HiddenMarkovModel`] together with
//! the recursion mode used for forward-backward, and exposes filtering,
//! smoothing, decoding and posterior sampling against it. Every call
//! allocates its own tables; the engine itself is immutable and can be shared
//! across threads.
//!
//! ```
//! use markov_dp::{EngineBuilder, HiddenMarkovModel};
//!
//! let model = HiddenMarkovModel::from_matrices(
//!     vec![vec![0.7, 0.3], vec![0.4, 0.6]],
//!     vec![vec![0.1, 0.4, 0.5], vec![0.6, 0.3, 0.1]],
//!     Some(vec![0.6, 0.4]),
//! )
//! .unwrap();
//! let engine = EngineBuilder::new(model).build();
//! let path = engine.viterbi(&[0, 1, 2]).unwrap();
//! assert_eq!(path.states, vec![1, 0, 0]);
//! ```

use rand::Rng;

use crate::error::Result;
use crate::hmm::{self, Posterior, RecursionMode, ViterbiPath};
use crate::model::HiddenMarkovModel;

/// HMM inference engine; build one with [`EngineBuilder`](crate::EngineBuilder).
#[derive(Clone, Debug)]
pub struct InferenceEngine {
    model: HiddenMarkovModel,
    mode: RecursionMode,
}

impl InferenceEngine {
    /// Engine in log-domain mode.
    pub fn new(model: HiddenMarkovModel) -> Self {
        Self::with_mode(model, RecursionMode::default())
    }

    pub fn with_mode(model: HiddenMarkovModel, mode: RecursionMode) -> Self {
        Self { model, mode }
    }

    pub fn model(&self) -> &HiddenMarkovModel {
        &self.model
    }

    pub fn mode(&self) -> RecursionMode {
        self.mode
    }

    /// Filtered and smoothed marginals plus the log-likelihood.
    pub fn forward_backward(&self, obs: &[usize]) -> Result<Posterior> {
        hmm::forward_backward_model(&self.model, obs, self.mode)
    }

    /// `log P(y)` under the model.
    pub fn log_likelihood(&self, obs: &[usize]) -> Result<f64> {
        Ok(self.forward_backward(obs)?.log_likelihood)
    }

    pub fn viterbi(&self, obs: &[usize]) -> Result<ViterbiPath> {
        hmm::viterbi_model(&self.model, obs)
    }

    pub fn viterbi_batch(&self, sequences: &[Vec<usize>]) -> Result<Vec<ViterbiPath>> {
        hmm::viterbi_batch(&self.model, sequences)
    }

    /// Run forward-backward, then draw one posterior path.
    pub fn sample_posterior<R: Rng + ?Sized>(
        &self,
        obs: &[usize],
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let posterior = self.forward_backward(obs)?;
        hmm::ffbs(&posterior, self.model.chain(), rng)
    }

    /// Run forward-backward once, then draw `draws` seeded posterior paths.
    pub fn sample_posterior_ensemble(
        &self,
        obs: &[usize],
        seed: u64,
        draws: usize,
    ) -> Result<Vec<Vec<usize>>> {
        let posterior = self.forward_backward(obs)?;
        hmm::ffbs_ensemble(&posterior, self.model.chain(), seed, draws)
    }

    /// Simulate `(hidden states, observations)` from the model.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        len: usize,
        rng: &mut R,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        self.model.sample(len, rng)
    }
}
