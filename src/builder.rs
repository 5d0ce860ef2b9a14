use crate::error::Result;
use crate::hmm::RecursionMode;
use crate::model::HiddenMarkovModel;
use crate::traits::HiddenMarkov;
use crate::InferenceEngine;

pub struct EngineBuilder {
    model: HiddenMarkovModel,
    mode: Option<RecursionMode>,
}

impl EngineBuilder {
    pub fn new(model: HiddenMarkovModel) -> Self {
        Self { model, mode: None }
    }

    /// Start from any [`HiddenMarkov`] implementation, re-validating its tables.
    pub fn from_model<M: HiddenMarkov + ?Sized>(model: &M) -> Result<Self> {
        Ok(Self::new(HiddenMarkovModel::from_model(model)?))
    }

    pub fn with_recursion_mode(mut self, mode: RecursionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn build(self) -> InferenceEngine {
        match self.mode {
            Some(mode) => InferenceEngine::with_mode(self.model, mode),
            None => InferenceEngine::new(self.model),
        }
    }
}
