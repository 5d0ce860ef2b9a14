//! Error types shared by the Bellman solvers and the HMM inference routines.
//!
//! Every failure is local and synchronous: the function that detects it
//! returns it to its immediate caller. Malformed models are rejected before
//! any recursion starts.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DpError>;

/// Errors raised while validating a model or running one of the algorithms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DpError {
    // ---- Malformed model ----
    /// A matrix or vector with no entries.
    #[error("{what} cannot be empty")]
    EmptyMatrix { what: &'static str },

    /// Rows of a matrix have different lengths.
    #[error("{what} row {row} has length {got}, expected {expected}")]
    RaggedMatrix {
        what: &'static str,
        row: usize,
        expected: usize,
        got: usize,
    },

    /// A probability outside `[0, 1]` (or NaN).
    #[error("{what}[{row}][{col}] = {value} is not a probability")]
    InvalidProbability {
        what: &'static str,
        row: usize,
        col: usize,
        value: f64,
    },

    /// A row of a stochastic matrix does not sum to one.
    #[error("{what} row {row} sums to {sum} (expected 1.0)")]
    RowNotNormalized {
        what: &'static str,
        row: usize,
        sum: f64,
    },

    /// Dimensions of two model components disagree.
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// An observation symbol outside the emission alphabet.
    #[error("observation {symbol} at t = {t} is outside the alphabet of {n_symbols} symbols")]
    SymbolOutOfRange {
        t: usize,
        symbol: usize,
        n_symbols: usize,
    },

    /// Inference requested on an empty observation sequence.
    #[error("observation sequence is empty")]
    EmptyObservations,

    /// A graph edge or query names a vertex that was never added.
    #[error("unknown vertex '{name}'")]
    UnknownVertex { name: String },

    /// An edge cost or reward that is NaN or infinite.
    #[error("non-finite cost {value} at {context}")]
    NonFiniteCost { context: String, value: f64 },

    /// A state grid that is empty, unsorted or non-finite.
    #[error("invalid state grid: {reason}")]
    InvalidGrid { reason: &'static str },

    /// The feasible action interval at a grid point is empty or non-finite.
    #[error("invalid action bounds [{lower}, {upper}] at state {state}")]
    InvalidActionBounds { state: f64, lower: f64, upper: f64 },

    // ---- Configuration ----
    /// Convergence tolerance must be finite and > 0.
    #[error("tolerance must be finite and > 0, got {value}")]
    InvalidTolerance { value: f64 },

    /// Discount factor outside the admissible range.
    #[error("discount factor {value} is outside {range}")]
    InvalidDiscount { value: f64, range: &'static str },

    /// Iteration cap must be at least one.
    #[error("max_iterations must be at least 1")]
    InvalidIterationCap,

    // ---- Algorithmic failures ----
    /// Fixed-point iteration hit the cap without meeting the tolerance.
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NonConvergence { iterations: usize, residual: f64 },

    /// A vertex has a finite cost-to-go but no tight edges lead to the terminal.
    #[error("no tight path to the terminal from '{from}'")]
    NoTightPath { from: String },

    /// The observations have probability zero under the model.
    #[error("observation sequence has zero likelihood under the model")]
    ZeroLikelihood,

    /// Categorical weights summed to zero during backward sampling.
    #[error("degenerate sampling distribution at t = {t}: all weights are zero")]
    DegenerateDistribution { t: usize },

    /// The bounded scalar optimizer failed.
    #[error("optimizer failed: {0}")]
    Optimizer(String),
}

impl From<argmin::core::Error> for DpError {
    /// Errors raised by our own cost functions travel through `argmin`
    /// unchanged and are unwrapped here.
    fn from(err: argmin::core::Error) -> Self {
        match err.downcast::<DpError>() {
            Ok(inner) => inner,
            Err(other) => DpError::Optimizer(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DpError;

    #[test]
    fn messages_name_the_offending_entry() {
        let err = DpError::RowNotNormalized {
            what: "transition matrix",
            row: 2,
            sum: 0.9,
        };
        assert_eq!(err.to_string(), "transition matrix row 2 sums to 0.9 (expected 1.0)");

        let err = DpError::SymbolOutOfRange {
            t: 4,
            symbol: 7,
            n_symbols: 3,
        };
        assert!(err.to_string().contains("t = 4"));
    }

    #[test]
    fn non_convergence_reports_iterations() {
        let err = DpError::NonConvergence {
            iterations: 50,
            residual: 0.25,
        };
        assert!(err.to_string().starts_with("no convergence after 50 iterations"));
    }
}
