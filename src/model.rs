//! Validated model components: Markov chains, emission matrices, initial
//! distributions, observation sequences and the hidden Markov model that
//! bundles them.
//!
//! All constructors check the row-stochastic invariant eagerly and cache the
//! element-wise logarithms used by the log-domain recursions. Once built, a
//! component is immutable.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::ops::Deref;

use crate::error::{DpError, Result};
use crate::traits::{DiscreteSystem, HiddenMarkov, MarkovModel, ProblemKind};
use crate::utils::sup_distance;

/// Dense row-major matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Allowed deviation of a row sum from one.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Check that `m` is a non-empty rectangular row-stochastic matrix.
///
/// Returns the number of columns.
pub fn validate_stochastic(what: &'static str, m: &[Vec<f64>]) -> Result<usize> {
    let cols = m.first().map_or(0, Vec::len);
    if m.is_empty() || cols == 0 {
        return Err(DpError::EmptyMatrix { what });
    }
    for (row, entries) in m.iter().enumerate() {
        if entries.len() != cols {
            return Err(DpError::RaggedMatrix {
                what,
                row,
                expected: cols,
                got: entries.len(),
            });
        }
        validate_row(what, row, entries)?;
    }
    Ok(cols)
}

fn validate_row(what: &'static str, row: usize, entries: &[f64]) -> Result<()> {
    for (col, &value) in entries.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(DpError::InvalidProbability {
                what,
                row,
                col,
                value,
            });
        }
    }
    let sum: f64 = entries.iter().sum();
    if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
        return Err(DpError::RowNotNormalized { what, row, sum });
    }
    Ok(())
}

fn log_matrix(m: &[Vec<f64>]) -> Matrix {
    m.iter()
        .map(|row| row.iter().map(|p| p.ln()).collect())
        .collect()
}

/// Immutable `n × n` row-stochastic transition matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct FiniteMarkovChain {
    p: Matrix,
    log_p: Matrix,
}

impl FiniteMarkovChain {
    /// Validate and wrap a transition matrix.
    ///
    /// # Errors
    /// Empty, ragged or non-square input, entries outside `[0, 1]`, or a row
    /// whose sum differs from one by more than [`ROW_SUM_TOLERANCE`].
    pub fn new(p: Matrix) -> Result<Self> {
        let cols = validate_stochastic("transition matrix", &p)?;
        if cols != p.len() {
            return Err(DpError::DimensionMismatch {
                what: "transition matrix columns",
                expected: p.len(),
                got: cols,
            });
        }
        let log_p = log_matrix(&p);
        Ok(Self { p, log_p })
    }

    /// Number of states.
    #[inline]
    pub fn n_states(&self) -> usize {
        self.p.len()
    }

    /// The transition matrix.
    #[inline]
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.p
    }

    /// Element-wise `ln P` (zero entries map to `-∞`).
    #[inline]
    pub fn log_matrix(&self) -> &[Vec<f64>] {
        &self.log_p
    }

    /// `P[from][to]`.
    #[inline]
    pub fn prob(&self, from: usize, to: usize) -> f64 {
        self.p[from][to]
    }

    /// Push a distribution one step forward: `π P`.
    pub fn step_distribution(&self, dist: &[f64]) -> Result<Vec<f64>> {
        let n = self.n_states();
        if dist.len() != n {
            return Err(DpError::DimensionMismatch {
                what: "distribution length",
                expected: n,
                got: dist.len(),
            });
        }
        let mut next = vec![0.0; n];
        for (row, &mass) in self.p.iter().zip(dist) {
            for (acc, &p) in next.iter_mut().zip(row) {
                *acc += mass * p;
            }
        }
        Ok(next)
    }

    /// Stationary distribution by power iteration from the uniform vector.
    ///
    /// Converges for irreducible aperiodic chains. Periodic chains oscillate
    /// and are reported as [`DpError::NonConvergence`].
    pub fn stationary_distribution(
        &self,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Vec<f64>> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(DpError::InvalidTolerance { value: tolerance });
        }
        if max_iterations == 0 {
            return Err(DpError::InvalidIterationCap);
        }
        let n = self.n_states();
        let mut dist = vec![1.0 / n as f64; n];
        let mut residual = f64::INFINITY;
        for _ in 0..max_iterations {
            let next = self.step_distribution(&dist)?;
            residual = sup_distance(&next, &dist);
            dist = next;
            if residual < tolerance {
                return Ok(dist);
            }
        }
        Err(DpError::NonConvergence {
            iterations: max_iterations,
            residual,
        })
    }

    /// Simulate a state path of length `len` starting from `initial`.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        len: usize,
        initial: &InitialDistribution,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if initial.len() != self.n_states() {
            return Err(DpError::DimensionMismatch {
                what: "initial distribution length",
                expected: self.n_states(),
                got: initial.len(),
            });
        }
        let rows = self
            .p
            .iter()
            .enumerate()
            .map(|(t, row)| categorical(row, t))
            .collect::<Result<Vec<_>>>()?;
        let mut path = Vec::with_capacity(len);
        if len == 0 {
            return Ok(path);
        }
        let mut state = categorical(initial.probabilities(), 0)?.sample(rng);
        path.push(state);
        for _ in 1..len {
            state = rows[state].sample(rng);
            path.push(state);
        }
        Ok(path)
    }
}

impl DiscreteSystem for FiniteMarkovChain {
    fn kind(&self) -> ProblemKind {
        ProblemKind::MarkovChain
    }

    fn n_states(&self) -> usize {
        self.p.len()
    }
}

impl MarkovModel for FiniteMarkovChain {
    fn transition_probabilities(&self) -> &[Vec<f64>] {
        &self.p
    }
}

/// Immutable `n × k` row-stochastic emission matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct EmissionMatrix {
    e: Matrix,
    log_e: Matrix,
}

impl EmissionMatrix {
    /// Validate and wrap an emission matrix.
    pub fn new(e: Matrix) -> Result<Self> {
        validate_stochastic("emission matrix", &e)?;
        let log_e = log_matrix(&e);
        Ok(Self { e, log_e })
    }

    /// Number of hidden states (rows).
    #[inline]
    pub fn n_states(&self) -> usize {
        self.e.len()
    }

    /// Alphabet size `k` (columns).
    #[inline]
    pub fn n_symbols(&self) -> usize {
        self.e[0].len()
    }

    /// The emission matrix.
    #[inline]
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.e
    }

    /// Element-wise `ln E`.
    #[inline]
    pub fn log_matrix(&self) -> &[Vec<f64>] {
        &self.log_e
    }
}

/// Probability vector over hidden states at `t = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialDistribution {
    p: Vec<f64>,
    log_p: Vec<f64>,
}

impl InitialDistribution {
    /// Validate a probability vector.
    pub fn new(p: Vec<f64>) -> Result<Self> {
        if p.is_empty() {
            return Err(DpError::EmptyMatrix {
                what: "initial distribution",
            });
        }
        validate_row("initial distribution", 0, &p)?;
        let log_p = p.iter().map(|x| x.ln()).collect();
        Ok(Self { p, log_p })
    }

    /// Uniform distribution over `n` states.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    pub fn uniform(n: usize) -> Self {
        assert!(n > 0, "uniform distribution needs at least one state");
        let p = vec![1.0 / n as f64; n];
        let log_p = vec![-(n as f64).ln(); n];
        Self { p, log_p }
    }

    /// Number of states.
    #[inline]
    pub fn len(&self) -> usize {
        self.p.len()
    }

    /// Always false for a validated distribution.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    /// Probabilities.
    #[inline]
    pub fn probabilities(&self) -> &[f64] {
        &self.p
    }

    /// Log-probabilities.
    #[inline]
    pub fn log_probabilities(&self) -> &[f64] {
        &self.log_p
    }
}

/// Validated sequence of observation symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationSequence(Vec<usize>);

impl ObservationSequence {
    /// Wrap `symbols`, checking each lies in `0..n_symbols`.
    pub fn new(symbols: Vec<usize>, n_symbols: usize) -> Result<Self> {
        validate_observations(&symbols, n_symbols)?;
        Ok(Self(symbols))
    }

    /// Consume into the raw symbols.
    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

impl Deref for ObservationSequence {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

/// Reject empty sequences and out-of-alphabet symbols.
pub fn validate_observations(obs: &[usize], n_symbols: usize) -> Result<()> {
    if obs.is_empty() {
        return Err(DpError::EmptyObservations);
    }
    if let Some(t) = obs.iter().position(|&s| s >= n_symbols) {
        return Err(DpError::SymbolOutOfRange {
            t,
            symbol: obs[t],
            n_symbols,
        });
    }
    Ok(())
}

/// Hidden Markov model `(P, E, π₀)` with consistent dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct HiddenMarkovModel {
    chain: FiniteMarkovChain,
    emission: EmissionMatrix,
    initial: InitialDistribution,
}

impl HiddenMarkovModel {
    /// Assemble a model; `initial = None` selects the uniform distribution.
    pub fn new(
        chain: FiniteMarkovChain,
        emission: EmissionMatrix,
        initial: Option<InitialDistribution>,
    ) -> Result<Self> {
        let n = chain.n_states();
        if emission.n_states() != n {
            return Err(DpError::DimensionMismatch {
                what: "emission matrix rows",
                expected: n,
                got: emission.n_states(),
            });
        }
        let initial = initial.unwrap_or_else(|| InitialDistribution::uniform(n));
        if initial.len() != n {
            return Err(DpError::DimensionMismatch {
                what: "initial distribution length",
                expected: n,
                got: initial.len(),
            });
        }
        Ok(Self {
            chain,
            emission,
            initial,
        })
    }

    /// Build from raw matrices.
    pub fn from_matrices(p: Matrix, e: Matrix, initial: Option<Vec<f64>>) -> Result<Self> {
        let initial = initial.map(InitialDistribution::new).transpose()?;
        Self::new(FiniteMarkovChain::new(p)?, EmissionMatrix::new(e)?, initial)
    }

    /// Re-validate any [`HiddenMarkov`] implementation into a concrete model.
    pub fn from_model<M: HiddenMarkov + ?Sized>(model: &M) -> Result<Self> {
        Self::from_matrices(
            model.transition_probabilities().to_vec(),
            model.emission_probabilities().to_vec(),
            Some(model.initial_distribution().to_vec()),
        )
    }

    /// Transition structure.
    #[inline]
    pub fn chain(&self) -> &FiniteMarkovChain {
        &self.chain
    }

    /// Emission structure.
    #[inline]
    pub fn emission(&self) -> &EmissionMatrix {
        &self.emission
    }

    /// Initial distribution.
    #[inline]
    pub fn initial(&self) -> &InitialDistribution {
        &self.initial
    }

    /// Simulate `len` steps, returning `(hidden states, observations)`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        len: usize,
        rng: &mut R,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let states = self.chain.simulate(len, &self.initial, rng)?;
        let emitters = self
            .emission
            .matrix()
            .iter()
            .enumerate()
            .map(|(s, row)| categorical(row, s))
            .collect::<Result<Vec<_>>>()?;
        let obs = states.iter().map(|&s| emitters[s].sample(rng)).collect();
        Ok((states, obs))
    }
}

impl DiscreteSystem for HiddenMarkovModel {
    fn kind(&self) -> ProblemKind {
        ProblemKind::HiddenMarkov
    }

    fn n_states(&self) -> usize {
        self.chain.n_states()
    }
}

impl MarkovModel for HiddenMarkovModel {
    fn transition_probabilities(&self) -> &[Vec<f64>] {
        self.chain.matrix()
    }
}

impl HiddenMarkov for HiddenMarkovModel {
    fn emission_probabilities(&self) -> &[Vec<f64>] {
        self.emission.matrix()
    }

    fn initial_distribution(&self) -> &[f64] {
        self.initial.probabilities()
    }
}

/// Categorical sampler over `weights`; `t` labels the failure.
pub(crate) fn categorical(weights: &[f64], t: usize) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(weights).map_err(|_| DpError::DegenerateDistribution { t })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn weather() -> FiniteMarkovChain {
        FiniteMarkovChain::new(vec![vec![0.9, 0.1], vec![0.5, 0.5]]).unwrap()
    }

    #[test]
    fn rejects_non_stochastic_rows() {
        let err = FiniteMarkovChain::new(vec![vec![0.6, 0.6], vec![0.5, 0.5]]).unwrap_err();
        assert!(matches!(err, DpError::RowNotNormalized { row: 0, .. }));
    }

    #[test]
    fn rejects_negative_and_ragged_entries() {
        let err = FiniteMarkovChain::new(vec![vec![1.2, -0.2], vec![0.5, 0.5]]).unwrap_err();
        assert!(matches!(err, DpError::InvalidProbability { col: 0, .. }));

        let err = EmissionMatrix::new(vec![vec![1.0], vec![0.5, 0.5]]).unwrap_err();
        assert!(matches!(err, DpError::RaggedMatrix { row: 1, .. }));

        let err = FiniteMarkovChain::new(vec![vec![0.5, 0.5]]).unwrap_err();
        assert!(matches!(err, DpError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_mismatched_model_dimensions() {
        let e = EmissionMatrix::new(vec![vec![1.0]; 3]).unwrap();
        let err = HiddenMarkovModel::new(weather(), e, None).unwrap_err();
        assert!(matches!(
            err,
            DpError::DimensionMismatch {
                expected: 2,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn observations_must_fit_alphabet() {
        assert_eq!(
            ObservationSequence::new(vec![], 2).unwrap_err(),
            DpError::EmptyObservations
        );
        let err = ObservationSequence::new(vec![0, 1, 2], 2).unwrap_err();
        assert!(matches!(err, DpError::SymbolOutOfRange { t: 2, .. }));
        let obs = ObservationSequence::new(vec![1, 0], 2).unwrap();
        assert_eq!(&*obs, &[1, 0]);
    }

    #[test]
    fn stationary_distribution_solves_pi_p_equals_pi() {
        let chain = weather();
        let pi = chain.stationary_distribution(1e-12, 10_000).unwrap();
        // closed form for a 2-state chain: (b, a) / (a + b)
        assert!((pi[0] - 5.0 / 6.0).abs() < 1e-9);
        assert!((pi[1] - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let err = weather().stationary_distribution(1e-12, 1).unwrap_err();
        assert!(matches!(err, DpError::NonConvergence { iterations: 1, .. }));

        let flip = FiniteMarkovChain::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        // uniform start is already stationary for the flip chain
        assert!(flip.stationary_distribution(1e-9, 10).is_ok());
        assert_eq!(flip.step_distribution(&[1.0, 0.0]).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn simulate_is_seed_deterministic() {
        let chain = weather();
        let init = InitialDistribution::uniform(2);
        let a = chain
            .simulate(50, &init, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let b = chain
            .simulate(50, &init, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|&s| s < 2));
    }

    #[test]
    fn sample_respects_zero_emissions() {
        let hmm = HiddenMarkovModel::from_matrices(
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            Some(vec![0.0, 1.0]),
        )
        .unwrap();
        let (states, obs) = hmm.sample(20, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(states.iter().all(|&s| s == 1));
        assert_eq!(states, obs);
    }
}
