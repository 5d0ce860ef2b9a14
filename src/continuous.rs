//! Value iteration on a continuous state space, approximated on a grid.
//!
//! The value function is stored at sorted grid points and read off-grid
//! through [`ValueAt`] (piecewise linear interpolation, clamped at the ends).
//! Each grid point's maximization over the action interval is delegated to
//! Brent's bounded scalar method from `argmin`.

use argmin::core::{CostFunction, Executor, State};
use argmin::solver::brent::BrentOpt;

use crate::error::{DpError, Result};
use crate::traits::ValueAt;
use crate::utils::sup_distance;

/// Default sup-norm tolerance for grid value iteration.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// A control problem over a one-dimensional continuous state.
///
/// `V(x) = max_{c ∈ [lo(x), hi(x)]} reward(x, c) + β V(next_state(x, c))`
pub trait ContinuousControl {
    /// `β`, expected in `(0, 1)`.
    fn discount(&self) -> f64;

    /// Feasible action interval `[lo, hi]` at state `x`.
    fn action_bounds(&self, x: f64) -> (f64, f64);

    fn reward(&self, x: f64, c: f64) -> f64;

    fn next_state(&self, x: f64, c: f64) -> f64;
}

/// Piecewise linear interpolant through `(grid[i], values[i])`.
#[derive(Clone, Debug, PartialEq)]
pub struct PiecewiseLinear<'a> {
    grid: &'a [f64],
    values: &'a [f64],
}

impl<'a> PiecewiseLinear<'a> {
    /// `grid` must be strictly increasing and as long as `values`; see
    /// [`validate_grid`].
    pub fn new(grid: &'a [f64], values: &'a [f64]) -> Result<Self> {
        validate_grid(grid)?;
        if values.len() != grid.len() {
            return Err(DpError::DimensionMismatch {
                what: "grid values",
                expected: grid.len(),
                got: values.len(),
            });
        }
        Ok(Self { grid, values })
    }
}

impl ValueAt for PiecewiseLinear<'_> {
    fn value_at(&self, x: f64) -> f64 {
        let last = self.grid.len() - 1;
        if x <= self.grid[0] {
            return self.values[0];
        }
        if x >= self.grid[last] {
            return self.values[last];
        }
        // first index with grid[i] > x; 1 <= hi <= last here
        let hi = self.grid.partition_point(|&g| g <= x);
        let lo = hi - 1;
        let w = (x - self.grid[lo]) / (self.grid[hi] - self.grid[lo]);
        self.values[lo] + w * (self.values[hi] - self.values[lo])
    }
}

/// Reject empty, non-finite or non-increasing grids.
pub fn validate_grid(grid: &[f64]) -> Result<()> {
    if grid.is_empty() {
        return Err(DpError::InvalidGrid {
            reason: "grid is empty",
        });
    }
    if grid.iter().any(|g| !g.is_finite()) {
        return Err(DpError::InvalidGrid {
            reason: "grid contains non-finite points",
        });
    }
    if grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(DpError::InvalidGrid {
            reason: "grid must be strictly increasing",
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContinuousOptions {
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Iteration cap handed to each Brent run.
    pub optimizer_max_iters: u64,
}

impl Default for ContinuousOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: 1_000,
            optimizer_max_iters: 100,
        }
    }
}

impl ContinuousOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_optimizer_max_iters(mut self, iters: u64) -> Self {
        self.optimizer_max_iters = iters;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DpError::InvalidTolerance {
                value: self.tolerance,
            });
        }
        if self.max_iterations == 0 || self.optimizer_max_iters == 0 {
            return Err(DpError::InvalidIterationCap);
        }
        Ok(())
    }
}

/// Converged value function and policy on the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSolution {
    pub grid: Vec<f64>,
    pub values: Vec<f64>,
    /// Maximizing action at each grid point.
    pub policy: Vec<f64>,
    pub iterations: usize,
    pub residual: f64,
}

impl GridSolution {
    /// Interpolated value function.
    pub fn value_function(&self) -> PiecewiseLinear<'_> {
        PiecewiseLinear {
            grid: &self.grid,
            values: &self.values,
        }
    }

    /// Interpolated policy.
    pub fn policy_function(&self) -> PiecewiseLinear<'_> {
        PiecewiseLinear {
            grid: &self.grid,
            values: &self.policy,
        }
    }
}

/// `-(reward(x, c) + β V(next_state(x, c)))` as an `argmin` cost in `c`.
struct NegatedLookahead<'a, P, V> {
    problem: &'a P,
    value: &'a V,
    x: f64,
}

impl<P: ContinuousControl, V: ValueAt> NegatedLookahead<'_, P, V> {
    fn lookahead(&self, c: f64) -> f64 {
        let p = self.problem;
        p.reward(self.x, c) + p.discount() * self.value.value_at(p.next_state(self.x, c))
    }
}

impl<P: ContinuousControl, V: ValueAt> CostFunction for NegatedLookahead<'_, P, V> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, c: &f64) -> std::result::Result<f64, argmin::core::Error> {
        let value = self.lookahead(*c);
        if !value.is_finite() {
            return Err(DpError::NonFiniteCost {
                context: format!("lookahead at state {} with action {c}", self.x),
                value,
            }
            .into());
        }
        Ok(-value)
    }
}

/// Maximize the one-step lookahead at `x` against an arbitrary value function.
///
/// Returns `(action, value)`. The Brent optimum is compared with both interval
/// end points, since corner solutions are common (for example eating the
/// whole cake).
pub fn maximize_at<P, V>(problem: &P, value: &V, x: f64, max_iters: u64) -> Result<(f64, f64)>
where
    P: ContinuousControl,
    V: ValueAt,
{
    let (lower, upper) = problem.action_bounds(x);
    if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
        return Err(DpError::InvalidActionBounds {
            state: x,
            lower,
            upper,
        });
    }
    let objective = NegatedLookahead { problem, value, x };
    if lower == upper {
        return Ok((lower, -objective.cost(&lower)?));
    }

    let solver = BrentOpt::new(lower, upper);
    let result = Executor::new(NegatedLookahead { problem, value, x }, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()?;
    let state = result.state();
    let interior = state.get_best_param().copied().unwrap_or(lower);

    let mut best = (lower, -objective.cost(&lower)?);
    for c in [interior, upper] {
        let v = -objective.cost(&c)?;
        if v > best.1 {
            best = (c, v);
        }
    }
    Ok(best)
}

/// Value iteration on `grid`, starting from `V = 0`.
///
/// # Errors
/// Grid or option validation failures, a discount outside `(0, 1)`,
/// invalid action bounds, optimizer failures, and
/// [`DpError::NonConvergence`] when the cap is hit.
pub fn solve_continuous<P: ContinuousControl>(
    problem: &P,
    grid: &[f64],
    options: &ContinuousOptions,
) -> Result<GridSolution> {
    options.validate()?;
    validate_grid(grid)?;
    let beta = problem.discount();
    if !(beta > 0.0 && beta < 1.0) {
        return Err(DpError::InvalidDiscount {
            value: beta,
            range: "(0, 1)",
        });
    }

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!("continuous_value_iteration", grid_points = grid.len());
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut values = vec![0.0; grid.len()];
    let mut policy = vec![0.0; grid.len()];
    let mut residual = f64::INFINITY;

    for iteration in 1..=options.max_iterations {
        let current = PiecewiseLinear {
            grid,
            values: &values,
        };
        let mut next = Vec::with_capacity(grid.len());
        for (i, &x) in grid.iter().enumerate() {
            let (c, v) = maximize_at(problem, &current, x, options.optimizer_max_iters)?;
            policy[i] = c;
            next.push(v);
        }
        residual = sup_distance(&next, &values);
        values = next;

        #[cfg(feature = "tracing")]
        tracing::trace!(iteration, residual, "grid sweep");

        if residual < options.tolerance {
            #[cfg(feature = "tracing")]
            tracing::debug!(iterations = iteration, residual, "grid value iteration converged");
            return Ok(GridSolution {
                grid: grid.to_vec(),
                values,
                policy,
                iterations: iteration,
                residual,
            });
        }
    }

    #[cfg(feature = "tracing")]
    tracing::warn!(
        iterations = options.max_iterations,
        residual,
        "grid value iteration hit the iteration cap"
    );
    Err(DpError::NonConvergence {
        iterations: options.max_iterations,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_is_linear_and_clamped() {
        let grid = [0.0, 1.0, 3.0];
        let values = [0.0, 2.0, 6.0];
        let f = PiecewiseLinear::new(&grid, &values).unwrap();
        assert_eq!(f.value_at(-1.0), 0.0);
        assert_eq!(f.value_at(0.5), 1.0);
        assert_eq!(f.value_at(1.0), 2.0);
        assert_eq!(f.value_at(2.0), 4.0);
        assert_eq!(f.value_at(10.0), 6.0);
    }

    #[test]
    fn rejects_bad_grids() {
        assert!(validate_grid(&[]).is_err());
        assert!(validate_grid(&[0.0, 0.0]).is_err());
        assert!(validate_grid(&[0.0, f64::NAN]).is_err());
        assert!(PiecewiseLinear::new(&[0.0, 1.0], &[1.0]).is_err());
    }

    /// Linear reward, no future: the best action is the upper bound.
    struct Greedy;

    impl ContinuousControl for Greedy {
        fn discount(&self) -> f64 {
            0.5
        }
        fn action_bounds(&self, x: f64) -> (f64, f64) {
            (0.0, x)
        }
        fn reward(&self, _x: f64, c: f64) -> f64 {
            c
        }
        fn next_state(&self, x: f64, c: f64) -> f64 {
            x - c
        }
    }

    #[test]
    fn corner_solution_is_found() {
        let zero = |_: f64| 0.0;
        let (c, v) = maximize_at(&Greedy, &zero, 2.0, 100).unwrap();
        assert_eq!(c, 2.0);
        assert_eq!(v, 2.0);
    }

    #[test]
    fn interior_optimum_matches_closed_form() {
        // max_c -(c - 1)^2 on [0, 3] via reward only
        struct Quadratic;
        impl ContinuousControl for Quadratic {
            fn discount(&self) -> f64 {
                0.9
            }
            fn action_bounds(&self, _x: f64) -> (f64, f64) {
                (0.0, 3.0)
            }
            fn reward(&self, _x: f64, c: f64) -> f64 {
                -(c - 1.0) * (c - 1.0)
            }
            fn next_state(&self, x: f64, _c: f64) -> f64 {
                x
            }
        }
        let zero = |_: f64| 0.0;
        let (c, v) = maximize_at(&Quadratic, &zero, 0.0, 100).unwrap();
        assert!((c - 1.0).abs() < 1e-4);
        assert!(v.abs() < 1e-8);

        // V = -0 + 0.9 V  => fixed point 0 at every grid point
        let sol = solve_continuous(&Quadratic, &[0.0, 1.0], &ContinuousOptions::default()).unwrap();
        assert!(sol.values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn greedy_grid_solution_eats_everything() {
        let grid = [0.0, 1.0, 2.0];
        let sol = solve_continuous(&Greedy, &grid, &ContinuousOptions::default()).unwrap();
        for (x, (v, c)) in grid.iter().zip(sol.values.iter().zip(&sol.policy)) {
            assert!((v - x).abs() < 1e-9);
            assert!((c - x).abs() < 1e-9);
        }
        assert_eq!(sol.value_function().value_at(1.5), 1.5);
    }

    #[test]
    fn invalid_bounds_are_reported() {
        struct Backwards;
        impl ContinuousControl for Backwards {
            fn discount(&self) -> f64 {
                0.9
            }
            fn action_bounds(&self, _x: f64) -> (f64, f64) {
                (1.0, 0.0)
            }
            fn reward(&self, _x: f64, _c: f64) -> f64 {
                0.0
            }
            fn next_state(&self, x: f64, _c: f64) -> f64 {
                x
            }
        }
        assert!(matches!(
            solve_continuous(&Backwards, &[1.0], &ContinuousOptions::default()),
            Err(DpError::InvalidActionBounds { .. })
        ));
    }
}
