//! Cake eating with CRRA utility.
//!
//! State `x` is the remaining cake, action `c ∈ (0, x]` is consumption, and
//! the cake shrinks to `x - c`. Utility is `c^(1-γ) / (1-γ)`, or `ln c` for
//! `γ = 1`.

use crate::continuous::ContinuousControl;
use crate::error::{DpError, Result};

/// Smallest admissible consumption; keeps `u(c)` finite for `γ >= 1`.
pub const MIN_CONSUMPTION: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CakeEating {
    beta: f64,
    gamma: f64,
}

impl CakeEating {
    /// `beta ∈ (0, 1)` and `gamma > 0`.
    pub fn new(beta: f64, gamma: f64) -> Result<Self> {
        if !(beta > 0.0 && beta < 1.0) {
            return Err(DpError::InvalidDiscount {
                value: beta,
                range: "(0, 1)",
            });
        }
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(DpError::NonFiniteCost {
                context: "CRRA coefficient must be positive".to_string(),
                value: gamma,
            });
        }
        Ok(Self { beta, gamma })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// CRRA utility.
    pub fn utility(&self, c: f64) -> f64 {
        if self.gamma == 1.0 {
            c.ln()
        } else {
            c.powf(1.0 - self.gamma) / (1.0 - self.gamma)
        }
    }

    /// Closed-form optimal consumption `(1 - β^(1/γ)) x`.
    pub fn analytic_policy(&self, x: f64) -> f64 {
        (1.0 - self.beta.powf(1.0 / self.gamma)) * x
    }

    /// Closed-form value for `γ != 1`:
    /// `(1 - β^(1/γ))^(-γ) · u(x)`.
    pub fn analytic_value(&self, x: f64) -> Option<f64> {
        if self.gamma == 1.0 {
            return None;
        }
        let share = 1.0 - self.beta.powf(1.0 / self.gamma);
        Some(share.powf(-self.gamma) * self.utility(x))
    }
}

impl ContinuousControl for CakeEating {
    fn discount(&self) -> f64 {
        self.beta
    }

    fn action_bounds(&self, x: f64) -> (f64, f64) {
        (MIN_CONSUMPTION, x.max(MIN_CONSUMPTION))
    }

    fn reward(&self, _x: f64, c: f64) -> f64 {
        self.utility(c)
    }

    fn next_state(&self, x: f64, c: f64) -> f64 {
        x - c
    }
}
