//! Infinite-horizon discounted control over finite states and actions.
//!
//! `V(s) = max_a r(s, a) + β Σ_{s'} F(s, a)[s'] V(s')`
//!
//! With `0 < β < 1` the Bellman operator is a contraction in the sup norm,
//! so value iteration converges from any bounded start. That is a
//! precondition enforced at construction, not something checked per sweep.

use crate::error::{DpError, Result};
use crate::model::ROW_SUM_TOLERANCE;
use crate::traits::{BellmanProblem, DiscreteSystem, Objective, ProblemKind};

/// One action: immediate reward plus a sparse next-state distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlAction {
    pub reward: f64,
    /// `(next_state, probability)` pairs summing to one.
    pub transitions: Vec<(usize, f64)>,
}

impl ControlAction {
    pub fn new(reward: f64, transitions: Vec<(usize, f64)>) -> Self {
        Self {
            reward,
            transitions,
        }
    }

    /// Action moving to `next` with certainty.
    pub fn deterministic(reward: f64, next: usize) -> Self {
        Self::new(reward, vec![(next, 1.0)])
    }
}

/// Finite control problem: per-state action lists and a discount factor.
#[derive(Clone, Debug, PartialEq)]
pub struct FiniteControlProblem {
    actions: Vec<Vec<ControlAction>>,
    discount: f64,
}

impl FiniteControlProblem {
    /// Validate rewards, transition targets and probabilities, and `β ∈ (0, 1)`.
    pub fn new(actions: Vec<Vec<ControlAction>>, discount: f64) -> Result<Self> {
        if !(discount > 0.0 && discount < 1.0) {
            return Err(DpError::InvalidDiscount {
                value: discount,
                range: "(0, 1)",
            });
        }
        let n = actions.len();
        if n == 0 {
            return Err(DpError::EmptyMatrix {
                what: "control problem",
            });
        }
        for (s, list) in actions.iter().enumerate() {
            for (a, action) in list.iter().enumerate() {
                if !action.reward.is_finite() {
                    return Err(DpError::NonFiniteCost {
                        context: format!("reward of action {a} in state {s}"),
                        value: action.reward,
                    });
                }
                let mut sum = 0.0;
                for &(next, p) in &action.transitions {
                    if next >= n {
                        return Err(DpError::DimensionMismatch {
                            what: "transition target",
                            expected: n,
                            got: next,
                        });
                    }
                    if !(0.0..=1.0).contains(&p) {
                        return Err(DpError::InvalidProbability {
                            what: "action transition",
                            row: s,
                            col: next,
                            value: p,
                        });
                    }
                    sum += p;
                }
                if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(DpError::RowNotNormalized {
                        what: "action transition",
                        row: s,
                        sum,
                    });
                }
            }
        }
        Ok(Self { actions, discount })
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn actions(&self, state: usize) -> &[ControlAction] {
        &self.actions[state]
    }

    /// Value of following a fixed policy, by iterating `V = r_π + β P_π V`.
    ///
    /// `policy[s]` indexes into `actions(s)`.
    pub fn evaluate_policy(
        &self,
        policy: &[usize],
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Vec<f64>> {
        let n = self.actions.len();
        if policy.len() != n {
            return Err(DpError::DimensionMismatch {
                what: "policy length",
                expected: n,
                got: policy.len(),
            });
        }
        if let Some(s) = (0..n).find(|&s| policy[s] >= self.actions[s].len()) {
            return Err(DpError::DimensionMismatch {
                what: "policy action index",
                expected: self.actions[s].len(),
                got: policy[s],
            });
        }
        let mut values = vec![0.0; n];
        let mut residual = f64::INFINITY;
        for _ in 0..max_iterations {
            let next: Vec<f64> = (0..n)
                .map(|s| self.action_value(s, policy[s], &values))
                .collect();
            residual = crate::utils::sup_distance(&next, &values);
            values = next;
            if residual < tolerance {
                return Ok(values);
            }
        }
        Err(DpError::NonConvergence {
            iterations: max_iterations,
            residual,
        })
    }
}

impl DiscreteSystem for FiniteControlProblem {
    fn kind(&self) -> ProblemKind {
        ProblemKind::Control
    }

    fn n_states(&self) -> usize {
        self.actions.len()
    }
}

impl BellmanProblem for FiniteControlProblem {
    /// Index into the state's action list.
    type Action = usize;

    fn objective(&self) -> Objective {
        Objective::Maximize
    }

    fn num_actions(&self, state: usize) -> usize {
        self.actions[state].len()
    }

    fn action(&self, _state: usize, index: usize) -> usize {
        index
    }

    fn action_value(&self, state: usize, index: usize, values: &[f64]) -> f64 {
        let action = &self.actions[state][index];
        let continuation: f64 = action
            .transitions
            .iter()
            .map(|&(next, p)| p * values[next])
            .sum();
        action.reward + self.discount * continuation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bellman::{solve_bellman, BellmanOptions};

    /// Two states: "idle" can stay (reward 0) or invest (reward -1, move to
    /// "productive"); "productive" pays 2 per period and stays with prob 0.9.
    fn investment() -> FiniteControlProblem {
        FiniteControlProblem::new(
            vec![
                vec![
                    ControlAction::deterministic(0.0, 0),
                    ControlAction::deterministic(-1.0, 1),
                ],
                vec![ControlAction::new(2.0, vec![(1, 0.9), (0, 0.1)])],
            ],
            0.9,
        )
        .unwrap()
    }

    #[test]
    fn optimal_policy_invests() {
        let problem = investment();
        let sol = solve_bellman(&problem, &BellmanOptions::default()).unwrap();
        assert_eq!(sol.policy, vec![Some(1), Some(0)]);
        // greedy values are a fixed point of the chosen policy
        let v_pi = problem.evaluate_policy(&[1, 0], 1e-12, 10_000).unwrap();
        for (a, b) in sol.values.iter().zip(&v_pi) {
            assert!((a - b).abs() < 1e-8);
        }
        // investing beats idling forever (value 0)
        assert!(sol.values[0] > 0.0);
    }

    #[test]
    fn rejects_invalid_discount_and_transitions() {
        let actions = vec![vec![ControlAction::deterministic(1.0, 0)]];
        assert!(matches!(
            FiniteControlProblem::new(actions.clone(), 1.0),
            Err(DpError::InvalidDiscount { .. })
        ));
        let bad = vec![vec![ControlAction::new(1.0, vec![(0, 0.5)])]];
        assert!(matches!(
            FiniteControlProblem::new(bad, 0.9),
            Err(DpError::RowNotNormalized { .. })
        ));
        let bad = vec![vec![ControlAction::deterministic(1.0, 4)]];
        assert!(matches!(
            FiniteControlProblem::new(bad, 0.9),
            Err(DpError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn evaluate_policy_checks_indices() {
        assert!(investment().evaluate_policy(&[2, 0], 1e-9, 10).is_err());
    }
}
