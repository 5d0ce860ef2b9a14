use markov_dp::problems::stopping::{binomial_put, StoppingDecision};
use markov_dp::{solve_backward_induction, FiniteMarkovChain, StoppingProblem};
use proptest::prelude::*;

/// Same recursion without the exercise option.
fn european_value(problem: &StoppingProblem) -> Vec<f64> {
    let mut values = problem.terminal_values().to_vec();
    for _ in 0..problem.horizon() {
        values = (0..values.len())
            .map(|s| problem.continuation_value(s, &values))
            .collect();
    }
    values
}

#[test]
fn american_put_dominates_european() {
    let horizon = 20;
    let problem = binomial_put(100.0, 100.0, 1.05, 0.01, horizon).unwrap();
    let sol = solve_backward_induction(&problem).unwrap();
    assert_eq!(sol.values.len(), horizon + 1);
    assert_eq!(sol.decisions.len(), horizon);

    let european = european_value(&problem);
    for (american, euro) in sol.values[0].iter().zip(&european) {
        assert!(*american >= euro - 1e-12);
    }
    // strictly more valuable at the money with a positive rate
    assert!(sol.initial_value(horizon) > european[horizon]);
}

#[test]
fn deep_in_the_money_exercises() {
    let horizon = 10;
    let problem = binomial_put(100.0, 100.0, 1.1, 0.02, horizon).unwrap();
    let sol = solve_backward_induction(&problem).unwrap();
    // state 0 carries the lowest price
    assert_eq!(sol.decisions[horizon - 1][0], StoppingDecision::Exercise);
    assert_eq!(sol.decisions[0][0], StoppingDecision::Exercise);
    // at the money the payoff is zero but waiting is worth something
    assert_eq!(sol.decisions[0][horizon], StoppingDecision::Continue);
}

#[test]
fn stopping_time_follows_the_decision_grid() {
    let chain = FiniteMarkovChain::new(vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
    let problem = StoppingProblem::new(chain, vec![0.0, 3.0], vec![0.0, 0.0], 0.0, 3).unwrap();
    let sol = solve_backward_induction(&problem).unwrap();
    assert_eq!(sol.stopping_time(&[0, 0, 1, 1]), Some(2));
    assert_eq!(sol.stopping_time(&[0, 0]), None);
}

proptest! {
    #[test]
    fn values_dominate_exercise_and_continuation(
        exercise in prop::collection::vec(0.0f64..10.0, 4),
        terminal in prop::collection::vec(0.0f64..10.0, 4),
        rate in 0.0f64..0.1,
        horizon in 0usize..8,
    ) {
        let p = vec![
            vec![0.4, 0.6, 0.0, 0.0],
            vec![0.3, 0.4, 0.3, 0.0],
            vec![0.0, 0.3, 0.4, 0.3],
            vec![0.0, 0.0, 0.6, 0.4],
        ];
        let problem = StoppingProblem::new(
            FiniteMarkovChain::new(p).unwrap(),
            exercise.clone(),
            terminal.clone(),
            rate,
            horizon,
        )
        .unwrap();
        let sol = solve_backward_induction(&problem).unwrap();
        prop_assert_eq!(&sol.values[horizon], &terminal);
        for t in 0..horizon {
            for s in 0..4 {
                let wait = problem.continuation_value(s, &sol.values[t + 1]);
                let v = sol.values[t][s];
                prop_assert!(v >= exercise[s] && v >= wait);
                let expected = if exercise[s] >= wait {
                    StoppingDecision::Exercise
                } else {
                    StoppingDecision::Continue
                };
                prop_assert_eq!(sol.decisions[t][s], expected);
            }
        }
    }
}
