//! Reference decision problems.
//!
//! - [`shortest_path`]: named graph with a terminal vertex, solved by value
//!   iteration from the `+∞` guess.
//! - [`control`]: finite states and actions with discounted rewards.
//! - [`stopping`]: finite-horizon optimal stopping by backward induction,
//!   including an American put on a binomial grid.
//! - [`cake_eating`]: CRRA cake eating on a continuous state.

pub mod cake_eating;
pub mod control;
pub mod shortest_path;
pub mod stopping;
