//! Example: cost-to-go on a small weighted graph by value iteration.
//!
//! Run with:
//! `cargo run --example shortest_path`

use markov_dp::problems::shortest_path::ShortestPathGraph;
use markov_dp::{solve_bellman, BellmanOptions, Result};

fn main() -> Result<()> {
    let graph = ShortestPathGraph::from_edges(
        "G",
        &[
            ("A", "B", 1.0),
            ("A", "C", 5.0),
            ("A", "D", 3.0),
            ("B", "D", 9.0),
            ("B", "E", 6.0),
            ("C", "F", 2.0),
            ("D", "F", 4.0),
            ("D", "G", 8.0),
            ("E", "G", 4.0),
            ("F", "G", 1.0),
        ],
    )?;

    let solution = solve_bellman(&graph, &BellmanOptions::default())?;
    println!("converged after {} sweeps", solution.iterations);
    for name in ["A", "B", "C", "D", "E", "F", "G"] {
        let v = graph.index_of(name)?;
        println!("  J({name}) = {}", solution.values[v]);
    }

    match graph.optimal_path(&solution, "A")? {
        Some(path) => println!("optimal route: {}", graph.path_names(&path).join(" -> ")),
        None => println!("G is unreachable from A"),
    }
    Ok(())
}
