//! Shortest path to a terminal vertex as a Bellman problem.
//!
//! Graph structure: named vertices, directed weighted edges, one terminal.
//! Value: `J(terminal) = 0`, `J(v) = min_w cost(v, w) + J(w)`.
//! Vertices that cannot reach the terminal keep `J = +∞`.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::bellman::BellmanSolution;
use crate::error::{DpError, Result};
use crate::traits::{BellmanProblem, DiscreteSystem, Objective, ProblemKind};
use crate::utils::value_gap;

/// Relative slack when testing `cost + J(w) == J(v)` on a solved graph.
const TIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct ShortestPathGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// adjacency[u] = Vec<(v, cost)>, in insertion order
    adjacency: Vec<Vec<(usize, f64)>>,
    terminal: usize,
}

impl ShortestPathGraph {
    /// Empty graph containing only the terminal vertex.
    pub fn new(terminal: &str) -> Self {
        let mut graph = Self {
            names: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            terminal: 0,
        };
        graph.terminal = graph.add_vertex(terminal);
        graph
    }

    /// Build from `(from, to, cost)` triples; vertices are created on first use.
    pub fn from_edges(terminal: &str, edges: &[(&str, &str, f64)]) -> Result<Self> {
        let mut graph = Self::new(terminal);
        for &(from, to, cost) in edges {
            graph.add_edge(from, to, cost)?;
        }
        Ok(graph)
    }

    /// Build from index adjacency lists; vertex `i` is named `"i"`.
    pub fn from_adjacency(adjacency: Vec<Vec<(usize, f64)>>, terminal: usize) -> Result<Self> {
        let n = adjacency.len();
        if terminal >= n {
            return Err(DpError::UnknownVertex {
                name: terminal.to_string(),
            });
        }
        for (u, edges) in adjacency.iter().enumerate() {
            for &(v, cost) in edges {
                if v >= n {
                    return Err(DpError::UnknownVertex {
                        name: v.to_string(),
                    });
                }
                check_cost(u, v, cost)?;
            }
        }
        let names: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Ok(Self {
            names,
            index,
            adjacency,
            terminal,
        })
    }

    /// Add (or look up) a vertex by name.
    pub fn add_vertex(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.adjacency.push(Vec::new());
        idx
    }

    /// Add a directed edge; costs must be finite.
    pub fn add_edge(&mut self, from: &str, to: &str, cost: f64) -> Result<()> {
        check_cost(from, to, cost)?;
        let u = self.add_vertex(from);
        let v = self.add_vertex(to);
        self.adjacency[u].push((v, cost));
        Ok(())
    }

    pub fn terminal(&self) -> usize {
        self.terminal
    }

    pub fn name(&self, vertex: usize) -> &str {
        &self.names[vertex]
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DpError::UnknownVertex {
                name: name.to_string(),
            })
    }

    /// Outgoing edges of `vertex`.
    pub fn edges(&self, vertex: usize) -> &[(usize, f64)] {
        &self.adjacency[vertex]
    }

    /// Follow a solved policy from `from` to the terminal.
    ///
    /// Returns `None` when the terminal is unreachable from `from`, i.e. when
    /// `J(from)` is infinite. Zero-cost ties can make the greedy policy cycle;
    /// the walk then falls back to a breadth-first search over tight edges
    /// (`cost + J(w) == J(v)`).
    ///
    /// # Errors
    /// [`DpError::UnknownVertex`] for an unknown name, and
    /// [`DpError::NoTightPath`] when `J(from)` is finite but no tight edges
    /// lead to the terminal (a solution from another graph, or one stopped
    /// before convergence).
    pub fn optimal_path(
        &self,
        solution: &BellmanSolution<usize>,
        from: &str,
    ) -> Result<Option<Vec<usize>>> {
        let start = self.index_of(from)?;
        if !solution.values.get(start).is_some_and(|v| v.is_finite()) {
            return Ok(None);
        }
        let mut visited = vec![false; self.names.len()];
        visited[start] = true;
        let mut node = start;
        let mut path = vec![node];
        while node != self.terminal {
            match solution.policy.get(node).cloned().flatten() {
                Some(next) if next < visited.len() && !visited[next] => {
                    visited[next] = true;
                    path.push(next);
                    node = next;
                }
                _ => return self.tight_path(&solution.values, start).map(Some),
            }
        }
        Ok(Some(path))
    }

    fn tight_path(&self, values: &[f64], start: usize) -> Result<Vec<usize>> {
        let n = self.names.len();
        let value = |v: usize| values.get(v).copied().unwrap_or(f64::INFINITY);
        let mut parent = vec![None; n];
        let mut seen = vec![false; n];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(u) = queue.pop_front() {
            if u == self.terminal {
                let mut path = vec![u];
                let mut node = u;
                while let Some(p) = parent[node] {
                    path.push(p);
                    node = p;
                }
                path.reverse();
                return Ok(path);
            }
            let ju = value(u);
            let slack = TIGHT_TOLERANCE * ju.abs().max(1.0);
            for &(w, cost) in &self.adjacency[u] {
                if seen[w] || value_gap(cost + value(w), ju) > slack {
                    continue;
                }
                seen[w] = true;
                parent[w] = Some(u);
                queue.push_back(w);
            }
        }
        Err(DpError::NoTightPath {
            from: self.names[start].clone(),
        })
    }

    /// Vertex names along an index path.
    pub fn path_names(&self, path: &[usize]) -> Vec<&str> {
        path.iter().map(|&v| self.name(v)).collect()
    }
}

fn check_cost(u: impl fmt::Display, v: impl fmt::Display, cost: f64) -> Result<()> {
    if cost.is_finite() {
        Ok(())
    } else {
        Err(DpError::NonFiniteCost {
            context: format!("edge {u} -> {v}"),
            value: cost,
        })
    }
}

impl DiscreteSystem for ShortestPathGraph {
    fn kind(&self) -> ProblemKind {
        ProblemKind::ShortestPath
    }

    fn n_states(&self) -> usize {
        self.names.len()
    }
}

impl BellmanProblem for ShortestPathGraph {
    /// Successor vertex.
    type Action = usize;

    fn objective(&self) -> Objective {
        Objective::Minimize
    }

    fn num_actions(&self, state: usize) -> usize {
        self.adjacency[state].len()
    }

    fn action(&self, state: usize, index: usize) -> usize {
        self.adjacency[state][index].0
    }

    fn action_value(&self, state: usize, index: usize, values: &[f64]) -> f64 {
        let (to, cost) = self.adjacency[state][index];
        cost + values[to]
    }

    fn boundary_value(&self, state: usize) -> Option<f64> {
        (state == self.terminal).then_some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bellman::{solve_bellman, BellmanOptions};

    #[test]
    fn simple_chain_sp() {
        let graph =
            ShortestPathGraph::from_edges("T", &[("S", "M", 1.0), ("M", "T", 1.0), ("S", "T", 5.0)])
                .unwrap();
        let sol = solve_bellman(&graph, &BellmanOptions::default()).unwrap();
        let s = graph.index_of("S").unwrap();
        assert_eq!(sol.values[s], 2.0);
        let path = graph.optimal_path(&sol, "S").unwrap().unwrap();
        assert_eq!(graph.path_names(&path), vec!["S", "M", "T"]);
    }

    #[test]
    fn unreachable_vertex_stays_infinite() {
        let graph =
            ShortestPathGraph::from_edges("T", &[("A", "T", 2.0), ("B", "C", 1.0)]).unwrap();
        let sol = solve_bellman(&graph, &BellmanOptions::default()).unwrap();
        let b = graph.index_of("B").unwrap();
        let c = graph.index_of("C").unwrap();
        assert_eq!(sol.values[b], f64::INFINITY);
        assert_eq!(sol.values[c], f64::INFINITY);
        assert_eq!(sol.policy[b], None);
        assert_eq!(graph.optimal_path(&sol, "B").unwrap(), None);
    }

    #[test]
    fn negative_cycle_fails_to_converge() {
        let graph = ShortestPathGraph::from_edges(
            "T",
            &[("A", "B", -2.0), ("B", "A", 1.0), ("A", "T", 1.0)],
        )
        .unwrap();
        let opts = BellmanOptions::default().with_max_iterations(200);
        let err = solve_bellman(&graph, &opts).unwrap_err();
        assert!(matches!(err, DpError::NonConvergence { iterations: 200, .. }));
    }

    #[test]
    fn rejects_bad_edges() {
        let mut graph = ShortestPathGraph::new("T");
        assert!(matches!(
            graph.add_edge("A", "T", f64::NAN),
            Err(DpError::NonFiniteCost { .. })
        ));
        assert!(matches!(
            ShortestPathGraph::from_adjacency(vec![vec![(3, 1.0)]], 0),
            Err(DpError::UnknownVertex { .. })
        ));
        assert!(graph.index_of("missing").is_err());
    }

    #[test]
    fn rejected_edge_leaves_graph_unchanged() {
        let mut graph = ShortestPathGraph::new("T");
        assert!(graph.add_edge("X", "Y", f64::NAN).is_err());
        assert_eq!(graph.n_states(), 1);
        assert!(graph.index_of("X").is_err());
        assert!(graph.index_of("Y").is_err());
    }

    #[test]
    fn zero_cost_cycle_still_reaches_terminal() {
        // A and B tie at zero; first-action ties send A -> B -> A
        let graph = ShortestPathGraph::from_edges(
            "T",
            &[("A", "B", 0.0), ("B", "A", 0.0), ("A", "T", 0.0)],
        )
        .unwrap();
        let sol = solve_bellman(&graph, &BellmanOptions::default()).unwrap();
        let a = graph.index_of("A").unwrap();
        let b = graph.index_of("B").unwrap();
        assert_eq!(sol.values[a], 0.0);
        assert_eq!(sol.values[b], 0.0);

        let path = graph.optimal_path(&sol, "A").unwrap().unwrap();
        assert_eq!(graph.path_names(&path), vec!["A", "T"]);
        let path = graph.optimal_path(&sol, "B").unwrap().unwrap();
        assert_eq!(graph.path_names(&path), vec!["B", "A", "T"]);
    }

    #[test]
    fn finite_value_without_tight_edges_is_an_error() {
        let graph = ShortestPathGraph::from_edges("T", &[("A", "T", 1.0)]).unwrap();
        let mut sol = solve_bellman(&graph, &BellmanOptions::default()).unwrap();
        let a = graph.index_of("A").unwrap();
        sol.values[a] = 5.0;
        sol.policy[a] = None;
        assert!(matches!(
            graph.optimal_path(&sol, "A"),
            Err(DpError::NoTightPath { .. })
        ));
    }
}
