//! Fixed-point graph closure
//!
//! Breadth-first expansion from a seed set until no new nodes are found.
//! Used by the in-memory store for ancestor, descendant and item walks.

use crate::domain::LineageError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

/// Bounds applied to a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    /// Maximum number of edges between a seed and a reached node
    pub max_depth: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// A node reached by a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reached<N> {
    pub node: N,

    /// Nodes from the seed to `node`, inclusive
    pub path: Vec<N>,
}

impl<N: Display> Reached<N> {
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Path rendered as `a->b->c`
    pub fn path_label(&self) -> String {
        join_path(&self.path)
    }
}

/// Computes every node reachable from `seeds` through `expand`
///
/// Nodes are returned in breadth-first discovery order, each once, with the
/// first path that reached it. Seeds are only returned when another seed
/// reaches them.
///
/// # Errors
///
/// Returns [`LineageError::Cycle`] when the reachable subgraph contains a
/// cycle, even one closed through a node first reached on another branch,
/// and [`LineageError::IterationLimit`] when a path grows past
/// `limits.max_depth`.
pub fn walk<N, F>(seeds: &[N], mut expand: F, limits: WalkLimits) -> Result<Vec<Reached<N>>, LineageError>
where
    N: Clone + Eq + Hash + Display,
    F: FnMut(&N) -> Vec<N>,
{
    let mut queue: VecDeque<Vec<N>> = VecDeque::new();
    let mut expanded: HashSet<N> = HashSet::new();
    let mut reached: HashSet<N> = HashSet::new();
    let mut edges: HashMap<N, Vec<N>> = HashMap::new();
    let mut results = Vec::new();

    for seed in seeds {
        if expanded.insert(seed.clone()) {
            queue.push_back(vec![seed.clone()]);
        }
    }

    while let Some(path) = queue.pop_front() {
        let Some(current) = path.last() else {
            continue;
        };

        let neighbours = expand(current);
        edges.insert(current.clone(), neighbours.clone());

        for next in neighbours {
            if path.contains(&next) {
                let mut cyclic = path.clone();
                cyclic.push(next);
                return Err(LineageError::Cycle {
                    path: join_path(&cyclic),
                });
            }

            if !reached.insert(next.clone()) {
                continue;
            }

            if path.len() > limits.max_depth {
                return Err(LineageError::IterationLimit {
                    limit: limits.max_depth,
                });
            }

            let mut next_path = path.clone();
            next_path.push(next.clone());

            if expanded.insert(next.clone()) {
                queue.push_back(next_path.clone());
            }

            results.push(Reached {
                node: next,
                path: next_path,
            });
        }
    }

    if let Some(cycle) = find_back_edge(seeds, &edges) {
        return Err(LineageError::Cycle {
            path: join_path(&cycle),
        });
    }

    Ok(results)
}

/// Depth-first search over the expanded subgraph for an edge back onto the stack
fn find_back_edge<N>(seeds: &[N], edges: &HashMap<N, Vec<N>>) -> Option<Vec<N>>
where
    N: Clone + Eq + Hash,
{
    let mut finished: HashSet<N> = HashSet::new();

    for seed in seeds {
        if finished.contains(seed) {
            continue;
        }

        let mut stack: Vec<(N, usize)> = vec![(seed.clone(), 0)];
        let mut on_stack: HashSet<N> = HashSet::from([seed.clone()]);

        loop {
            let Some((node, index)) = stack.last_mut() else {
                break;
            };
            let next = edges.get(&*node).and_then(|n| n.get(*index)).cloned();
            *index += 1;

            match next {
                Some(child) if on_stack.contains(&child) => {
                    let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut cycle: Vec<N> = stack[start..].iter().map(|(n, _)| n.clone()).collect();
                    cycle.push(child);
                    return Some(cycle);
                }
                Some(child) => {
                    if !finished.contains(&child) {
                        on_stack.insert(child.clone());
                        stack.push((child, 0));
                    }
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        on_stack.remove(&done);
                        finished.insert(done);
                    }
                }
            }
        }
    }

    None
}

fn join_path<N: Display>(path: &[N]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("->")
}
