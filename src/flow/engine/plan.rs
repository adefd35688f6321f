// SPDX-License-Identifier: MIT

//! Discovery and dependency ordering
//!
//! Pure functions over a [`Graph`]: which blocks a run touches, and in what
//! order Kahn's algorithm releases them.

use super::types::Traversal;
use crate::bdk::connector::BlockId;
use crate::bdk::error::GraphError;
use crate::flow::graph::Graph;
use std::collections::{HashMap, HashSet, VecDeque};

/// Blocks reachable from `starts` along outgoing connectors.
///
/// Each block is visited once. The result is in container insertion order
/// whatever the traversal, so it never influences execution order.
pub fn discover(
    graph: &Graph,
    starts: &[BlockId],
    traversal: Traversal,
) -> Result<Vec<BlockId>, GraphError> {
    for id in starts {
        graph.get(id)?;
    }

    let mut visited: HashSet<BlockId> = HashSet::new();
    let mut frontier: VecDeque<BlockId> = VecDeque::new();
    for id in starts {
        if visited.insert(id.clone()) {
            frontier.push_back(id.clone());
        }
    }

    while let Some(current) = match traversal {
        Traversal::Bfs => frontier.pop_front(),
        Traversal::Dfs => frontier.pop_back(),
    } {
        let Some(block) = graph.block(&current) else {
            continue;
        };
        for connector in block.outgoing() {
            if graph.contains(&connector.target) && visited.insert(connector.target.clone()) {
                frontier.push_back(connector.target.clone());
            }
        }
    }

    let mut reachable: Vec<BlockId> = visited.into_iter().collect();
    reachable.sort_by_key(|id| graph.position(id).unwrap_or(usize::MAX));
    Ok(reachable)
}

/// Result of a dry Kahn pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KahnOrder {
    pub order: Vec<BlockId>,
    /// Blocks that never reached in-degree zero
    pub unresolved: Vec<BlockId>,
}

/// Forward adjacency and in-degrees over a reachable set.
///
/// Every connector between two reachable blocks counts once, so parallel
/// edges between the same pair add to the in-degree.
#[derive(Debug, Clone)]
pub struct Dependencies {
    blocks: Vec<BlockId>,
    forward: HashMap<BlockId, Vec<BlockId>>,
    in_degree: HashMap<BlockId, usize>,
}

impl Dependencies {
    pub fn build(graph: &Graph, reachable: &[BlockId]) -> Self {
        let members: HashSet<&BlockId> = reachable.iter().collect();
        let mut forward: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let mut in_degree: HashMap<BlockId, usize> =
            reachable.iter().map(|id| (id.clone(), 0)).collect();

        for id in reachable {
            let Some(block) = graph.block(id) else {
                continue;
            };
            let successors = forward.entry(id.clone()).or_default();
            for connector in block.outgoing() {
                if !members.contains(&connector.target) {
                    continue;
                }
                successors.push(connector.target.clone());
                if let Some(degree) = in_degree.get_mut(&connector.target) {
                    *degree += 1;
                }
            }
        }

        Self {
            blocks: reachable.to_vec(),
            forward,
            in_degree,
        }
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn successors(&self, id: &str) -> &[BlockId] {
        self.forward.get(id).map(|s| s.as_slice()).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    pub(crate) fn in_degrees(&self) -> HashMap<BlockId, usize> {
        self.in_degree.clone()
    }

    /// Zero in-degree blocks in reachable-set order
    pub fn initial_ready(&self) -> VecDeque<BlockId> {
        self.blocks
            .iter()
            .filter(|id| self.in_degree(id) == 0)
            .cloned()
            .collect()
    }

    /// Run Kahn's algorithm without executing anything
    pub fn kahn_order(&self) -> KahnOrder {
        let mut in_degree = self.in_degrees();
        let mut ready = self.initial_ready();
        let mut order = Vec::with_capacity(self.blocks.len());

        while let Some(id) = ready.pop_front() {
            for next in self.successors(&id) {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next.clone());
                    }
                }
            }
            order.push(id);
        }

        let done: HashSet<&BlockId> = order.iter().collect();
        let unresolved = self
            .blocks
            .iter()
            .filter(|id| !done.contains(id))
            .cloned()
            .collect();
        KahnOrder { order, unresolved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::blocks::start::{GO, TRIGGER};
    use crate::flow::blocks::{Block, LogicOperation};

    /// S -> A -> C, S -> B -> C, plus an unreachable D
    fn diamond() -> (Graph, Vec<BlockId>) {
        let mut graph = Graph::new();
        let d = graph
            .add_block(Block::logic("D", LogicOperation::Add))
            .unwrap();
        let s = graph.add_block(Block::start("S")).unwrap();
        let a = graph
            .add_block(Block::logic("A", LogicOperation::Add))
            .unwrap();
        let b = graph
            .add_block(Block::logic("B", LogicOperation::Add))
            .unwrap();
        let c = graph
            .add_block(Block::logic("C", LogicOperation::Add))
            .unwrap();
        graph.connect(&s, GO, &b, "val_a", None).unwrap();
        graph.connect(&s, GO, &a, "val_a", None).unwrap();
        graph.connect(&a, "result", &c, "val_a", None).unwrap();
        graph.connect(&b, "result", &c, "val_b", None).unwrap();
        (graph, vec![d, s, a, b, c])
    }

    #[test]
    fn test_discover_uses_insertion_order_for_both_traversals() {
        let (graph, ids) = diamond();
        let starts = vec![ids[1].clone()];
        let bfs = discover(&graph, &starts, Traversal::Bfs).unwrap();
        let dfs = discover(&graph, &starts, Traversal::Dfs).unwrap();

        assert_eq!(bfs, ids[1..].to_vec());
        assert_eq!(bfs, dfs);
    }

    #[test]
    fn test_discover_unknown_start() {
        let (graph, _) = diamond();
        let err = discover(&graph, &["ghost".to_string()], Traversal::Bfs).unwrap_err();
        assert_eq!(err, GraphError::unknown_block("ghost"));
    }

    #[test]
    fn test_in_degrees_and_order() {
        let (graph, ids) = diamond();
        let reachable = discover(&graph, &[ids[1].clone()], Traversal::Bfs).unwrap();
        let deps = Dependencies::build(&graph, &reachable);

        assert_eq!(deps.in_degree(&ids[1]), 0);
        assert_eq!(deps.in_degree(&ids[4]), 2);
        assert_eq!(deps.initial_ready(), VecDeque::from(vec![ids[1].clone()]));

        let kahn = deps.kahn_order();
        // S's edges were connected to B first, so B is released before A
        assert_eq!(
            kahn.order,
            vec![ids[1].clone(), ids[3].clone(), ids[2].clone(), ids[4].clone()]
        );
        assert!(kahn.unresolved.is_empty());
    }

    #[test]
    fn test_cycle_leaves_unresolved() {
        let (mut graph, ids) = diamond();
        // C feeds A back: A and C wait on each other
        graph.connect(&ids[4], "result", &ids[2], "val_b", None).unwrap();

        let reachable = discover(&graph, &[ids[1].clone()], Traversal::Dfs).unwrap();
        let kahn = Dependencies::build(&graph, &reachable).kahn_order();

        assert_eq!(kahn.order, vec![ids[1].clone(), ids[3].clone()]);
        assert_eq!(kahn.unresolved, vec![ids[2].clone(), ids[4].clone()]);
    }

    #[test]
    fn test_edges_leaving_the_reachable_set_are_ignored() {
        let (mut graph, ids) = diamond();
        // D is only upstream of C; starting from S it is not reachable
        graph.connect(&ids[0], "result", &ids[4], TRIGGER, None).unwrap();

        let reachable = discover(&graph, &[ids[1].clone()], Traversal::Bfs).unwrap();
        let deps = Dependencies::build(&graph, &reachable);
        assert!(!reachable.contains(&ids[0]));
        assert_eq!(deps.in_degree(&ids[4]), 2);
    }
}
