//! Resource-allocation graph.
//!
//! [`ResourceGraph`] is a [`StateSink`] that keeps the live bipartite graph of
//! actors and resources: a request edge points from a waiting actor to a
//! resource, a grant edge from a resource to its holder. A grant replaces the
//! matching request. A cycle means every actor on it waits for a resource
//! held by the next one.

use crate::sink::StateSink;
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum EdgeKind {
    Request,
    Grant,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Edge {
    pub actor: ActorId,
    pub resource: ResourceId,
    pub kind: EdgeKind,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Node {
    Actor(ActorId),
    Resource(ResourceId),
}

/// Point-in-time copy of the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub actors: BTreeMap<ActorId, Option<ActorState>>,
    pub resources: BTreeMap<ResourceId, Option<u32>>,
    pub edges: BTreeSet<Edge>,
    pub violations: Vec<(ProblemKind, String)>,
}

impl GraphSnapshot {
    pub fn state_of(&self, actor: ActorId) -> Option<ActorState> {
        self.actors.get(&actor).copied().flatten()
    }

    pub fn level_of(&self, resource: ResourceId) -> Option<u32> {
        self.resources.get(&resource).copied().flatten()
    }

    pub fn holders(&self, resource: ResourceId) -> Vec<ActorId> {
        self.edges
            .iter()
            .filter(|e| e.resource == resource && e.kind == EdgeKind::Grant)
            .map(|e| e.actor)
            .collect()
    }

    pub fn requests_of(&self, actor: ActorId) -> Vec<ResourceId> {
        self.edges
            .iter()
            .filter(|e| e.actor == actor && e.kind == EdgeKind::Request)
            .map(|e| e.resource)
            .collect()
    }

    /// Returns the nodes of one cycle, if there is any.
    pub fn find_cycle(&self) -> Option<Vec<Node>> {
        let mut adjacency: BTreeMap<Node, Vec<Node>> = BTreeMap::new();
        for edge in &self.edges {
            let (from, to) = match edge.kind {
                EdgeKind::Request => (Node::Actor(edge.actor), Node::Resource(edge.resource)),
                EdgeKind::Grant => (Node::Resource(edge.resource), Node::Actor(edge.actor)),
            };
            adjacency.entry(from).or_default().push(to);
        }

        let mut finished = BTreeSet::new();
        let mut path = Vec::new();
        let starts: Vec<Node> = adjacency.keys().copied().collect();
        for start in starts {
            if !finished.contains(&start) {
                if let Some(cycle) = visit(start, &adjacency, &mut path, &mut finished) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

fn visit(
    node: Node,
    adjacency: &BTreeMap<Node, Vec<Node>>,
    path: &mut Vec<Node>,
    finished: &mut BTreeSet<Node>,
) -> Option<Vec<Node>> {
    if let Some(pos) = path.iter().position(|&n| n == node) {
        return Some(path[pos..].to_vec());
    }
    if finished.contains(&node) {
        return None;
    }
    path.push(node);
    for &next in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
        if let Some(cycle) = visit(next, adjacency, path, finished) {
            return Some(cycle);
        }
    }
    path.pop();
    finished.insert(node);
    None
}

#[derive(Default)]
pub struct ResourceGraph {
    inner: Mutex<GraphSnapshot>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.lock().clone()
    }

    pub fn find_cycle(&self) -> Option<Vec<Node>> {
        self.inner.lock().find_cycle()
    }
}

impl StateSink for ResourceGraph {
    fn on_resource_level_changed(&self, resource: ResourceId, value: u32) {
        self.inner.lock().resources.insert(resource, Some(value));
    }

    fn on_actor_state_changed(&self, actor: ActorId, state: ActorState) {
        self.inner.lock().actors.insert(actor, Some(state));
    }

    fn on_actor_arrived(&self, actor: ActorId) {
        self.inner.lock().actors.entry(actor).or_insert(None);
    }

    fn on_actor_departed(&self, actor: ActorId) {
        let mut graph = self.inner.lock();
        graph.actors.remove(&actor);
        graph.edges.retain(|e| e.actor != actor);
    }

    fn on_request_edge(&self, actor: ActorId, resource: ResourceId) {
        let mut graph = self.inner.lock();
        graph.actors.entry(actor).or_insert(None);
        graph.resources.entry(resource).or_insert(None);
        graph.edges.insert(Edge {
            actor,
            resource,
            kind: EdgeKind::Request,
        });
    }

    fn on_grant_edge(&self, resource: ResourceId, actor: ActorId) {
        let mut graph = self.inner.lock();
        graph.actors.entry(actor).or_insert(None);
        graph.resources.entry(resource).or_insert(None);
        graph.edges.remove(&Edge {
            actor,
            resource,
            kind: EdgeKind::Request,
        });
        graph.edges.insert(Edge {
            actor,
            resource,
            kind: EdgeKind::Grant,
        });
    }

    fn on_edge_cleared(&self, actor: ActorId, resource: ResourceId) {
        self.inner
            .lock()
            .edges
            .retain(|e| !(e.actor == actor && e.resource == resource));
    }

    fn on_invariant_violation(&self, problem: ProblemKind, detail: &str) {
        self.inner
            .lock()
            .violations
            .push((problem, detail.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ring(graph: &ResourceGraph, n: usize, close: bool) {
        for i in 0..n {
            graph.on_grant_edge(ResourceId::Fork(i), ActorId::Philosopher(i));
            if close || i + 1 < n {
                graph.on_request_edge(ActorId::Philosopher(i), ResourceId::Fork((i + 1) % n));
            }
        }
    }

    #[test]
    fn grant_replaces_request() {
        let graph = ResourceGraph::new();
        graph.on_request_edge(ActorId::Reader(1), ResourceId::Blackboard);
        graph.on_grant_edge(ResourceId::Blackboard, ActorId::Reader(1));
        let snap = graph.snapshot();
        assert_eq!(snap.holders(ResourceId::Blackboard), vec![ActorId::Reader(1)]);
        assert!(snap.requests_of(ActorId::Reader(1)).is_empty());

        graph.on_edge_cleared(ActorId::Reader(1), ResourceId::Blackboard);
        assert!(graph.snapshot().edges.is_empty());
    }

    #[test]
    fn departure_drops_node_and_edges() {
        let graph = ResourceGraph::new();
        graph.on_actor_arrived(ActorId::Drone(3));
        graph.on_actor_state_changed(ActorId::Drone(3), ActorState::Flying);
        graph.on_request_edge(ActorId::Drone(3), ResourceId::Bays);
        assert_eq!(graph.snapshot().state_of(ActorId::Drone(3)), Some(ActorState::Flying));
        graph.on_actor_departed(ActorId::Drone(3));
        let snap = graph.snapshot();
        assert!(snap.actors.is_empty());
        assert!(snap.edges.is_empty());
    }

    #[test]
    fn closed_fork_ring_is_a_cycle() {
        let graph = ResourceGraph::new();
        ring(&graph, 5, true);
        let cycle = graph.find_cycle().expect("deadlock ring");
        assert_eq!(cycle.len(), 10);
    }

    #[test]
    fn open_fork_chain_is_not_a_cycle() {
        let graph = ResourceGraph::new();
        ring(&graph, 5, false);
        assert!(graph.find_cycle().is_none());
    }

    proptest! {
        #[test]
        fn reported_cycles_follow_real_edges(
            edges in proptest::collection::vec((0usize..6, 0usize..6, any::<bool>()), 0..24)
        ) {
            let graph = ResourceGraph::new();
            for (actor, fork, grant) in edges {
                if grant {
                    graph.on_grant_edge(ResourceId::Fork(fork), ActorId::Philosopher(actor));
                } else {
                    graph.on_request_edge(ActorId::Philosopher(actor), ResourceId::Fork(fork));
                }
            }
            let snap = graph.snapshot();
            if let Some(cycle) = snap.find_cycle() {
                prop_assert!(cycle.len() >= 2);
                for i in 0..cycle.len() {
                    let from = cycle[i];
                    let to = cycle[(i + 1) % cycle.len()];
                    let present = match (from, to) {
                        (Node::Actor(a), Node::Resource(r)) => snap.edges.contains(&Edge { actor: a, resource: r, kind: EdgeKind::Request }),
                        (Node::Resource(r), Node::Actor(a)) => snap.edges.contains(&Edge { actor: a, resource: r, kind: EdgeKind::Grant }),
                        _ => false,
                    };
                    prop_assert!(present);
                }
            }
        }
    }
}
