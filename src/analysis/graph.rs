//! Signal -> effect dependency graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::snapshot::{EntityId, Snapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
    #[default]
    Both,
}

impl Direction {
    fn includes_upstream(self) -> bool {
        matches!(self, Direction::Upstream | Direction::Both)
    }

    fn includes_downstream(self) -> bool {
        matches!(self, Direction::Downstream | Direction::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Signal(EntityId),
    Effect(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Signal,
    Effect,
}

type NodeKey = (NodeKind, EntityId);

fn key_label((kind, id): NodeKey) -> String {
    match kind {
        NodeKind::Signal => format!("signal:{}", id),
        NodeKind::Effect => format!("effect:{}", id),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub entity_id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: GraphSummary,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Signal {0} not found")]
    UnknownSignal(EntityId),
    #[error("Effect {0} not found")]
    UnknownEffect(EntityId),
}

/// Build the dependency graph, optionally narrowed to one hop around a focal node.
///
/// A signal has no upstream in this graph and an effect has no downstream, so for example
/// `Focus::Signal(x)` with [`Direction::Downstream`] yields exactly the edges from `x` to the
/// effects that read it.
pub fn build_dependency_graph(
    snapshot: &Snapshot,
    focus: Option<Focus>,
    direction: Direction,
) -> Result<DependencyGraph, GraphError> {
    let mut edges: Vec<(EntityId, EntityId)> = Vec::new();
    let mut seen = HashSet::new();
    for effect in &snapshot.effects {
        for &signal in &effect.dependency_signal_ids {
            if seen.insert((signal, effect.id)) {
                edges.push((signal, effect.id));
            }
        }
    }

    let mut nodes: Vec<NodeKey> = snapshot
        .signals
        .iter()
        .map(|s| (NodeKind::Signal, s.id))
        .chain(snapshot.effects.iter().map(|e| (NodeKind::Effect, e.id)))
        .collect();
    // Dependencies on signals missing from the snapshot still get a node.
    let known: HashSet<NodeKey> = nodes.iter().copied().collect();
    for &(signal, _) in &edges {
        let key = (NodeKind::Signal, signal);
        if !known.contains(&key) && !nodes.contains(&key) {
            nodes.push(key);
        }
    }

    if let Some(focus) = focus {
        let closure = one_hop_closure(snapshot, &edges, focus, direction)?;
        nodes.retain(|key| closure.contains(key));
        edges.retain(|&(signal, effect)| {
            closure.contains(&(NodeKind::Signal, signal))
                && closure.contains(&(NodeKind::Effect, effect))
        });
    }

    let signals: HashMap<EntityId, _> = snapshot.signals.iter().map(|s| (s.id, s)).collect();
    let effects: HashMap<EntityId, _> = snapshot.effects.iter().map(|e| (e.id, e)).collect();
    let graph_nodes: Vec<GraphNode> = nodes
        .into_iter()
        .map(|key| match key.0 {
            NodeKind::Signal => {
                let signal = signals.get(&key.1);
                GraphNode {
                    id: key_label(key),
                    kind: key.0,
                    entity_id: key.1,
                    name: signal.map_or_else(|| "(unknown)".to_string(), |s| s.name.clone()),
                    value: signal.map(|s| s.value.clone()),
                    run_count: None,
                }
            }
            NodeKind::Effect => {
                let effect = effects.get(&key.1);
                GraphNode {
                    id: key_label(key),
                    kind: key.0,
                    entity_id: key.1,
                    name: effect.map_or_else(String::new, |e| e.name.clone()),
                    value: None,
                    run_count: effect.map(|e| e.run_count),
                }
            }
        })
        .collect();

    let graph_edges: Vec<GraphEdge> = edges
        .into_iter()
        .map(|(signal, effect)| GraphEdge {
            from: key_label((NodeKind::Signal, signal)),
            to: key_label((NodeKind::Effect, effect)),
        })
        .collect();

    Ok(DependencyGraph {
        summary: GraphSummary {
            node_count: graph_nodes.len(),
            edge_count: graph_edges.len(),
            focus: focus.map(|f| match f {
                Focus::Signal(id) => key_label((NodeKind::Signal, id)),
                Focus::Effect(id) => key_label((NodeKind::Effect, id)),
            }),
            direction: focus.map(|_| direction),
        },
        nodes: graph_nodes,
        edges: graph_edges,
    })
}

fn one_hop_closure(
    snapshot: &Snapshot,
    edges: &[(EntityId, EntityId)],
    focus: Focus,
    direction: Direction,
) -> Result<HashSet<NodeKey>, GraphError> {
    let mut closure = HashSet::new();
    match focus {
        Focus::Signal(id) => {
            if snapshot.signal(id).is_none() {
                return Err(GraphError::UnknownSignal(id));
            }
            closure.insert((NodeKind::Signal, id));
            if direction.includes_downstream() {
                for &(signal, effect) in edges {
                    if signal == id {
                        closure.insert((NodeKind::Effect, effect));
                    }
                }
            }
        }
        Focus::Effect(id) => {
            if snapshot.effect(id).is_none() {
                return Err(GraphError::UnknownEffect(id));
            }
            closure.insert((NodeKind::Effect, id));
            if direction.includes_upstream() {
                for &(signal, effect) in edges {
                    if effect == id {
                        closure.insert((NodeKind::Signal, signal));
                    }
                }
            }
        }
    }
    Ok(closure)
}
