//! Provenance graph construction.
//!
//! Walks the backward relation indices from the resolved target and collects
//! every ancestor reachable through `called-by`, `ioc-by` and `defined-by`
//! edges. Each relation kind keeps its own visited set for the whole walk, so
//! a unit reached once through a call can still be reached through a
//! definition, and cycles terminate.

use crate::domain::recorder::RecordedRelations;
use crate::domain::relation::{NodeId, RelationKind, ANONYMOUS};
use crate::domain::span::SourceSpan;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Render-time node id. Assigned in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RenderId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceNode {
    pub id: RenderId,
    pub label: String,
    /// Set exactly for the query target.
    pub highlighted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProvenanceEdge {
    pub from: RenderId,
    pub to: RenderId,
    pub kind: RelationKind,
}

/// Node declarations (ordered by id) and edge statements (in walk order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceGraph {
    pub target: RenderId,
    pub nodes: Vec<ProvenanceNode>,
    pub edges: Vec<ProvenanceEdge>,
}

impl ProvenanceGraph {
    pub fn node(&self, id: RenderId) -> Option<&ProvenanceNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of(&self, kind: RelationKind) -> impl Iterator<Item = &ProvenanceEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}

/// One pending expansion on the walk stack.
struct Frame {
    node: NodeId,
    kind: usize,
    neighbors: Vec<NodeId>,
    cursor: usize,
}

pub struct ProvenanceBuilder<'a> {
    recorded: &'a RecordedRelations,
    render_ids: HashMap<NodeId, RenderId>,
    order: Vec<NodeId>,
    visited: [HashSet<NodeId>; 3],
    edges: Vec<ProvenanceEdge>,
}

impl<'a> ProvenanceBuilder<'a> {
    pub fn new(recorded: &'a RecordedRelations) -> Self {
        Self {
            recorded,
            render_ids: HashMap::new(),
            order: Vec::new(),
            visited: Default::default(),
            edges: Vec::new(),
        }
    }

    /// Build the provenance graph rooted at `target`.
    pub fn build(mut self, target: NodeId) -> ProvenanceGraph {
        self.walk(target);
        let target_id = self.render_id(target);

        let nodes = self
            .order
            .iter()
            .map(|&node| {
                let record = self.recorded.node(node);
                ProvenanceNode {
                    id: self.render_ids[&node],
                    label: record
                        .map(|r| r.name.clone())
                        .unwrap_or_else(|| ANONYMOUS.to_string()),
                    highlighted: node == target,
                    filename: record.and_then(|r| r.filename.clone()),
                    span: record.and_then(|r| r.span),
                }
            })
            .collect::<Vec<_>>();

        log::info!(
            "provenance graph: {} nodes, {} edges",
            nodes.len(),
            self.edges.len()
        );
        ProvenanceGraph {
            target: target_id,
            nodes,
            edges: self.edges,
        }
    }

    // Depth-first, in the same order a recursive visit would take: for each
    // kind in turn, each unvisited predecessor is linked and fully expanded
    // before the next one is looked at.
    fn walk(&mut self, target: NodeId) {
        let mut stack = vec![self.frame(target)];

        while let Some(frame) = stack.last_mut() {
            if frame.cursor == frame.neighbors.len() {
                frame.kind += 1;
                if frame.kind == RelationKind::ALL.len() {
                    stack.pop();
                } else {
                    frame.neighbors = self.predecessors(frame.node, frame.kind);
                    frame.cursor = 0;
                }
                continue;
            }

            let neighbor = frame.neighbors[frame.cursor];
            frame.cursor += 1;
            let current = frame.node;
            let kind = frame.kind;

            if !self.visited[kind].insert(neighbor) {
                continue;
            }
            let from = self.render_id(neighbor);
            let to = self.render_id(current);
            self.edges.push(ProvenanceEdge {
                from,
                to,
                kind: RelationKind::ALL[kind],
            });
            stack.push(self.frame(neighbor));
        }
    }

    fn frame(&self, node: NodeId) -> Frame {
        Frame {
            node,
            kind: 0,
            neighbors: self.predecessors(node, 0),
            cursor: 0,
        }
    }

    fn predecessors(&self, node: NodeId, kind: usize) -> Vec<NodeId> {
        self.recorded
            .relation(RelationKind::ALL[kind])
            .predecessors(node)
            .collect()
    }

    fn render_id(&mut self, node: NodeId) -> RenderId {
        if let Some(&id) = self.render_ids.get(&node) {
            return id;
        }
        let id = RenderId(self.order.len() as u32);
        self.render_ids.insert(node, id);
        self.order.push(node);
        id
    }
}
