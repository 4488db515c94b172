// Relation storage for provenance queries.
// Code units are interned into a node table; relations are forward/backward
// adjacency sets keyed by the interned id.

use crate::domain::event::{CodeRef, UnitKey};
use crate::domain::span::SourceSpan;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The three relation kinds, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Call,
    IndirectCall,
    Definition,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Call,
        RelationKind::IndirectCall,
        RelationKind::Definition,
    ];

    pub fn index(self) -> usize {
        match self {
            RelationKind::Call => 0,
            RelationKind::IndirectCall => 1,
            RelationKind::Definition => 2,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::Call => "call",
            RelationKind::IndirectCall => "ioc",
            RelationKind::Definition => "defs",
        })
    }
}

/// Interned code unit id, dense and in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Attributes of a code unit, fixed when it is first seen. The one exception
/// is a raw-name label, which is replaced once by the first alias path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeNode {
    pub key: UnitKey,
    pub name: String,
    pub filename: Option<String>,
    pub span: Option<SourceSpan>,
}

pub const ANONYMOUS: &str = "(anonymous)";

fn has_alias(code_ref: &CodeRef) -> bool {
    code_ref.tracked_name.as_ref().is_some_and(|p| !p.is_empty())
}

/// Lookup table from unit identity to its immutable record.
#[derive(Debug, Default)]
pub struct NodeTable {
    ids: HashMap<UnitKey, NodeId>,
    nodes: Vec<CodeNode>,
    /// Whether each label came from an alias path.
    aliased: Vec<bool>,
}

impl NodeTable {
    /// Intern the canonical unit behind `code_ref`.
    /// Returns `None` for a reference with an empty identity.
    pub fn intern(&mut self, code_ref: &CodeRef) -> Option<NodeId> {
        let key = code_ref.canonical();
        if key.is_empty() {
            return None;
        }
        if let Some(&id) = self.ids.get(key) {
            self.upgrade_label(id, code_ref);
            return Some(id);
        }
        let id = NodeId(u32::try_from(self.nodes.len()).ok()?);
        self.nodes.push(CodeNode {
            key: key.clone(),
            name: code_ref
                .display_name()
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            filename: code_ref.filename.clone(),
            span: code_ref.span,
        });
        self.aliased.push(has_alias(code_ref));
        self.ids.insert(key.clone(), id);
        Some(id)
    }

    fn upgrade_label(&mut self, id: NodeId, code_ref: &CodeRef) {
        if self.aliased[id.index()] || !has_alias(code_ref) {
            return;
        }
        if let Some(name) = code_ref.display_name() {
            self.nodes[id.index()].name = name;
            self.aliased[id.index()] = true;
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&CodeNode> {
        self.nodes.get(id.index())
    }

    pub fn lookup(&self, key: &UnitKey) -> Option<NodeId> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One relation kind stored in both directions.
#[derive(Debug, Default)]
pub struct RelationIndex {
    forward: HashMap<NodeId, BTreeSet<NodeId>>,
    backward: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl RelationIndex {
    /// Record `from -> to`. Returns false if the edge was already present.
    pub fn insert(&mut self, from: NodeId, to: NodeId) -> bool {
        let added = self.forward.entry(from).or_default().insert(to);
        self.backward.entry(to).or_default().insert(from);
        added
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.forward.get(&node).into_iter().flatten().copied()
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.backward.get(&node).into_iter().flatten().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }
}

/// The three relation indices of one query.
#[derive(Debug, Default)]
pub struct Relations {
    indices: [RelationIndex; 3],
}

impl Relations {
    pub fn get(&self, kind: RelationKind) -> &RelationIndex {
        &self.indices[kind.index()]
    }

    pub fn get_mut(&mut self, kind: RelationKind) -> &mut RelationIndex {
        &mut self.indices[kind.index()]
    }
}
