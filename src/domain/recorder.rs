//! Relation recording.
//!
//! [`RelationRecorder`] is the write phase of a query: it consumes analysis
//! events, interns the code units they mention, maintains the three relation
//! indices and feeds the target resolver. [`RelationRecorder::freeze`] ends
//! the write phase; everything after works on the frozen
//! [`RecordedRelations`].

use crate::domain::event::{AnalysisEvent, CodeRef};
use crate::domain::relation::{CodeNode, NodeId, NodeTable, RelationIndex, RelationKind, Relations};
use crate::domain::target::{TargetQuery, TargetResolver};
use crate::ports::EventSink;

pub struct RelationRecorder {
    nodes: NodeTable,
    relations: Relations,
    resolver: TargetResolver,
    ignored: usize,
}

impl RelationRecorder {
    pub fn new(query: TargetQuery) -> Self {
        Self {
            nodes: NodeTable::default(),
            relations: Relations::default(),
            resolver: TargetResolver::new(query),
            ignored: 0,
        }
    }

    pub fn record(&mut self, event: &AnalysisEvent) {
        match event {
            AnalysisEvent::Definition { function, parent } => {
                self.on_definition(function, parent.as_ref())
            }
            AnalysisEvent::Call { from, to } => self.on_call(from, to),
            AnalysisEvent::IndirectCall { from, to } => self.on_indirect_call(from, to),
        }
    }

    /// `function` is nested inside `parent`. Top-level definitions carry no
    /// relation and are dropped.
    pub fn on_definition(&mut self, function: &CodeRef, parent: Option<&CodeRef>) {
        let Some(parent) = parent else {
            return;
        };
        let (Some(parent_id), Some(fn_id)) = (self.nodes.intern(parent), self.nodes.intern(function))
        else {
            self.ignored += 1;
            return;
        };
        self.relations
            .get_mut(RelationKind::Definition)
            .insert(parent_id, fn_id);
    }

    pub fn on_call(&mut self, from: &CodeRef, to: &CodeRef) {
        self.link(RelationKind::Call, from, to);
    }

    pub fn on_indirect_call(&mut self, from: &CodeRef, to: &CodeRef) {
        self.link(RelationKind::IndirectCall, from, to);
    }

    fn link(&mut self, kind: RelationKind, from: &CodeRef, to: &CodeRef) {
        let (Some(lhs), Some(rhs)) = (self.nodes.intern(from), self.nodes.intern(to)) else {
            log::debug!("ignoring {} event with an empty unit key", kind);
            self.ignored += 1;
            return;
        };

        self.resolver
            .submit_candidate(from.filename.as_deref(), from.span.as_ref(), lhs);
        self.resolver
            .submit_candidate(to.filename.as_deref(), to.span.as_ref(), rhs);

        if self.relations.get_mut(kind).insert(lhs, rhs) {
            log::debug!("{} {} -> {}", kind, from.canonical(), to.canonical());
        }
    }

    /// End the write phase.
    pub fn freeze(self) -> RecordedRelations {
        log::info!(
            "recorded {} units: {} calls, {} ioc, {} definitions ({} events ignored)",
            self.nodes.len(),
            self.relations.get(RelationKind::Call).edge_count(),
            self.relations.get(RelationKind::IndirectCall).edge_count(),
            self.relations.get(RelationKind::Definition).edge_count(),
            self.ignored,
        );
        RecordedRelations {
            nodes: self.nodes,
            relations: self.relations,
            resolver: self.resolver,
        }
    }
}

impl EventSink for RelationRecorder {
    fn handle(&mut self, event: AnalysisEvent) {
        self.record(&event);
    }
}

/// Read-only snapshot of one query's recorded data.
pub struct RecordedRelations {
    nodes: NodeTable,
    relations: Relations,
    resolver: TargetResolver,
}

impl RecordedRelations {
    pub fn query(&self) -> &TargetQuery {
        self.resolver.query()
    }

    pub fn resolve_target(&self) -> Option<NodeId> {
        self.resolver.resolve()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&CodeNode> {
        self.nodes.get(id)
    }

    pub fn relation(&self, kind: RelationKind) -> &RelationIndex {
        self.relations.get(kind)
    }
}
