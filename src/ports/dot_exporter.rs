//! Provenance DOT Exporter
//!
//! Renders a ProvenanceGraph as a Graphviz `digraph`.

use crate::domain::provenance::{ProvenanceEdge, ProvenanceGraph, ProvenanceNode, RenderId};
use crate::domain::relation::RelationKind;
use crate::ports::GraphExporter;
use std::io::{Result, Write};

pub struct DotExporter;

impl DotExporter {
    /// Convert a ProvenanceGraph to a DOT document.
    pub fn to_dot(graph: &ProvenanceGraph) -> String {
        let mut statements = Vec::with_capacity(graph.nodes.len() + graph.edges.len());

        // Declarations first, then edges
        statements.extend(graph.nodes.iter().map(Self::node_statement));
        statements.extend(graph.edges.iter().map(Self::edge_statement));

        format!("digraph {{ {}; }}\n", statements.join(";\n"))
    }

    fn node_statement(node: &ProvenanceNode) -> String {
        let fill = if node.highlighted {
            ", fillcolor=\"lightgreen\""
        } else {
            ""
        };
        format!(
            "{} [label=\"{}\"{}]",
            Self::node_name(node.id),
            Self::escape_label(&node.label),
            fill
        )
    }

    fn edge_statement(edge: &ProvenanceEdge) -> String {
        format!(
            "{} -> {} [{}]",
            Self::node_name(edge.from),
            Self::node_name(edge.to),
            Self::edge_style(edge.kind)
        )
    }

    fn node_name(id: RenderId) -> String {
        format!("A{}", id.0)
    }

    fn edge_style(kind: RelationKind) -> &'static str {
        match kind {
            RelationKind::Call => "color=\"black\"",
            RelationKind::IndirectCall => "color=\"grey\" style=\"dashed\" label=\"ioc\"",
            RelationKind::Definition => "color=\"lightgrey\" style=\"dotted\" label=\"defs\"",
        }
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

impl GraphExporter for DotExporter {
    fn export(&self, graph: &ProvenanceGraph, out: &mut dyn Write) -> Result<()> {
        out.write_all(Self::to_dot(graph).as_bytes())
    }
}
