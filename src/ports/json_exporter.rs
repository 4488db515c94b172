//! JSON exporter for provenance graphs.

use crate::domain::provenance::ProvenanceGraph;
use crate::ports::GraphExporter;
use std::io::{Result, Write};

pub struct JsonExporter;

impl GraphExporter for JsonExporter {
    fn export(&self, graph: &ProvenanceGraph, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, graph)?;
        out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provenance::{ProvenanceEdge, ProvenanceNode, RenderId};
    use crate::domain::relation::RelationKind;
    use crate::domain::span::{Position, SourceSpan};

    #[test]
    fn test_json_shape() {
        let graph = ProvenanceGraph {
            target: RenderId(1),
            nodes: vec![
                ProvenanceNode {
                    id: RenderId(0),
                    label: "app.main".to_string(),
                    highlighted: false,
                    filename: Some("/src/main.rs".to_string()),
                    span: Some(SourceSpan::new(Position::new(1, 1), Position::new(3, 2))),
                },
                ProvenanceNode {
                    id: RenderId(1),
                    label: "app.run".to_string(),
                    highlighted: true,
                    filename: None,
                    span: None,
                },
            ],
            edges: vec![ProvenanceEdge {
                from: RenderId(0),
                to: RenderId(1),
                kind: RelationKind::IndirectCall,
            }],
        };

        let mut buf = Vec::new();
        JsonExporter.export(&graph, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["target"], 1);
        assert_eq!(value["nodes"][0]["filename"], "/src/main.rs");
        assert_eq!(value["nodes"][0]["span"]["start"]["line"], 1);
        assert!(value["nodes"][1].get("filename").is_none());
        assert_eq!(value["nodes"][1]["highlighted"], true);
        assert_eq!(value["edges"][0]["kind"], "indirect_call");
    }
}
