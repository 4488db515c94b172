/// Target resolution.
///
/// Collects every reported span that encloses the query position in the
/// query file, then picks the innermost one.

use crate::domain::relation::NodeId;
use crate::domain::span::{Position, SourceSpan};
use std::cmp::Ordering;

/// The cursor a provenance query is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetQuery {
    /// Project-relative filename, in the analyzer's filename format.
    pub file: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
struct Candidate {
    node: NodeId,
    start: Position,
    end: Position,
}

#[derive(Debug)]
pub struct TargetResolver {
    query: TargetQuery,
    candidates: Vec<Candidate>,
}

impl TargetResolver {
    pub fn new(query: TargetQuery) -> Self {
        Self {
            query,
            candidates: Vec::new(),
        }
    }

    pub fn query(&self) -> &TargetQuery {
        &self.query
    }

    /// Record `node` as a candidate if its span encloses the query position.
    pub fn submit_candidate(
        &mut self,
        filename: Option<&str>,
        span: Option<&SourceSpan>,
        node: NodeId,
    ) -> bool {
        let (Some(filename), Some((start, end))) = (filename, span.and_then(SourceSpan::bounds))
        else {
            return false;
        };
        if filename != self.query.file {
            return false;
        }
        let pos = self.query.position;
        if start > pos || end < pos {
            return false;
        }
        log::debug!("target candidate {:?} at {}-{}", node, start, end);
        self.candidates.push(Candidate { node, start, end });
        true
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// The innermost candidate.
    ///
    /// Candidates whose start lies closest to the query position win. Among
    /// candidates sharing a start, the one ending first wins; remaining ties
    /// go to the earliest submission.
    pub fn resolve(&self) -> Option<NodeId> {
        self.candidates
            .iter()
            .min_by(|a, b| self.rank(a, b))
            .map(|c| c.node)
    }

    fn rank(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let origin = self.query.position;
        b.start
            .offset_from(origin)
            .cmp(&a.start.offset_from(origin))
            .then_with(|| a.end.cmp(&b.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::CodeRef;
    use crate::domain::relation::NodeTable;

    fn span(sl: u32, sc: u32, el: u32, ec: u32) -> SourceSpan {
        SourceSpan::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn resolver(line: u32, column: u32) -> TargetResolver {
        TargetResolver::new(TargetQuery {
            file: "/src/lib.rs".to_string(),
            position: Position::new(line, column),
        })
    }

    fn ids(n: usize) -> Vec<NodeId> {
        let mut table = NodeTable::default();
        (0..n)
            .map(|i| table.intern(&CodeRef::new(format!("n{}", i))).unwrap())
            .collect()
    }

    #[test]
    fn test_innermost_span_wins() {
        let n = ids(2);
        let mut r = resolver(5, 1);
        assert!(r.submit_candidate(Some("/src/lib.rs"), Some(&span(1, 1, 10, 1)), n[0]));
        assert!(r.submit_candidate(Some("/src/lib.rs"), Some(&span(3, 1, 7, 1)), n[1]));
        assert_eq!(r.resolve(), Some(n[1]));
    }

    #[test]
    fn test_column_breaks_line_ties() {
        let n = ids(2);
        let mut r = resolver(3, 20);
        r.submit_candidate(Some("/src/lib.rs"), Some(&span(3, 12, 3, 40)), n[0]);
        r.submit_candidate(Some("/src/lib.rs"), Some(&span(3, 4, 3, 50)), n[1]);
        assert_eq!(r.resolve(), Some(n[0]));
    }

    #[test]
    fn test_same_start_prefers_smaller_extent() {
        let n = ids(3);
        let mut r = resolver(4, 1);
        r.submit_candidate(Some("/src/lib.rs"), Some(&span(2, 1, 9, 1)), n[0]);
        r.submit_candidate(Some("/src/lib.rs"), Some(&span(2, 1, 5, 1)), n[1]);
        r.submit_candidate(Some("/src/lib.rs"), Some(&span(2, 1, 5, 1)), n[2]);
        assert_eq!(r.resolve(), Some(n[1]));
    }

    #[test]
    fn test_rejects_other_files_and_incomplete_spans() {
        let n = ids(1);
        let mut r = resolver(5, 1);
        assert!(!r.submit_candidate(Some("/src/main.rs"), Some(&span(1, 1, 10, 1)), n[0]));
        assert!(!r.submit_candidate(None, Some(&span(1, 1, 10, 1)), n[0]));
        let open = SourceSpan {
            start: Some(Position::new(1, 1)),
            end: None,
        };
        assert!(!r.submit_candidate(Some("/src/lib.rs"), Some(&open), n[0]));
        assert!(!r.submit_candidate(Some("/src/lib.rs"), None, n[0]));
        assert_eq!(r.candidate_count(), 0);
        assert_eq!(r.resolve(), None);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let n = ids(2);
        let mut r = resolver(3, 9);
        assert!(r.submit_candidate(Some("/src/lib.rs"), Some(&span(3, 9, 4, 1)), n[0]));
        assert!(r.submit_candidate(Some("/src/lib.rs"), Some(&span(1, 1, 3, 9)), n[1]));
        assert!(!r.submit_candidate(Some("/src/lib.rs"), Some(&span(3, 10, 4, 1)), n[0]));
        assert!(!r.submit_candidate(Some("/src/lib.rs"), Some(&span(1, 1, 3, 8)), n[1]));
    }
}
