//! Analysis events.
//!
//! An analyzer describes a project as a stream of these events. Each side of
//! an event is a [`CodeRef`]: a surface reference to a code unit, optionally
//! wrapping the canonical unit it annotates.

use crate::domain::span::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Analyzer-assigned identity of a code unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey(String);

impl UnitKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of an analysis event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    /// Identity of the reference itself.
    pub key: UnitKey,
    /// Canonical code unit this reference wraps, if any.
    pub code: Option<UnitKey>,
    /// Raw identifier.
    pub name: Option<String>,
    /// Resolved alias path ("tracked name"), outermost segment first.
    pub tracked_name: Option<Vec<String>>,
    /// Project-relative filename (`/src/lib.rs`).
    pub filename: Option<String>,
    pub span: Option<SourceSpan>,
}

impl CodeRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: UnitKey::new(key),
            code: None,
            name: None,
            tracked_name: None,
            filename: None,
            span: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tracked<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.tracked_name = Some(path.into_iter().map(Into::into).collect());
        self
    }

    pub fn wrapping(mut self, code: impl Into<String>) -> Self {
        self.code = Some(UnitKey::new(code));
        self
    }

    pub fn located(mut self, filename: impl Into<String>, span: SourceSpan) -> Self {
        self.filename = Some(filename.into());
        self.span = Some(span);
        self
    }

    /// The underlying code unit: the wrapped unit when present.
    pub fn canonical(&self) -> &UnitKey {
        self.code.as_ref().unwrap_or(&self.key)
    }

    /// Display label: the alias path joined with `.`, else the raw name.
    pub fn display_name(&self) -> Option<String> {
        match &self.tracked_name {
            Some(path) if !path.is_empty() => Some(path.join(".")),
            _ => self.name.clone(),
        }
    }
}

/// Events emitted by a [`SourceAnalyzer`](crate::ports::SourceAnalyzer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisEvent {
    /// `function` is textually defined inside `parent`.
    Definition {
        function: CodeRef,
        parent: Option<CodeRef>,
    },
    /// `from` invokes `to` directly.
    Call { from: CodeRef, to: CodeRef },
    /// `from` hands `to` to something else that invokes it.
    IndirectCall { from: CodeRef, to: CodeRef },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_unwraps_wrapper() {
        let plain = CodeRef::new("fn@1");
        assert_eq!(plain.canonical().as_str(), "fn@1");

        let wrapped = CodeRef::new("sig@1").wrapping("body@1");
        assert_eq!(wrapped.canonical().as_str(), "body@1");
    }

    #[test]
    fn test_display_name_prefers_tracked_path() {
        let r = CodeRef::new("k").named("p").tracked(["app", "parser", "parse"]);
        assert_eq!(r.display_name().as_deref(), Some("app.parser.parse"));

        let r = CodeRef::new("k").named("p");
        assert_eq!(r.display_name().as_deref(), Some("p"));

        let empty: [&str; 0] = [];
        let r = CodeRef::new("k").named("p").tracked(empty);
        assert_eq!(r.display_name().as_deref(), Some("p"));
    }
}
