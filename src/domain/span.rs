/// Source positions and spans.
///
/// Lines and columns are one-based. Positions order line first, then column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A one-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Signed (line, column) distance of `self` from `origin`.
    pub fn offset_from(&self, origin: Position) -> (i64, i64) {
        (
            i64::from(self.line) - i64::from(origin.line),
            i64::from(self.column) - i64::from(origin.column),
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span as reported by an analyzer. Either end may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: Option<Position>,
    pub end: Option<Position>,
}

impl SourceSpan {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Both ends, if the span is complete.
    pub fn bounds(&self) -> Option<(Position, Position)> {
        Some((self.start?, self.end?))
    }

    /// Inclusive containment test. Incomplete spans contain nothing.
    pub fn contains(&self, pos: Position) -> bool {
        match self.bounds() {
            Some((start, end)) => start <= pos && pos <= end,
            None => false,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            Some((start, end)) => write!(f, "{}-{}", start, end),
            None => write!(f, "?"),
        }
    }
}
