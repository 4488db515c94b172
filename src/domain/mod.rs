// Core provenance model: events in, relation indices, target, graph out.

pub mod event;
pub mod provenance;
pub mod recorder;
pub mod relation;
pub mod span;
pub mod target;
