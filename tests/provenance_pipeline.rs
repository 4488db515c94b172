// Pipeline tests: scripted analysis events through record, resolve, walk
// and render.

use provenance::application::{ProvenanceUsecase, Query};
use provenance::domain::event::{AnalysisEvent, CodeRef};
use provenance::domain::provenance::ProvenanceGraph;
use provenance::domain::relation::RelationKind;
use provenance::domain::span::{Position, SourceSpan};
use provenance::ports::dot_exporter::DotExporter;
use provenance::ports::{EventSink, RootLocator, SourceAnalyzer};
use provenance::{AnalyzerError, ProvenanceError};
use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

const ROOT: &str = "/provenance-test-root";
const LIB: &str = "/src/lib.rs";

struct FixedRoot;

impl RootLocator for FixedRoot {
    fn locate(&self, _file: &Path) -> Result<PathBuf, ProvenanceError> {
        Ok(PathBuf::from(ROOT))
    }
}

struct NoRoot;

impl RootLocator for NoRoot {
    fn locate(&self, file: &Path) -> Result<PathBuf, ProvenanceError> {
        Err(ProvenanceError::RootNotFound {
            file: file.to_path_buf(),
            manifest: "Cargo.toml".to_string(),
        })
    }
}

/// Replays a fixed event list, optionally failing at the end.
struct ScriptedAnalyzer {
    events: Vec<AnalysisEvent>,
    failure: Option<String>,
    runs: Cell<usize>,
}

impl ScriptedAnalyzer {
    fn new(events: Vec<AnalysisEvent>) -> Self {
        Self {
            events,
            failure: None,
            runs: Cell::new(0),
        }
    }
}

impl SourceAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, _root: &Path, sink: &mut dyn EventSink) -> Result<(), AnalyzerError> {
        self.runs.set(self.runs.get() + 1);
        for event in &self.events {
            sink.handle(event.clone());
        }
        match &self.failure {
            Some(reason) => Err(AnalyzerError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }
}

fn unit(name: &str, start: u32, end: u32) -> CodeRef {
    CodeRef::new(format!("{}:{}", LIB, name))
        .named(name)
        .located(LIB, SourceSpan::new(Position::new(start, 1), Position::new(end, 1)))
}

fn call(from: &CodeRef, to: &CodeRef) -> AnalysisEvent {
    AnalysisEvent::Call {
        from: from.clone(),
        to: to.clone(),
    }
}

fn ioc(from: &CodeRef, to: &CodeRef) -> AnalysisEvent {
    AnalysisEvent::IndirectCall {
        from: from.clone(),
        to: to.clone(),
    }
}

fn defines(parent: &CodeRef, function: &CodeRef) -> AnalysisEvent {
    AnalysisEvent::Definition {
        function: function.clone(),
        parent: Some(parent.clone()),
    }
}

fn query(line: u32) -> Query {
    Query::new(format!("{}{}", ROOT, LIB), line, 1)
}

fn trace(events: Vec<AnalysisEvent>, line: u32) -> Result<ProvenanceGraph, ProvenanceError> {
    let analyzer = ScriptedAnalyzer::new(events);
    let usecase = ProvenanceUsecase {
        locator: &FixedRoot,
        analyzer: &analyzer,
        exporter: &DotExporter,
    };
    usecase.trace(&query(line))
}

fn render(events: Vec<AnalysisEvent>, line: u32) -> Result<String, ProvenanceError> {
    let analyzer = ScriptedAnalyzer::new(events);
    let usecase = ProvenanceUsecase {
        locator: &FixedRoot,
        analyzer: &analyzer,
        exporter: &DotExporter,
    };
    let mut out = Vec::new();
    usecase.run(&query(line), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn target_label(graph: &ProvenanceGraph) -> &str {
    &graph.node(graph.target).unwrap().label
}

/// A small project: `main` calls `serve`, `serve` registers `handler` with
/// a framework (`router`), `handler` defines `helper`, `helper` calls
/// `parse`, and `parse`/`lex` recurse into each other.
fn project() -> Vec<AnalysisEvent> {
    let main = unit("main", 1, 5);
    let serve = unit("serve", 10, 20);
    let router = unit("router", 22, 30);
    let handler = unit("handler", 40, 60);
    let helper = unit("helper", 45, 50);
    let parse = unit("parse", 70, 80);
    let lex = unit("lex", 82, 90);
    let unrelated = unit("unrelated", 100, 110);
    vec![
        call(&main, &serve),
        call(&serve, &router),
        ioc(&router, &handler),
        defines(&handler, &helper),
        call(&helper, &parse),
        call(&parse, &lex),
        call(&lex, &parse),
        call(&unrelated, &main),
        call(&serve, &handler),
    ]
}

/// Every unit reachable backward from `target` through any relation.
fn backward_closure(events: &[AnalysisEvent], target: &str) -> HashSet<String> {
    let mut preds: HashMap<String, Vec<String>> = HashMap::new();
    for event in events {
        let (from, to) = match event {
            AnalysisEvent::Call { from, to } | AnalysisEvent::IndirectCall { from, to } => {
                (from, to)
            }
            AnalysisEvent::Definition {
                function,
                parent: Some(parent),
            } => (parent, function),
            AnalysisEvent::Definition { parent: None, .. } => continue,
        };
        preds
            .entry(to.name.clone().unwrap())
            .or_default()
            .push(from.name.clone().unwrap());
    }

    let mut seen = HashSet::from([target.to_string()]);
    let mut queue = VecDeque::from([target.to_string()]);
    while let Some(node) = queue.pop_front() {
        for p in preds.get(&node).into_iter().flatten() {
            if seen.insert(p.clone()) {
                queue.push_back(p.clone());
            }
        }
    }
    seen
}

#[test]
fn test_closure_correctness() {
    let events = project();
    let graph = trace(events.clone(), 75).unwrap();
    assert_eq!(target_label(&graph), "parse");

    let declared: HashSet<String> = graph.nodes.iter().map(|n| n.label.clone()).collect();
    assert_eq!(declared.len(), graph.nodes.len());
    assert_eq!(declared, backward_closure(&events, "parse"));
}

#[test]
fn test_no_duplicate_or_dangling_edges() {
    let graph = trace(project(), 75).unwrap();
    let ids: HashSet<_> = graph.nodes.iter().map(|n| n.id).collect();

    let mut seen = HashSet::new();
    for edge in &graph.edges {
        assert!(seen.insert((edge.from, edge.to, edge.kind)), "duplicate {:?}", edge);
        assert!(ids.contains(&edge.from), "dangling {:?}", edge);
        assert!(ids.contains(&edge.to), "dangling {:?}", edge);
    }
}

#[test]
fn test_innermost_selection() {
    let outer = unit("outer", 1, 10);
    let inner = unit("inner", 3, 7);
    let caller = unit("caller", 20, 30);
    let events = vec![call(&caller, &outer), defines(&outer, &inner), call(&outer, &inner)];

    let graph = trace(events, 5).unwrap();
    assert_eq!(target_label(&graph), "inner");
    assert_eq!(graph.nodes.iter().filter(|n| n.highlighted).count(), 1);
}

#[test]
fn test_no_match_is_reported() {
    let err = trace(project(), 200).unwrap_err();
    match err {
        ProvenanceError::NoTarget { file, position } => {
            assert_eq!(file, LIB);
            assert_eq!(position, Position::new(200, 1));
        }
        other => panic!("expected NoTarget, got {:?}", other),
    }
}

#[test]
fn test_no_match_in_other_file() {
    let elsewhere = CodeRef::new("/src/main.rs:main")
        .named("main")
        .located("/src/main.rs", SourceSpan::new(Position::new(1, 1), Position::new(50, 1)));
    let events = vec![call(&elsewhere, &elsewhere)];
    assert!(matches!(trace(events, 5), Err(ProvenanceError::NoTarget { .. })));
}

#[test]
fn test_output_is_deterministic() {
    let first = render(project(), 75).unwrap();
    let second = render(project(), 75).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("digraph { "));
    assert!(first.ends_with("; }\n"));
}

#[test]
fn test_cycle_terminates() {
    let x = unit("x", 1, 5);
    let y = unit("y", 10, 15);
    let events = vec![call(&x, &y), call(&y, &x)];

    let graph = trace(events, 3).unwrap();
    assert_eq!(target_label(&graph), "x");

    let x_id = graph.target;
    let y_id = graph.nodes.iter().find(|n| n.label == "y").unwrap().id;
    let y_to_x = graph
        .edges
        .iter()
        .filter(|e| e.from == y_id && e.to == x_id && e.kind == RelationKind::Call)
        .count();
    assert_eq!(y_to_x, 1);
}

#[test]
fn test_indirect_call_style() {
    let framework = unit("framework", 1, 5);
    let callback = unit("callback", 10, 15);
    let direct = unit("direct", 20, 25);
    let events = vec![ioc(&framework, &callback), call(&direct, &callback)];

    let dot = render(events, 12).unwrap();
    let ioc_line = dot.lines().find(|l| l.contains("label=\"ioc\"")).unwrap();
    assert!(ioc_line.contains("color=\"grey\" style=\"dashed\""));
    assert!(!ioc_line.contains("color=\"black\""));

    let call_line = dot.lines().find(|l| l.contains("color=\"black\"")).unwrap();
    assert!(!call_line.contains("ioc"));
    assert!(!call_line.contains("dashed"));
    assert_eq!(dot.matches("->").count(), 2);
}

#[test]
fn test_target_is_highlighted_in_dot() {
    let dot = render(project(), 47).unwrap();
    let highlighted: Vec<_> = dot.lines().filter(|l| l.contains("fillcolor")).collect();
    assert_eq!(highlighted.len(), 1);
    assert!(highlighted[0].contains("label=\"helper\""));
}

#[test]
fn test_analysis_failure_writes_nothing() {
    let mut analyzer = ScriptedAnalyzer::new(project());
    analyzer.failure = Some("scanner crashed".to_string());
    let usecase = ProvenanceUsecase {
        locator: &FixedRoot,
        analyzer: &analyzer,
        exporter: &DotExporter,
    };

    let mut out = Vec::new();
    let err = usecase.run(&query(75), &mut out).unwrap_err();
    assert!(matches!(err, ProvenanceError::AnalysisFailed { .. }));
    assert!(out.is_empty());
}

#[test]
fn test_missing_root_aborts_before_analysis() {
    let analyzer = ScriptedAnalyzer::new(project());
    let usecase = ProvenanceUsecase {
        locator: &NoRoot,
        analyzer: &analyzer,
        exporter: &DotExporter,
    };

    let mut out = Vec::new();
    let err = usecase.run(&query(75), &mut out).unwrap_err();
    assert!(matches!(err, ProvenanceError::RootNotFound { .. }));
    assert_eq!(analyzer.runs.get(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_queries_are_independent() {
    let events = project();
    let a = trace(events.clone(), 75).unwrap();
    let b = trace(events.clone(), 47).unwrap();
    let a_again = trace(events, 75).unwrap();
    assert_eq!(a, a_again);
    assert_ne!(target_label(&a), target_label(&b));
}
