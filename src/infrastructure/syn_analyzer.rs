//! Rust source analyzer built on `syn`.
//!
//! Parsing runs on a private rayon pool. Each worker turns one file into a
//! plain-data [`FileOutline`] (syn trees never leave the worker). Resolution
//! and event emission then run serially, file by file in path order, so the
//! event stream is identical on every run.
//!
//! Code units are functions, methods, trait default methods, nested function
//! items and closures. A unit's identity is `<file>:<line>:<column>` of its
//! first token.

use crate::domain::event::{AnalysisEvent, CodeRef};
use crate::domain::span::{Position, SourceSpan};
use crate::error::AnalyzerError;
use crate::infrastructure::concurrency::parser_pool;
use crate::infrastructure::project_root::{project_relative, ProjectManifest};
use crate::infrastructure::source_scan::{collect_rs_files, ScanConfig};
use crate::ports::{EventSink, SourceAnalyzer};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, FnArg, Ident, Pat, Signature, Stmt, UseTree};

const CLOSURE_NAME: &str = "{closure}";

/// Method names std types answer to. Sorted.
const COMMON_METHODS: &[&str] = &[
    "as_mut", "as_ref", "as_slice", "as_str", "borrow", "borrow_mut", "call",
    "clear", "clone", "cloned", "cmp", "collect", "contains", "contains_key",
    "copied", "count", "default", "deref", "deref_mut", "drain", "drop",
    "entry", "eq", "expect", "extend", "filter", "filter_map", "find",
    "flat_map", "flatten", "flush", "fmt", "fold", "for_each", "from", "get",
    "get_mut", "hash", "insert", "into", "into_iter", "is_empty", "is_none",
    "is_some", "iter", "iter_mut", "join", "keys", "last", "len", "lock", "map",
    "map_err", "max", "min", "next", "ok", "ok_or", "or_insert", "parse",
    "partial_cmp", "pop", "push", "read", "recv", "remove", "retain", "rev",
    "send", "sort", "sort_by", "split", "take", "to_owned", "to_string",
    "to_vec", "trim", "unwrap", "unwrap_or", "unwrap_or_default",
    "unwrap_or_else", "values", "write", "write_all", "zip",
];

#[derive(Default)]
pub struct SynAnalyzer {
    config: ScanConfig,
}

impl SynAnalyzer {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    fn outline_all(
        &self,
        root: &Path,
        crate_name: &str,
        files: &[PathBuf],
    ) -> Result<Vec<FileOutline>, AnalyzerError> {
        let pool = parser_pool(self.config.jobs)?;
        let results: Vec<Result<FileOutline, AnalyzerError>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| outline_file(root, crate_name, path))
                .collect()
        });
        // First failure in path order
        results.into_iter().collect()
    }
}

impl SourceAnalyzer for SynAnalyzer {
    fn analyze(&self, root: &Path, sink: &mut dyn EventSink) -> Result<(), AnalyzerError> {
        let manifest = ProjectManifest::load(root, &self.config.manifest)?;
        let files = collect_rs_files(root, &self.config)?;
        log::info!(
            "analyzing {} ({} source files)",
            manifest.crate_name,
            files.len()
        );

        let outlines = self.outline_all(root, &manifest.crate_name, &files)?;
        let symbols = SymbolTable::build(&manifest.crate_name, &outlines);

        let mut unresolved = 0usize;
        for outline in &outlines {
            for fact in &outline.facts {
                match symbols.event_for(fact) {
                    Some(event) => sink.handle(event),
                    None => unresolved += 1,
                }
            }
        }
        log::info!(
            "{} units, {} references left unresolved",
            symbols.units.len(),
            unresolved
        );
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Per-file outline
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct UnitDef {
    key: String,
    name: String,
    /// Module path, then `Self` type, then ident. `None` for closures.
    path: Option<Vec<String>>,
    /// Set for functions declared directly in an impl or trait block.
    owner: Option<String>,
    filename: String,
    span: SourceSpan,
}

/// Everything needed to resolve a path at the point it was written.
#[derive(Debug, Clone)]
struct Scope {
    module: Vec<String>,
    owner: Option<String>,
    /// Function items nested in enclosing bodies, innermost last.
    locals: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
enum Callee {
    Path { segments: Vec<String>, scope: Scope },
    Method { name: String, on_self: bool, scope: Scope },
    Unit(String),
}

#[derive(Debug, Clone)]
enum Fact {
    Define { unit: String, parent: Option<String> },
    Call { from: String, callee: Callee },
    Indirect { from: String, callee: Callee },
}

#[derive(Debug, Clone)]
struct Import {
    module: Vec<String>,
    alias: String,
    /// Absolute paths the alias may stand for, most likely first.
    targets: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct FileOutline {
    units: Vec<UnitDef>,
    imports: Vec<Import>,
    facts: Vec<Fact>,
}

fn outline_file(root: &Path, crate_name: &str, path: &Path) -> Result<FileOutline, AnalyzerError> {
    let source = fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ast = syn::parse_file(&source).map_err(|source| AnalyzerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = project_relative(root, path).ok_or_else(|| {
        AnalyzerError::Aborted(format!("{} is outside the project", path.display()))
    })?;

    let mut visitor = OutlineVisitor::new(crate_name, filename);
    visitor.visit_file(&ast);
    log::debug!(
        "{}: {} units, {} facts",
        visitor.filename,
        visitor.outline.units.len(),
        visitor.outline.facts.len()
    );
    Ok(visitor.outline)
}

/// Module path implied by a project-relative filename.
fn module_path(filename: &str) -> Vec<String> {
    let mut parts: Vec<&str> = filename.trim_start_matches('/').split('/').collect();
    if parts.len() > 1 && parts[0] == "src" {
        parts.remove(0);
    }
    let file = parts.pop().unwrap_or_default();
    let stem = file.strip_suffix(".rs").unwrap_or(file);

    let mut module: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
    let crate_root = module.is_empty() && (stem == "lib" || stem == "main");
    if stem != "mod" && !crate_root {
        module.push(stem.to_string());
    }
    module
}

struct Frame {
    key: String,
    path: Option<Vec<String>>,
}

struct OutlineVisitor<'c> {
    crate_name: &'c str,
    filename: String,
    module: Vec<String>,
    owner: Option<String>,
    units: Vec<Frame>,
    locals: Vec<(String, String)>,
    /// Parameters and pattern bindings in scope. These shadow items.
    bindings: Vec<String>,
    outline: FileOutline,
}

impl<'c> OutlineVisitor<'c> {
    fn new(crate_name: &'c str, filename: String) -> Self {
        Self {
            crate_name,
            module: module_path(&filename),
            filename,
            owner: None,
            units: Vec::new(),
            locals: Vec::new(),
            bindings: Vec::new(),
            outline: FileOutline::default(),
        }
    }

    fn is_binding(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b == name)
    }

    fn key_for(&self, span: proc_macro2::Span) -> String {
        let start = span.start();
        format!("{}:{}:{}", self.filename, start.line, start.column + 1)
    }

    fn scope(&self) -> Scope {
        Scope {
            module: self.module.clone(),
            owner: self.owner.clone(),
            locals: self.locals.clone(),
        }
    }

    fn current_unit(&self) -> Option<String> {
        self.units.last().map(|f| f.key.clone())
    }

    /// Register a unit, emit its definition and visit its body inside it.
    /// Closures see the enclosing bindings; function items only their own
    /// parameters.
    fn enter_unit(
        &mut self,
        span: proc_macro2::Span,
        ident: Option<&Ident>,
        params: Vec<String>,
        visit_body: impl FnOnce(&mut Self),
    ) {
        let key = self.key_for(span);
        let enclosing = self.units.iter().rev().find_map(|f| f.path.as_ref());
        let path = ident.map(|ident| {
            let mut path = match enclosing {
                Some(parent) => parent.clone(),
                None => {
                    let mut p = self.module.clone();
                    p.extend(self.owner.clone());
                    p
                }
            };
            path.push(ident.to_string());
            path
        });
        let owner = if self.units.is_empty() {
            self.owner.clone()
        } else {
            None
        };

        self.outline.units.push(UnitDef {
            key: key.clone(),
            name: ident.map_or_else(|| CLOSURE_NAME.to_string(), |i| i.to_string()),
            path: path.clone(),
            owner,
            filename: self.filename.clone(),
            span: source_span(span),
        });
        self.outline.facts.push(Fact::Define {
            unit: key.clone(),
            parent: self.current_unit(),
        });

        let outer = match ident {
            Some(_) => std::mem::take(&mut self.bindings),
            None => Vec::new(),
        };
        let bindings_len = self.bindings.len();
        self.bindings.extend(params);
        self.units.push(Frame { key, path });

        visit_body(self);

        self.units.pop();
        self.bindings.truncate(bindings_len);
        if ident.is_some() {
            self.bindings = outer;
        }
    }

    /// A single-segment path naming a parameter or local binding.
    fn names_binding(&self, path: &syn::Path) -> bool {
        path.leading_colon.is_none()
            && path.segments.len() == 1
            && self.is_binding(&path.segments[0].ident.to_string())
    }

    fn with_owner(&mut self, owner: Option<String>, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.owner, owner);
        f(self);
        self.owner = saved;
    }

    fn record_indirect(&mut self, from: &str, arg: &Expr) {
        let callee = match strip_reference(arg) {
            Expr::Path(p) if p.qself.is_none() && !self.names_binding(&p.path) => Callee::Path {
                segments: path_segments(&p.path),
                scope: self.scope(),
            },
            Expr::Closure(c) => Callee::Unit(self.key_for(c.span())),
            _ => return,
        };
        self.outline.facts.push(Fact::Indirect {
            from: from.to_string(),
            callee,
        });
    }

    fn record_use(&mut self, prefix: &mut Vec<String>, tree: &UseTree) {
        match tree {
            UseTree::Path(p) => {
                prefix.push(p.ident.to_string());
                self.record_use(prefix, &p.tree);
                prefix.pop();
            }
            UseTree::Name(n) => {
                let name = n.ident.to_string();
                if name == "self" {
                    if let Some(last) = prefix.last().cloned() {
                        self.push_import(last, prefix.clone());
                    }
                } else {
                    let mut target = prefix.clone();
                    target.push(name.clone());
                    self.push_import(name, target);
                }
            }
            UseTree::Rename(r) => {
                let mut target = prefix.clone();
                if r.ident != "self" {
                    target.push(r.ident.to_string());
                }
                self.push_import(r.rename.to_string(), target);
            }
            UseTree::Group(g) => {
                for item in &g.items {
                    self.record_use(prefix, item);
                }
            }
            UseTree::Glob(_) => {}
        }
    }

    fn push_import(&mut self, alias: String, written: Vec<String>) {
        let targets = absolute_candidates(&written, &self.module, None, self.crate_name);
        if !targets.is_empty() {
            self.outline.imports.push(Import {
                module: self.module.clone(),
                alias,
                targets,
            });
        }
    }
}

impl<'ast> Visit<'ast> for OutlineVisitor<'_> {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        // Out-of-line modules are separate files.
        if node.content.is_some() {
            self.module.push(node.ident.to_string());
            visit::visit_item_mod(self, node);
            self.module.pop();
        }
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let owner = match &*node.self_ty {
            syn::Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
            _ => None,
        };
        self.with_owner(owner, |v| visit::visit_item_impl(v, node));
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        let owner = Some(node.ident.to_string());
        self.with_owner(owner, |v| visit::visit_item_trait(v, node));
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let owner = if self.units.is_empty() { self.owner.clone() } else { None };
        self.with_owner(owner, |v| {
            v.enter_unit(node.span(), Some(&node.sig.ident), sig_bindings(&node.sig), |v| {
                visit::visit_item_fn(v, node)
            })
        });
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.enter_unit(node.span(), Some(&node.sig.ident), sig_bindings(&node.sig), |v| {
            visit::visit_impl_item_fn(v, node)
        });
    }

    fn visit_trait_item_fn(&mut self, node: &'ast syn::TraitItemFn) {
        match &node.default {
            Some(_) => self.enter_unit(node.span(), Some(&node.sig.ident), sig_bindings(&node.sig), |v| {
                visit::visit_trait_item_fn(v, node)
            }),
            None => visit::visit_trait_item_fn(self, node),
        }
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        let mut params = Vec::new();
        for input in &node.inputs {
            pat_bindings(input, &mut params);
        }
        self.enter_unit(node.span(), None, params, |v| visit::visit_expr_closure(v, node));
    }

    fn visit_block(&mut self, node: &'ast syn::Block) {
        // Items declared in a block are visible throughout it.
        let hoisted: Vec<_> = node
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(syn::Item::Fn(f)) => {
                    Some((f.sig.ident.to_string(), self.key_for(f.span())))
                }
                _ => None,
            })
            .collect();
        let (locals_len, bindings_len) = (self.locals.len(), self.bindings.len());
        self.locals.extend(hoisted);

        visit::visit_block(self, node);

        self.locals.truncate(locals_len);
        self.bindings.truncate(bindings_len);
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        // The initializer still sees the outer names.
        visit::visit_local(self, node);
        pat_bindings(&node.pat, &mut self.bindings);
    }

    fn visit_arm(&mut self, node: &'ast syn::Arm) {
        let len = self.bindings.len();
        pat_bindings(&node.pat, &mut self.bindings);
        visit::visit_arm(self, node);
        self.bindings.truncate(len);
    }

    fn visit_expr_let(&mut self, node: &'ast syn::ExprLet) {
        visit::visit_expr_let(self, node);
        pat_bindings(&node.pat, &mut self.bindings);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast syn::ExprForLoop) {
        self.visit_expr(&node.expr);
        let len = self.bindings.len();
        pat_bindings(&node.pat, &mut self.bindings);
        self.visit_block(&node.body);
        self.bindings.truncate(len);
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Some(from) = self.current_unit() {
            if let Expr::Path(p) = &*node.func {
                if p.qself.is_none() && !self.names_binding(&p.path) {
                    let callee = Callee::Path {
                        segments: path_segments(&p.path),
                        scope: self.scope(),
                    };
                    self.outline.facts.push(Fact::Call {
                        from: from.clone(),
                        callee,
                    });
                }
            }
            for arg in &node.args {
                self.record_indirect(&from, arg);
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        if let Some(from) = self.current_unit() {
            let on_self = matches!(
                strip_reference(&node.receiver),
                Expr::Path(p) if p.path.is_ident("self")
            );
            let callee = Callee::Method {
                name: node.method.to_string(),
                on_self,
                scope: self.scope(),
            };
            self.outline.facts.push(Fact::Call {
                from: from.clone(),
                callee,
            });
            for arg in &node.args {
                self.record_indirect(&from, arg);
            }
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        // `::name` only ever names an external crate
        if node.leading_colon.is_none() {
            self.record_use(&mut Vec::new(), &node.tree);
        }
    }
}

fn sig_bindings(sig: &Signature) -> Vec<String> {
    let mut names = Vec::new();
    for input in &sig.inputs {
        if let FnArg::Typed(arg) = input {
            pat_bindings(&arg.pat, &mut names);
        }
    }
    names
}

/// Names bound by `pat`.
fn pat_bindings(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(p) => {
            out.push(p.ident.to_string());
            if let Some((_, sub)) = &p.subpat {
                pat_bindings(sub, out);
            }
        }
        Pat::Or(p) => p.cases.iter().for_each(|c| pat_bindings(c, out)),
        Pat::Paren(p) => pat_bindings(&p.pat, out),
        Pat::Reference(p) => pat_bindings(&p.pat, out),
        Pat::Slice(p) => p.elems.iter().for_each(|e| pat_bindings(e, out)),
        Pat::Struct(p) => p.fields.iter().for_each(|f| pat_bindings(&f.pat, out)),
        Pat::Tuple(p) => p.elems.iter().for_each(|e| pat_bindings(e, out)),
        Pat::TupleStruct(p) => p.elems.iter().for_each(|e| pat_bindings(e, out)),
        Pat::Type(p) => pat_bindings(&p.pat, out),
        _ => {}
    }
}

fn strip_reference(expr: &Expr) -> &Expr {
    match expr {
        Expr::Reference(r) => strip_reference(&r.expr),
        Expr::Paren(p) => strip_reference(&p.expr),
        other => other,
    }
}

fn path_segments(path: &syn::Path) -> Vec<String> {
    path.segments.iter().map(|s| s.ident.to_string()).collect()
}

fn source_span(span: proc_macro2::Span) -> SourceSpan {
    let (start, end) = (span.start(), span.end());
    SourceSpan::new(
        Position::new(start.line as u32, start.column as u32 + 1),
        Position::new(end.line as u32, std::cmp::max(end.column, 1) as u32),
    )
}

/// Absolute (crate-relative) paths that `written`, seen from `module`, may
/// refer to. Empty when the path cannot refer into this crate.
fn absolute_candidates(
    written: &[String],
    module: &[String],
    owner: Option<&str>,
    crate_name: &str,
) -> Vec<Vec<String>> {
    let Some(first) = written.first() else {
        return Vec::new();
    };
    let rest = &written[1..];
    let joined = |base: &[String]| {
        let mut path = base.to_vec();
        path.extend_from_slice(rest);
        path
    };

    match first.as_str() {
        "crate" => vec![rest.to_vec()],
        "self" => vec![joined(module)],
        "super" => {
            let supers = written.iter().take_while(|s| *s == "super").count();
            if supers > module.len() {
                return Vec::new();
            }
            let mut path = module[..module.len() - supers].to_vec();
            path.extend_from_slice(&written[supers..]);
            vec![path]
        }
        "Self" => match owner {
            Some(owner) => {
                let mut base = module.to_vec();
                base.push(owner.to_string());
                vec![joined(&base)]
            }
            None => Vec::new(),
        },
        name if name == crate_name => vec![rest.to_vec()],
        _ => {
            let mut local = module.to_vec();
            local.extend_from_slice(written);
            if module.is_empty() {
                vec![local]
            } else {
                vec![local, written.to_vec()]
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Project-wide resolution
// ═══════════════════════════════════════════════════════════════════════════

struct SymbolTable<'o> {
    crate_name: &'o str,
    units: Vec<&'o UnitDef>,
    by_key: HashMap<&'o str, usize>,
    by_path: HashMap<&'o [String], usize>,
    methods: HashMap<&'o str, Vec<usize>>,
    imports: HashMap<(&'o [String], &'o str), &'o [Vec<String>]>,
}

impl<'o> SymbolTable<'o> {
    fn build(crate_name: &'o str, outlines: &'o [FileOutline]) -> Self {
        let mut table = SymbolTable {
            crate_name,
            units: Vec::new(),
            by_key: HashMap::new(),
            by_path: HashMap::new(),
            methods: HashMap::new(),
            imports: HashMap::new(),
        };

        for outline in outlines {
            for unit in &outline.units {
                let idx = table.units.len();
                table.units.push(unit);
                table.by_key.entry(unit.key.as_str()).or_insert(idx);
                if let Some(path) = &unit.path {
                    table.by_path.entry(path.as_slice()).or_insert(idx);
                }
                if unit.owner.is_some() {
                    table.methods.entry(unit.name.as_str()).or_default().push(idx);
                }
            }
            for import in &outline.imports {
                table
                    .imports
                    .entry((import.module.as_slice(), import.alias.as_str()))
                    .or_insert(import.targets.as_slice());
            }
        }
        table
    }

    fn code_ref(&self, key: &str) -> Option<CodeRef> {
        let unit = self.units[*self.by_key.get(key)?];
        let mut code_ref = CodeRef::new(unit.key.clone())
            .named(unit.name.clone())
            .located(unit.filename.clone(), unit.span);
        if let Some(path) = &unit.path {
            let tracked = std::iter::once(self.crate_name.to_string()).chain(path.iter().cloned());
            code_ref = code_ref.tracked(tracked);
        }
        Some(code_ref)
    }

    fn event_for(&self, fact: &Fact) -> Option<AnalysisEvent> {
        match fact {
            Fact::Define { unit, parent } => Some(AnalysisEvent::Definition {
                function: self.code_ref(unit)?,
                parent: parent.as_deref().and_then(|p| self.code_ref(p)),
            }),
            Fact::Call { from, callee } => Some(AnalysisEvent::Call {
                from: self.code_ref(from)?,
                to: self.code_ref(self.resolve(callee)?)?,
            }),
            Fact::Indirect { from, callee } => Some(AnalysisEvent::IndirectCall {
                from: self.code_ref(from)?,
                to: self.code_ref(self.resolve(callee)?)?,
            }),
        }
    }

    fn resolve(&self, callee: &Callee) -> Option<&'o str> {
        let idx = match callee {
            Callee::Unit(key) => *self.by_key.get(key.as_str())?,
            Callee::Path { segments, scope } => self.resolve_path(segments, scope)?,
            Callee::Method {
                name,
                on_self,
                scope,
            } => self.resolve_method(name, *on_self, scope)?,
        };
        let unit: &'o UnitDef = self.units[idx];
        Some(unit.key.as_str())
    }

    fn resolve_path(&self, segments: &[String], scope: &Scope) -> Option<usize> {
        let first = segments.first()?;
        if segments.len() == 1 {
            if let Some((_, key)) = scope.locals.iter().rev().find(|(name, _)| name == first) {
                return self.by_key.get(key.as_str()).copied();
            }
        }

        if let Some(targets) = self.imports.get(&(scope.module.as_slice(), first.as_str())) {
            for target in targets.iter() {
                let mut path = target.clone();
                path.extend_from_slice(&segments[1..]);
                if let Some(&idx) = self.by_path.get(path.as_slice()) {
                    return Some(idx);
                }
            }
        }

        absolute_candidates(segments, &scope.module, scope.owner.as_deref(), self.crate_name)
            .iter()
            .find_map(|path| self.by_path.get(path.as_slice()).copied())
    }

    fn resolve_method(&self, name: &str, on_self: bool, scope: &Scope) -> Option<usize> {
        if on_self {
            if let Some(owner) = &scope.owner {
                let mut path = scope.module.clone();
                path.push(owner.clone());
                path.push(name.to_string());
                if let Some(&idx) = self.by_path.get(path.as_slice()) {
                    return Some(idx);
                }
            }
        }
        // Only an unambiguous name resolves, and never one that std types
        // also answer to.
        if COMMON_METHODS.binary_search(&name).is_ok() {
            return None;
        }
        match self.methods.get(name).map(Vec::as_slice) {
            Some([idx]) => Some(*idx),
            _ => None,
        }
    }
}
