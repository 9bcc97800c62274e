//! ES module statement scanner and rewriter.
//!
//! Parses a module with oxc and turns its top-level `import`/`export`
//! statements into calls against the bundle runtime:
//!
//! | Source                          | Rewritten                                   |
//! |---------------------------------|---------------------------------------------|
//! | `import 'a'`                    | `__require(1);`                             |
//! | `import X, { a as b } from 'a'` | `const { default: X, a: b } = __require(1);`|
//! | `import * as ns from 'a'`       | `const ns = __require(1);`                  |
//! | `import('a')`                   | `__import(1)`                               |
//! | `export const x = ..`           | `const x = ..` + getter for `x`             |
//! | `export default expr`           | `const __default = expr` + getter           |
//! | `export { a as b }`             | removed + getter `b → a`                    |
//! | `export { a } from 'a'`         | `var __re0 = __require(1);` + getter        |
//! | `export * from 'a'`             | `__reexport(__exports, __require(1));`      |
//!
//! Getters are registered at the top of the module body, before any of its
//! statements run, so a partially initialized module already exposes its
//! export names to an importer that closes a cycle.
//!
//! TypeScript is type-stripped by the oxc transformer before scanning. The
//! rewrite then applies to the generated JavaScript, while import positions
//! still point into the original source.

use std::ops::Range;
use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier, ImportOrExportKind,
    Program, Statement,
};
use oxc::codegen::Codegen;
use oxc::diagnostics::OxcDiagnostic;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::{GetSpan, SourceType};
use oxc::syntax::module_record::DynamicImport;
use oxc::transformer::{TransformOptions, Transformer};

use super::{Loader, Location, Message};

/// How a module depends on one of its imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Static,
    Dynamic,
    ReExport,
}

/// One specifier found in a module, with its position for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    /// 1-based.
    pub line: usize,
    /// 0-based, in characters.
    pub column: usize,
    pub line_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ImportClause {
    default: Option<String>,
    namespace: Option<String>,
    /// `(imported, local)`
    named: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Replace(&'static str),
    Import(ImportClause),
    SideEffect,
    Dynamic,
    ReexportAll,
    /// `var <name> = __require(..);`
    Reexport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    action: Action,
    record: Option<usize>,
}

/// Scanned statements of one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportRecord>,
    /// JavaScript the edits apply to.
    code: String,
    edits: Vec<Edit>,
    /// `(exported, expression)` in statement order.
    getters: Vec<(String, String)>,
}

/// Specifier found while walking, before records are numbered.
struct Request {
    specifier: String,
    /// Byte offset of the first character inside the quotes.
    offset: usize,
    kind: ImportKind,
}

/// Scan a JavaScript or TypeScript module.
pub fn scan(path: &str, source: &str, loader: Loader) -> Result<ModuleSyntax, Message> {
    if loader != Loader::Ts {
        return scan_javascript(path, source.to_string());
    }

    let code = strip_types(path, source)?;
    let mut syntax = scan_javascript(path, code)?;
    relocate(&mut syntax.imports, &typescript_imports(path, source)?);
    Ok(syntax)
}

fn scan_javascript(path: &str, code: String) -> Result<ModuleSyntax, Message> {
    let (imports, edits, getters) = walk_module(path, &code, SourceType::mjs())?;
    Ok(ModuleSyntax { imports, code, edits, getters })
}

type Walked = (Vec<ImportRecord>, Vec<Edit>, Vec<(String, String)>);

fn walk_module(path: &str, source: &str, source_type: SourceType) -> Result<Walked, Message> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(diagnostic(path, source, error));
    }

    let mut walk = Walk::new(source);
    walk.program(&ret.program);
    walk.dynamic_imports(&ret.module_record.dynamic_imports);
    Ok(walk.finish())
}

/// Type-strip TypeScript into plain JavaScript.
fn strip_types(path: &str, source: &str) -> Result<String, Message> {
    let allocator = Allocator::default();
    let source_type = SourceType::ts().with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(diagnostic(path, source, error));
    }

    let mut program = ret.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let ret = Transformer::new(&allocator, Path::new(path), &TransformOptions::default())
        .build_with_scoping(scoping, &mut program);
    if let Some(error) = ret.errors.first() {
        return Err(diagnostic(path, source, error));
    }
    Ok(Codegen::new().build(&program).code)
}

/// Import records of the untransformed TypeScript source.
fn typescript_imports(path: &str, source: &str) -> Result<Vec<ImportRecord>, Message> {
    let (imports, _, _) = walk_module(path, source, SourceType::ts().with_module(true))?;
    Ok(imports)
}

/// Point records of generated code back at the matching original import.
fn relocate(records: &mut [ImportRecord], original: &[ImportRecord]) {
    let mut used = vec![false; original.len()];
    for record in records {
        let found = original.iter().enumerate().find(|(i, o)| {
            !used[*i] && o.specifier == record.specifier && o.kind == record.kind
        });
        if let Some((i, o)) = found {
            used[i] = true;
            record.line = o.line;
            record.column = o.column;
            record.line_text = o.line_text.clone();
        }
    }
}

fn diagnostic(path: &str, source: &str, error: &OxcDiagnostic) -> Message {
    let message = Message::new(error.message.to_string());
    let Some(label) = error.labels.as_ref().and_then(|labels| labels.first()) else {
        return message;
    };
    let offset = floor_char_boundary(source, label.offset());
    let (line, column, line_text) = position(source, offset);
    message.with_location(Location {
        file: path.to_string(),
        line,
        column,
        length: label.len(),
        line_text,
    })
}

fn floor_char_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// `(1-based line, 0-based character column, line text)` of a byte offset.
fn position(source: &str, offset: usize) -> (usize, usize, String) {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[offset..].find('\n').map_or(source.len(), |i| offset + i);
    (
        source[..offset].matches('\n').count() + 1,
        source[line_start..offset].chars().count(),
        source[line_start..line_end].trim_end_matches('\r').to_string(),
    )
}

// =============================================================================
// Walking
// =============================================================================

struct Walk<'s> {
    source: &'s str,
    pending: Vec<(Edit, Option<Request>)>,
    getters: Vec<(String, String)>,
    reexports: usize,
}

fn span_range(span: oxc::span::Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

impl<'s> Walk<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            pending: Vec::new(),
            getters: Vec::new(),
            reexports: 0,
        }
    }

    fn edit(&mut self, range: Range<usize>, action: Action, request: Option<Request>) {
        self.pending.push((Edit { range, action, record: None }, request));
    }

    fn remove(&mut self, range: Range<usize>) {
        self.edit(range, Action::Replace(""), None);
    }

    fn getter(&mut self, exported: impl Into<String>, expression: impl Into<String>) {
        self.getters.push((exported.into(), expression.into()));
    }

    fn reexport_var(&mut self) -> String {
        let var = format!("__re{}", self.reexports);
        self.reexports += 1;
        var
    }

    fn program(&mut self, program: &Program<'_>) {
        if let Some(hashbang) = &program.hashbang {
            self.remove(span_range(hashbang.span));
        }
        for statement in &program.body {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let range = span_range(decl.span);
                if decl.import_kind == ImportOrExportKind::Type {
                    return self.remove(range);
                }
                let request = Request {
                    specifier: decl.source.value.to_string(),
                    offset: decl.source.span.start as usize + 1,
                    kind: ImportKind::Static,
                };
                let Some(specifiers) = &decl.specifiers else {
                    return self.edit(range, Action::SideEffect, Some(request));
                };
                let mut clause = ImportClause::default();
                let mut typed = 0;
                for specifier in specifiers {
                    match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => {
                            if s.import_kind == ImportOrExportKind::Type {
                                typed += 1;
                                continue;
                            }
                            clause.named.push((s.imported.name().to_string(), s.local.name.to_string()));
                        }
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            clause.default = Some(s.local.name.to_string());
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            clause.namespace = Some(s.local.name.to_string());
                        }
                    }
                }
                if typed > 0 && typed == specifiers.len() {
                    self.remove(range);
                } else {
                    self.edit(range, Action::Import(clause), Some(request));
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                let range = span_range(decl.span);
                if decl.export_kind == ImportOrExportKind::Type {
                    return self.remove(range);
                }
                let request = Request {
                    specifier: decl.source.value.to_string(),
                    offset: decl.source.span.start as usize + 1,
                    kind: ImportKind::ReExport,
                };
                match &decl.exported {
                    None => self.edit(range, Action::ReexportAll, Some(request)),
                    Some(name) => {
                        let var = self.reexport_var();
                        self.getter(name.name().to_string(), var.clone());
                        self.edit(range, Action::Reexport(var), Some(request));
                    }
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                let range = span_range(decl.span);
                if decl.export_kind == ImportOrExportKind::Type {
                    return self.remove(range);
                }
                let specifiers = decl
                    .specifiers
                    .iter()
                    .filter(|s| s.export_kind != ImportOrExportKind::Type)
                    .map(|s| (s.local.name().to_string(), s.exported.name().to_string()));

                if let Some(source) = &decl.source {
                    let var = self.reexport_var();
                    for (imported, exported) in specifiers.collect::<Vec<_>>() {
                        self.getter(exported, member(&var, &imported));
                    }
                    let request = Request {
                        specifier: source.value.to_string(),
                        offset: source.span.start as usize + 1,
                        kind: ImportKind::ReExport,
                    };
                    return self.edit(range, Action::Reexport(var), Some(request));
                }

                let Some(declaration) = &decl.declaration else {
                    for (local, exported) in specifiers.collect::<Vec<_>>() {
                        self.getter(exported, local);
                    }
                    return self.remove(range);
                };
                if declaration.is_typescript_syntax() {
                    return self.remove(range);
                }
                for name in declared_names(declaration) {
                    self.getter(name.clone(), name);
                }
                self.remove(range.start..declaration.span().start as usize);
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let range = span_range(decl.span);
                let inner = span_range(decl.declaration.span());
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                        return self.remove(range);
                    }
                    _ => None,
                };
                match named {
                    Some(name) => {
                        self.getter("default", name);
                        self.remove(range.start..inner.start);
                    }
                    None => {
                        self.getter("default", "__default");
                        self.edit(range.start..inner.start, Action::Replace("const __default = "), None);
                        self.edit(inner.end..range.end, Action::Replace(";"), None);
                    }
                }
            }
            _ => {}
        }
    }

    /// `import('literal')` calls; computed specifiers stay native.
    fn dynamic_imports(&mut self, imports: &[DynamicImport]) {
        for import in imports {
            let request = span_range(import.module_request);
            let Some(specifier) = string_literal(&self.source[request.clone()]) else {
                continue;
            };
            let request = Request {
                specifier: specifier.to_string(),
                offset: request.start + 1,
                kind: ImportKind::Dynamic,
            };
            self.edit(span_range(import.span), Action::Dynamic, Some(request));
        }
    }

    fn finish(mut self) -> Walked {
        self.pending.sort_by_key(|(edit, _)| (edit.range.start, edit.range.end));

        let mut imports = Vec::new();
        let mut edits = Vec::with_capacity(self.pending.len());
        for (mut edit, request) in self.pending {
            if let Some(request) = request {
                let (line, column, line_text) = position(self.source, request.offset);
                imports.push(ImportRecord {
                    specifier: request.specifier,
                    kind: request.kind,
                    line,
                    column,
                    line_text,
                });
                edit.record = Some(imports.len() - 1);
            }
            edits.push(edit);
        }
        (imports, edits, self.getters)
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        other => other.id().map(|id| id.name.to_string()).into_iter().collect(),
    }
}

/// Contents of a quoted literal without escapes or substitutions.
fn string_literal(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| matches!(c, '\'' | '"' | '`'))?;
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    let plain = !inner.contains(['\\', quote]) && !(quote == '`' && inner.contains("${"));
    plain.then_some(inner)
}

// =============================================================================
// Rewriting
// =============================================================================

/// Rewrite a scanned module into a bundle-runtime body.
///
/// `module_ids[i]` is the registry id of `syntax.imports[i]`; unresolved
/// imports are rewritten to `undefined` (such bundles are never emitted).
pub fn rewrite(syntax: &ModuleSyntax, module_ids: &[Option<usize>]) -> String {
    let code = &syntax.code;
    let id = |record: Option<usize>| -> String {
        record
            .and_then(|record| module_ids.get(record).copied().flatten())
            .map_or_else(|| "undefined".to_string(), |id| id.to_string())
    };

    let mut body = String::with_capacity(code.len());
    let mut cursor = 0;
    for edit in &syntax.edits {
        body.push_str(&code[cursor..edit.range.start]);
        cursor = edit.range.end;

        let require = || format!("__require({})", id(edit.record));
        match &edit.action {
            Action::Replace(text) => body.push_str(text),
            Action::Import(clause) => body.push_str(&import_statement(clause, &require())),
            Action::SideEffect => body.push_str(&format!("{};", require())),
            Action::Dynamic => body.push_str(&format!("__import({})", id(edit.record))),
            Action::ReexportAll => body.push_str(&format!("__reexport(__exports, {});", require())),
            Action::Reexport(var) => body.push_str(&format!("var {var} = {};", require())),
        }
    }
    body.push_str(&code[cursor..]);

    if syntax.getters.is_empty() {
        return body;
    }

    let entries: Vec<String> = syntax
        .getters
        .iter()
        .map(|(name, expr)| format!("{}: () => {expr}", property_key(name)))
        .collect();
    format!("__export(__exports, {{ {} }});\n{body}", entries.join(", "))
}

fn import_statement(clause: &ImportClause, require: &str) -> String {
    let mut bindings: Vec<String> = Vec::new();
    if let Some(default) = &clause.default {
        bindings.push(format!("default: {default}"));
    }
    for (imported, local) in &clause.named {
        if imported == local {
            bindings.push(local.clone());
        } else {
            bindings.push(format!("{}: {local}", property_key(imported)));
        }
    }

    match (&clause.namespace, bindings.is_empty()) {
        (Some(ns), true) => format!("const {ns} = {require};"),
        (Some(ns), false) => format!("const {ns} = {require}; const {{ {} }} = {ns};", bindings.join(", ")),
        (None, true) => format!("{require};"),
        (None, false) => format!("const {{ {} }} = {require};", bindings.join(", ")),
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn quoted(name: &str) -> String {
    serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""))
}

fn property_key(name: &str) -> String {
    if is_identifier(name) { name.to_string() } else { quoted(name) }
}

/// `object.name`, or `object["name"]` for non-identifiers.
fn member(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", quoted(name))
    }
}
