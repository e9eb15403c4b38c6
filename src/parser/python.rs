// Python structural parser using tree-sitter
//
// Extraction is purely syntactic. A tree containing ERROR or MISSING nodes is
// rejected as a whole: the unit comes back with a syntax-error status and no
// facts, so a half-understood file never leaks partial structure.

use crate::analysis::imports::{classify, is_package_init, module_identity, resolve_relative};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::ast::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Settings the parser needs beyond the source text
#[derive(Debug, Clone, Default)]
pub struct ParserSettings {
    /// Call names treated as declarative field builders
    pub field_builders: HashSet<String>,
    /// Dotted root package prefixed to module identities
    pub package_root: Option<String>,
}

impl ParserSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            field_builders: config.parser.field_builders.iter().cloned().collect(),
            package_root: config.graph.package_root.clone(),
        }
    }
}

/// Parser for Python source files
pub struct PythonParser {
    parser: Parser,
    settings: ParserSettings,
}

impl PythonParser {
    /// Create a new Python parser
    pub fn new(settings: ParserSettings) -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::language();
        parser
            .set_language(&language)
            .map_err(|e| Error::parser(format!("Failed to set Python language: {}", e)))?;
        Ok(Self { parser, settings })
    }

    /// Read and parse a file; `relative` is its path under the analysis root
    pub fn parse_file(&mut self, path: &Path, relative: &Path) -> SourceUnit {
        let module = module_identity(relative, self.settings.package_root.as_deref());

        let supported = relative
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
            .is_some();
        if !supported {
            return SourceUnit::failed(
                relative.to_path_buf(),
                module,
                String::new(),
                ParseStatus::Unsupported,
            );
        }

        match std::fs::read(path) {
            Ok(bytes) => {
                let source = String::from_utf8_lossy(&bytes);
                self.parse(&source, relative)
            }
            Err(e) => SourceUnit::failed(
                relative.to_path_buf(),
                module,
                String::new(),
                ParseStatus::Unreadable {
                    message: e.to_string(),
                },
            ),
        }
    }

    /// Parse Python source; never fails, malformed input yields a syntax-error unit
    pub fn parse(&mut self, source: &str, relative: &Path) -> SourceUnit {
        let module = module_identity(relative, self.settings.package_root.as_deref());
        let path = relative.to_path_buf();

        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                let status = ParseStatus::SyntaxError {
                    message: "parser produced no tree".to_string(),
                };
                return SourceUnit::failed(path, module, source.to_string(), status);
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            let message = describe_error(root);
            debug!("{}: {}", relative.display(), message);
            return SourceUnit::failed(
                path,
                module,
                source.to_string(),
                ParseStatus::SyntaxError { message },
            );
        }

        let mut unit = SourceUnit::new(path, module, source.to_string());
        let ctx = Extraction {
            source: source.as_bytes(),
            builders: &self.settings.field_builders,
            package_root: self.settings.package_root.as_deref(),
            is_package: is_package_init(relative),
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "class_definition" | "function_definition" | "decorated_definition" => {
                    ctx.declaration(&mut unit, child, None);
                }
                "expression_statement" => {
                    if let Some(constant) = ctx.constant(child) {
                        unit.constants.push(constant);
                    }
                }
                _ => {}
            }
        }

        ctx.imports(&mut unit, root);
        unit
    }
}

/// Locate the first ERROR or MISSING node and describe it
fn describe_error(root: Node) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let pos = node.start_position();
        if node.is_missing() {
            return format!(
                "syntax error: missing '{}' at line {}, column {}",
                node.kind(),
                pos.row + 1,
                pos.column + 1
            );
        }
        if node.is_error() {
            return format!(
                "syntax error at line {}, column {}",
                pos.row + 1,
                pos.column + 1
            );
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    "syntax error".to_string()
}

/// Per-file extraction context
struct Extraction<'a> {
    source: &'a [u8],
    builders: &'a HashSet<String>,
    package_root: Option<&'a str>,
    is_package: bool,
}

impl<'a> Extraction<'a> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    /// Add a class or function (possibly decorated) to the arena
    fn declaration(&self, unit: &mut SourceUnit, node: Node, parent: Option<DeclId>) {
        let (decorators, def) = if node.kind() == "decorated_definition" {
            match node.child_by_field_name("definition") {
                Some(def) => (self.decorators(node), def),
                None => return,
            }
        } else {
            (Vec::new(), node)
        };

        let name = match def.child_by_field_name("name") {
            Some(n) => self.text(n),
            None => return,
        };
        let line_start = def.start_position().row + 1;

        match def.kind() {
            "class_definition" => {
                let mut class = Declaration::new(DeclKind::Class, &name, line_start);
                class.line_end = def.end_position().row + 1;
                class.decorators = decorators;
                if let Some(args) = def.child_by_field_name("superclasses") {
                    class.bases = self.bases(args);
                }
                let body = def.child_by_field_name("body");
                if let Some(body) = body {
                    class.fields = self.fields(body);
                }

                let id = unit.push_declaration(class, parent);
                if let Some(body) = body {
                    let mut cursor = body.walk();
                    for child in body.named_children(&mut cursor) {
                        if matches!(
                            child.kind(),
                            "class_definition" | "function_definition" | "decorated_definition"
                        ) {
                            self.declaration(unit, child, Some(id));
                        }
                    }
                }
            }
            "function_definition" => {
                let in_class = parent.map(|p| unit.decl(p).is_class()).unwrap_or(false);
                let kind = if in_class {
                    DeclKind::Method
                } else {
                    DeclKind::Function
                };
                let mut func = Declaration::new(kind, &name, line_start);
                func.line_end = def.end_position().row + 1;
                func.decorators = decorators;
                func.is_async = has_async_keyword(def);
                if let Some(params) = def.child_by_field_name("parameters") {
                    func.parameters = self.parameters(params);
                }
                func.return_type = def.child_by_field_name("return_type").map(|t| self.text(t));
                unit.push_declaration(func, parent);
            }
            _ => {}
        }
    }

    /// Decorators as written, one per `@` line
    fn decorators(&self, node: Node) -> Vec<Decorator> {
        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "decorator" {
                continue;
            }
            let text = match child.named_child(0) {
                Some(expr) => self.text(expr),
                None => self.text(child).trim().trim_start_matches('@').trim().to_string(),
            };
            decorators.push(Decorator {
                text,
                line: child.start_position().row + 1,
            });
        }
        decorators
    }

    /// Base list entries verbatim, including keyword arguments like `metaclass=...`
    fn bases(&self, args: Node) -> Vec<String> {
        let mut bases = Vec::new();
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            if child.kind() != "comment" {
                bases.push(self.text(child));
            }
        }
        bases
    }

    /// Annotated or builder-declared attributes directly inside a class body
    fn fields(&self, body: Node) -> Vec<Field> {
        let mut fields = Vec::new();
        let mut cursor = body.walk();
        for stmt in body.named_children(&mut cursor) {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(assign) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
                continue;
            };
            let Some(left) = assign.child_by_field_name("left") else {
                continue;
            };
            if left.kind() != "identifier" {
                continue;
            }

            let type_hint = assign.child_by_field_name("type").map(|t| self.text(t));
            let right = assign.child_by_field_name("right");
            if right.map(|r| r.kind() == "assignment").unwrap_or(false) {
                continue;
            }
            let builder = right.and_then(|r| self.builder_name(r));
            if type_hint.is_none() && builder.is_none() {
                continue;
            }

            let mut field = Field::new(&self.text(left), assign.start_position().row + 1);
            field.type_hint = type_hint;
            field.default = right.map(|r| self.text(r));
            field.builder = builder;
            fields.push(field);
        }
        fields
    }

    /// Name of a configured field-builder call, e.g. `field` in `dataclasses.field(...)`
    fn builder_name(&self, value: Node) -> Option<String> {
        if value.kind() != "call" {
            return None;
        }
        let callee = self.text(value.child_by_field_name("function")?);
        let last = callee.rsplit('.').next().unwrap_or(&callee);
        if self.builders.contains(&callee) || self.builders.contains(last) {
            Some(callee)
        } else {
            None
        }
    }

    /// A top-level simple-name assignment with a value
    fn constant(&self, stmt: Node) -> Option<ModuleConstant> {
        let assign = stmt.named_child(0).filter(|n| n.kind() == "assignment")?;
        let left = assign.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let right = assign.child_by_field_name("right")?;
        if right.kind() == "assignment" {
            // chained targets, `a = b = 1`
            return None;
        }

        Some(ModuleConstant {
            name: self.text(left),
            type_hint: assign.child_by_field_name("type").map(|t| self.text(t)),
            value: self.text(right),
            line: assign.start_position().row + 1,
        })
    }

    fn parameters(&self, node: Node) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => params.push(Parameter::new(&self.text(child))),
                "typed_parameter" => {
                    if let Some(param) = self.typed_parameter(child) {
                        params.push(param);
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let mut param = Parameter::new(&self.text(name));
                    param.type_hint = child.child_by_field_name("type").map(|t| self.text(t));
                    param.default = child.child_by_field_name("value").map(|v| self.text(v));
                    params.push(param);
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    params.push(self.splat(child));
                }
                "keyword_separator" => {
                    params.push(Parameter::marker(ParameterKind::KeywordMarker));
                }
                "positional_separator" => {
                    params.push(Parameter::marker(ParameterKind::PositionalMarker));
                }
                _ => {}
            }
        }

        params
    }

    /// `name: T`, `*args: T` or `**kwargs: T`
    fn typed_parameter(&self, node: Node) -> Option<Parameter> {
        let target = node.named_child(0)?;
        let mut param = match target.kind() {
            "identifier" => Parameter::new(&self.text(target)),
            "list_splat_pattern" | "dictionary_splat_pattern" => self.splat(target),
            _ => return None,
        };
        param.type_hint = node.child_by_field_name("type").map(|t| self.text(t));
        Some(param)
    }

    fn splat(&self, node: Node) -> Parameter {
        let name = node
            .named_child(0)
            .map(|n| self.text(n))
            .unwrap_or_default();
        let mut param = Parameter::new(&name);
        param.kind = if node.kind() == "list_splat_pattern" {
            ParameterKind::Args
        } else {
            ParameterKind::Kwargs
        };
        param
    }

    /// Every import statement in the file, including ones nested in functions
    /// or conditional blocks, in source order
    fn imports(&self, unit: &mut SourceUnit, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => self.import(unit, node),
                "import_from_statement" | "future_import_statement" => {
                    self.import_from(unit, node)
                }
                _ => {
                    let mut cursor = node.walk();
                    let children: Vec<Node> = node.named_children(&mut cursor).collect();
                    stack.extend(children.into_iter().rev());
                }
            }
        }
    }

    /// `import a, b.c as d`: one edge per imported module
    fn import(&self, unit: &mut SourceUnit, node: Node) {
        let line = node.start_position().row + 1;
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

        for name in names {
            let target = match name.kind() {
                "aliased_import" => match name.child_by_field_name("name") {
                    Some(n) => self.text(n),
                    None => continue,
                },
                _ => self.text(name),
            };
            let class = classify(&target, self.package_root);
            unit.imports.push(ImportEdge {
                importer: unit.module.clone(),
                target,
                name: None,
                line,
                class,
            });
        }
    }

    /// `from m import x, y`: one edge per name, all targeting `m`
    fn import_from(&self, unit: &mut SourceUnit, node: Node) {
        let line = node.start_position().row + 1;

        let (target, class) = match node.child_by_field_name("module_name") {
            Some(module) if module.kind() == "relative_import" => self.relative_target(unit, module),
            Some(module) => {
                let target = self.text(module);
                let class = classify(&target, self.package_root);
                (target, class)
            }
            None => ("__future__".to_string(), ImportClass::External),
        };

        let mut names = Vec::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let text = match name.kind() {
                "aliased_import" => name.child_by_field_name("name").map(|n| self.text(n)),
                _ => Some(self.text(name)),
            };
            names.extend(text);
        }

        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            names.push("*".to_string());
        }

        if names.is_empty() {
            names.push(String::new());
        }

        for name in names {
            unit.imports.push(ImportEdge {
                importer: unit.module.clone(),
                target: target.clone(),
                name: if name.is_empty() { None } else { Some(name) },
                line,
                class,
            });
        }
    }

    fn relative_target(&self, unit: &SourceUnit, node: Node) -> (String, ImportClass) {
        let mut level = 0;
        let mut module = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_prefix" => {
                    level = self.text(child).chars().filter(|c| *c == '.').count();
                }
                "dotted_name" => module = self.text(child),
                _ => {}
            }
        }

        match resolve_relative(&unit.module, self.is_package, level, &module) {
            Some(target) => (target, ImportClass::Internal),
            None => (
                format!("{}{}", ".".repeat(level), module),
                ImportClass::External,
            ),
        }
    }
}

/// Check if a function_definition node has an async keyword
fn has_async_keyword(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}
