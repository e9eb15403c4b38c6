// Structural facts extracted from Python source files
//
// A `SourceUnit` owns its declarations in an arena. Nesting (methods and nested
// classes inside a class) is expressed with parent/child indices into that arena.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Index of a declaration inside its unit's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclId(pub usize);

/// Languages the structural parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    /// Detect language from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" | "pyw" => Some(Language::Python),
            _ => None,
        }
    }
}

/// Outcome of parsing a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseStatus {
    Ok,
    SyntaxError { message: String },
    Unreadable { message: String },
    Unsupported,
}

impl ParseStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseStatus::Ok)
    }

    /// Human-readable reason a file produced no facts
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ParseStatus::Ok => None,
            ParseStatus::SyntaxError { message } => Some(message.clone()),
            ParseStatus::Unreadable { message } => Some(format!("unreadable: {}", message)),
            ParseStatus::Unsupported => Some("unsupported file type".to_string()),
        }
    }
}

/// One analyzed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Path relative to the analysis root
    pub path: PathBuf,
    /// Dotted module identity
    pub module: String,
    pub language: Option<Language>,
    #[serde(skip)]
    pub text: String,
    pub status: ParseStatus,
    /// Declaration arena; `roots` lists the top-level entries in source order
    pub declarations: Vec<Declaration>,
    pub roots: Vec<DeclId>,
    pub imports: Vec<ImportEdge>,
    pub constants: Vec<ModuleConstant>,
    pub total_lines: usize,
}

impl SourceUnit {
    pub fn new(path: PathBuf, module: String, text: String) -> Self {
        let total_lines = text.lines().count();
        Self {
            path,
            module,
            language: Some(Language::Python),
            text,
            status: ParseStatus::Ok,
            declarations: Vec::new(),
            roots: Vec::new(),
            imports: Vec::new(),
            constants: Vec::new(),
            total_lines,
        }
    }

    /// A unit that carries no facts, only the reason why
    pub fn failed(path: PathBuf, module: String, text: String, status: ParseStatus) -> Self {
        let mut unit = Self::new(path, module, text);
        if status == ParseStatus::Unsupported {
            unit.language = None;
        }
        unit.status = status;
        unit
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Display form of the path, always `/`-separated
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// Append a declaration to the arena, linking it under `parent`
    pub fn push_declaration(&mut self, mut decl: Declaration, parent: Option<DeclId>) -> DeclId {
        let id = DeclId(self.declarations.len());
        decl.parent = parent;
        self.declarations.push(decl);
        match parent {
            Some(p) => self.declarations[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.declarations[id.0]
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Declaration> {
        self.roots.iter().map(|id| self.decl(*id))
    }

    pub fn children(&self, id: DeclId) -> impl Iterator<Item = &Declaration> {
        self.decl(id).children.iter().map(|c| self.decl(*c))
    }

    /// Pre-order walk over the declaration tree as (depth, id) pairs
    pub fn walk(&self) -> Vec<(usize, DeclId)> {
        let mut out = Vec::with_capacity(self.declarations.len());
        let mut stack: Vec<(usize, DeclId)> = self.roots.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            for child in self.decl(id).children.iter().rev() {
                stack.push((depth + 1, *child));
            }
        }
        out
    }

    /// Find a declaration by dotted qualified name, e.g. `User.greet`
    pub fn find(&self, qualified: &str) -> Option<&Declaration> {
        let mut parts = qualified.split('.');
        let first = parts.next()?;
        let mut current = *self.roots.iter().find(|id| self.decl(**id).name == first)?;
        for part in parts {
            current = *self
                .decl(current)
                .children
                .iter()
                .find(|id| self.decl(**id).name == part)?;
        }
        Some(self.decl(current))
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.constants.is_empty()
    }
}

/// Kind of declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Function,
    Method,
    Class,
}

/// Visibility by naming convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// `_name` and `__name` are private, `__name__` is not
    pub fn from_name(name: &str) -> Self {
        let dunder = name.len() > 4 && name.starts_with("__") && name.ends_with("__");
        if name.starts_with('_') && !dunder {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// A decorator, kept as written (without the `@`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decorator {
    pub text: String,
    pub line: usize,
}

/// A function, method, or class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Line of the `def`/`class` keyword; decorators are not included
    pub line_start: usize,
    pub line_end: usize,
    pub decorators: Vec<Decorator>,
    pub visibility: Visibility,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub is_async: bool,
    /// Base classes as written, not resolved
    pub bases: Vec<String>,
    pub fields: Vec<Field>,
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
}

impl Declaration {
    pub fn new(kind: DeclKind, name: &str, line_start: usize) -> Self {
        Self {
            kind,
            name: name.to_string(),
            line_start,
            line_end: line_start,
            decorators: Vec::new(),
            visibility: Visibility::from_name(name),
            parameters: Vec::new(),
            return_type: None,
            is_async: false,
            bases: Vec::new(),
            fields: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    pub fn is_class(&self) -> bool {
        self.kind == DeclKind::Class
    }

    /// Signature line without body: `def f(x: int) -> str` or `class A(B)`
    pub fn signature(&self) -> String {
        match self.kind {
            DeclKind::Class => {
                if self.bases.is_empty() {
                    format!("class {}", self.name)
                } else {
                    format!("class {}({})", self.name, self.bases.join(", "))
                }
            }
            DeclKind::Function | DeclKind::Method => {
                let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
                let ret = self
                    .return_type
                    .as_ref()
                    .map(|r| format!(" -> {}", r))
                    .unwrap_or_default();
                let prefix = if self.is_async { "async " } else { "" };
                format!("{}def {}({}){}", prefix, self.name, params.join(", "), ret)
            }
        }
    }
}

/// A function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_hint: Option<String>,
    pub default: Option<String>,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_hint: None,
            default: None,
            kind: ParameterKind::Regular,
        }
    }

    /// A bare `*` or `/` marker in the parameter list
    pub fn marker(kind: ParameterKind) -> Self {
        Self {
            kind,
            ..Self::new("")
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();

        match self.kind {
            ParameterKind::KeywordMarker => return f.write_str("*"),
            ParameterKind::PositionalMarker => return f.write_str("/"),
            ParameterKind::Args => s.push('*'),
            ParameterKind::Kwargs => s.push_str("**"),
            ParameterKind::Regular => {}
        }

        s.push_str(&self.name);

        if let Some(ref t) = self.type_hint {
            s.push_str(": ");
            s.push_str(t);
        }

        if let Some(ref d) = self.default {
            if self.type_hint.is_some() {
                s.push_str(" = ");
            } else {
                s.push('=');
            }
            s.push_str(d);
        }

        write!(f, "{}", s)
    }
}

/// Kind of function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Regular,
    /// *args
    Args,
    /// **kwargs
    Kwargs,
    /// bare `*`
    KeywordMarker,
    /// `/`
    PositionalMarker,
}

/// A typed or builder-declared attribute in a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub type_hint: Option<String>,
    /// Default value as written, never evaluated
    pub default: Option<String>,
    /// Field-builder call name when the default is one (`field`, `Column`, ...)
    pub builder: Option<String>,
    pub line: usize,
}

impl Field {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            type_hint: None,
            default: None,
            builder: None,
            line,
        }
    }

    pub fn is_private(&self) -> bool {
        Visibility::from_name(&self.name) == Visibility::Private
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(t) = &self.type_hint {
            write!(f, ": {}", t)?;
        }
        if let Some(d) = &self.default {
            write!(f, " = {}", d)?;
        }
        Ok(())
    }
}

/// A top-level simple-name assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConstant {
    pub name: String,
    pub type_hint: Option<String>,
    /// Value as written; may be summarized when rendered
    pub value: String,
    pub line: usize,
}

impl ModuleConstant {
    pub fn is_private(&self) -> bool {
        Visibility::from_name(&self.name) == Visibility::Private
    }

    /// Value shortened to `max_len` characters; multi-line values keep their first line
    pub fn summarized_value(&self, max_len: usize) -> String {
        summarize(&self.value, max_len)
    }
}

/// Shorten a literal for display
pub fn summarize(value: &str, max_len: usize) -> String {
    let mut lines = value.lines();
    let first = lines.next().unwrap_or("").trim_end();
    let multiline = lines.next().is_some();
    let char_count = first.chars().count();

    if char_count <= max_len && !multiline {
        return first.to_string();
    }

    let keep = max_len.saturating_sub(3).min(char_count);
    let truncated: String = first.chars().take(keep).collect();
    format!("{}...", truncated)
}

/// Whether an import stays inside the analyzed package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportClass {
    Internal,
    External,
}

/// One imported target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Module identity of the importing file
    pub importer: String,
    /// Module the import refers to (relative imports already resolved)
    pub target: String,
    /// Name pulled from the target in `from x import name` forms
    pub name: Option<String>,
    pub line: usize,
    pub class: ImportClass,
}

impl ImportEdge {
    pub fn is_internal(&self) -> bool {
        self.class == ImportClass::Internal
    }
}
