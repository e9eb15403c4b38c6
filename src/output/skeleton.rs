// Skeleton rendering: signatures, decorators, fields and constants without bodies
//
// Output is byte-deterministic for a given unit set and options. Units are
// rendered in path order and everything inside a unit in source order.

use super::batch_counts;
use crate::analysis::estimate::estimate;
use crate::analysis::priority::{PriorityClassifier, Tier};
use crate::config::Config;
use crate::error::Result;
use crate::parser::{DeclId, DeclKind, Decorator, ParseStatus, SourceUnit};
use serde::Serialize;

const INDENT: &str = "    ";

/// Output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct SkeletonOptions {
    pub min_tier: Tier,
    pub include_private: bool,
    pub line_numbers: bool,
    pub max_value_len: usize,
    pub format: SkeletonFormat,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        Self {
            min_tier: Tier::Low,
            include_private: false,
            line_numbers: true,
            max_value_len: 80,
            format: SkeletonFormat::Text,
        }
    }
}

impl SkeletonOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_tier: config.skeleton.min_tier,
            include_private: config.skeleton.include_private,
            line_numbers: config.skeleton.line_numbers,
            max_value_len: config.skeleton.max_value_len,
            format: SkeletonFormat::Text,
        }
    }

    pub fn with_format(mut self, format: SkeletonFormat) -> Self {
        self.format = format;
        self
    }
}

/// Render the skeleton of a unit set
pub fn extract_skeleton(
    units: &[SourceUnit],
    options: &SkeletonOptions,
    classifier: &PriorityClassifier,
) -> Result<String> {
    let mut selected: Vec<(&SourceUnit, Tier)> = units
        .iter()
        .map(|u| (u, classifier.classify(&u.path)))
        .filter(|(u, tier)| !u.is_ok() || *tier >= options.min_tier)
        .collect();
    selected.sort_by(|a, b| a.0.path.cmp(&b.0.path));

    let summary = SkeletonSummary {
        files: units.len(),
        parsed: units.iter().filter(|u| u.is_ok()).count(),
        failed: units.iter().filter(|u| !u.is_ok()).count(),
        shown: selected.len(),
        size_estimate: 0,
    };

    let text = render_text(&selected, options, &summary);
    match options.format {
        SkeletonFormat::Text => Ok(text),
        SkeletonFormat::Json => {
            let document = SkeletonDocument {
                files: selected
                    .iter()
                    .map(|(unit, tier)| FileSkeleton::new(unit, *tier, options))
                    .collect(),
                summary: SkeletonSummary {
                    size_estimate: estimate(&text),
                    ..summary
                },
            };
            Ok(serde_json::to_string_pretty(&document)?)
        }
    }
}

fn render_text(
    selected: &[(&SourceUnit, Tier)],
    options: &SkeletonOptions,
    summary: &SkeletonSummary,
) -> String {
    let mut out = String::new();
    for (unit, tier) in selected {
        render_unit(&mut out, unit, *tier, options);
        out.push('\n');
    }
    out.push_str(&format!("# {}\n", batch_counts(summary.files, summary.parsed, summary.failed)));
    out
}

fn render_unit(out: &mut String, unit: &SourceUnit, tier: Tier, options: &SkeletonOptions) {
    if let Some(message) = unit.status.diagnostic() {
        out.push_str(&format!("## {} [parse error: {}]\n", unit.display_path(), message));
        return;
    }
    out.push_str(&format!("## {} [{}]\n", unit.display_path(), tier));

    for constant in &unit.constants {
        if constant.is_private() && !options.include_private {
            continue;
        }
        let value = constant.summarized_value(options.max_value_len);
        let text = match &constant.type_hint {
            Some(t) => format!("{}: {} = {}", constant.name, t, value),
            None => format!("{} = {}", constant.name, value),
        };
        push_line(out, 0, &text, constant.line, options);
    }

    for id in &unit.roots {
        render_declaration(out, unit, *id, 0, options);
    }
}

fn render_declaration(
    out: &mut String,
    unit: &SourceUnit,
    id: DeclId,
    depth: usize,
    options: &SkeletonOptions,
) {
    let decl = unit.decl(id);
    if decl.is_private() && !options.include_private {
        return;
    }

    for decorator in &decl.decorators {
        push_line(out, depth, &format!("@{}", decorator.text), decorator.line, options);
    }

    let signature = match decl.kind {
        DeclKind::Class => format!("{}:", decl.signature()),
        DeclKind::Function | DeclKind::Method => decl.signature(),
    };
    push_line(out, depth, &signature, decl.line_start, options);

    for field in &decl.fields {
        if field.is_private() && !options.include_private {
            continue;
        }
        push_line(out, depth + 1, &field.to_string(), field.line, options);
    }

    for child in &decl.children {
        render_declaration(out, unit, *child, depth + 1, options);
    }
}

fn push_line(out: &mut String, depth: usize, text: &str, line: usize, options: &SkeletonOptions) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    if options.line_numbers {
        out.push_str(&format!("  # L{}", line));
    }
    out.push('\n');
}

#[derive(Debug, Serialize)]
struct SkeletonDocument<'a> {
    files: Vec<FileSkeleton<'a>>,
    summary: SkeletonSummary,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct SkeletonSummary {
    files: usize,
    parsed: usize,
    failed: usize,
    shown: usize,
    size_estimate: usize,
}

#[derive(Debug, Serialize)]
struct FileSkeleton<'a> {
    path: String,
    module: &'a str,
    tier: Tier,
    lines: usize,
    #[serde(flatten)]
    status: &'a ParseStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    constants: Vec<ConstantView<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    declarations: Vec<DeclarationView<'a>>,
}

impl<'a> FileSkeleton<'a> {
    fn new(unit: &'a SourceUnit, tier: Tier, options: &SkeletonOptions) -> Self {
        let constants = unit
            .constants
            .iter()
            .filter(|c| options.include_private || !c.is_private())
            .map(|c| ConstantView {
                name: &c.name,
                type_hint: c.type_hint.as_deref(),
                value: c.summarized_value(options.max_value_len),
                line: c.line,
            })
            .collect();

        let declarations = unit
            .roots
            .iter()
            .filter_map(|id| DeclarationView::new(unit, *id, options))
            .collect();

        Self {
            path: unit.display_path(),
            module: &unit.module,
            tier,
            lines: unit.total_lines,
            status: &unit.status,
            constants,
            declarations,
        }
    }
}

#[derive(Debug, Serialize)]
struct ConstantView<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_hint: Option<&'a str>,
    value: String,
    line: usize,
}

#[derive(Debug, Serialize)]
struct FieldView<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    builder: Option<&'a str>,
    line: usize,
}

#[derive(Debug, Serialize)]
struct DeclarationView<'a> {
    kind: DeclKind,
    name: &'a str,
    line: usize,
    line_end: usize,
    signature: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    decorators: Vec<&'a Decorator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldView<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DeclarationView<'a>>,
}

impl<'a> DeclarationView<'a> {
    fn new(unit: &'a SourceUnit, id: DeclId, options: &SkeletonOptions) -> Option<Self> {
        let decl = unit.decl(id);
        if decl.is_private() && !options.include_private {
            return None;
        }

        let fields = decl
            .fields
            .iter()
            .filter(|f| options.include_private || !f.is_private())
            .map(|f| FieldView {
                name: &f.name,
                type_hint: f.type_hint.as_deref(),
                default: f.default.as_deref(),
                builder: f.builder.as_deref(),
                line: f.line,
            })
            .collect();

        let children = decl
            .children
            .iter()
            .filter_map(|child| DeclarationView::new(unit, *child, options))
            .collect();

        Some(Self {
            kind: decl.kind,
            name: &decl.name,
            line: decl.line_start,
            line_end: decl.line_end,
            signature: decl.signature(),
            decorators: decl.decorators.iter().collect(),
            fields,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorityRuleConfig;
    use crate::parser::{Declaration, Field, ModuleConstant, ParseStatus};
    use std::path::PathBuf;

    fn classifier() -> PriorityClassifier {
        PriorityClassifier::from_config(&[
            PriorityRuleConfig {
                pattern: "**/models.py".to_string(),
                tier: "critical".to_string(),
            },
            PriorityRuleConfig {
                pattern: "**/core/**".to_string(),
                tier: "high".to_string(),
            },
        ])
    }

    fn models_unit() -> SourceUnit {
        let mut unit = SourceUnit::new(
            PathBuf::from("pkg/models.py"),
            "pkg.models".to_string(),
            String::new(),
        );
        unit.constants.push(ModuleConstant {
            name: "DEFAULT_NAME".to_string(),
            type_hint: None,
            value: "\"anon\"".to_string(),
            line: 3,
        });
        unit.constants.push(ModuleConstant {
            name: "_cache".to_string(),
            type_hint: None,
            value: "{}".to_string(),
            line: 4,
        });

        let mut class = Declaration::new(DeclKind::Class, "User", 7);
        class.bases = vec!["Base".to_string()];
        class.decorators.push(Decorator {
            text: "dataclass(frozen=True)".to_string(),
            line: 6,
        });
        let mut name = Field::new("name", 8);
        name.type_hint = Some("str".to_string());
        class.fields.push(name);
        let class_id = unit.push_declaration(class, None);

        let mut greet = Declaration::new(DeclKind::Method, "greet", 12);
        greet
            .parameters
            .push(crate::parser::Parameter::new("self"));
        let mut other = crate::parser::Parameter::new("other");
        other.type_hint = Some("str".to_string());
        greet.parameters.push(other);
        greet.return_type = Some("str".to_string());
        unit.push_declaration(greet, Some(class_id));
        unit.push_declaration(Declaration::new(DeclKind::Method, "_hidden", 15), Some(class_id));
        unit
    }

    fn other_unit(path: &str) -> SourceUnit {
        let mut unit = SourceUnit::new(PathBuf::from(path), path.replace('/', "."), String::new());
        unit.push_declaration(Declaration::new(DeclKind::Function, "run", 1), None);
        unit
    }

    fn broken_unit() -> SourceUnit {
        SourceUnit::failed(
            PathBuf::from("pkg/broken.py"),
            "pkg.broken".to_string(),
            "def f(:\n    pass\n".to_string(),
            ParseStatus::SyntaxError {
                message: "syntax error at line 2, column 9".to_string(),
            },
        )
    }

    #[test]
    fn test_text_layout() {
        let out = extract_skeleton(&[models_unit()], &SkeletonOptions::default(), &classifier())
            .unwrap();
        let expected = "\
## pkg/models.py [critical]
DEFAULT_NAME = \"anon\"  # L3
@dataclass(frozen=True)  # L6
class User(Base):  # L7
    name: str  # L8
    def greet(self, other: str) -> str  # L12

# 1 files, 1 parsed, 0 failed
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_include_private() {
        let options = SkeletonOptions {
            include_private: true,
            ..SkeletonOptions::default()
        };
        let out = extract_skeleton(&[models_unit()], &options, &classifier()).unwrap();
        assert!(out.contains("_cache = {}  # L4"));
        assert!(out.contains("    def _hidden()  # L15"));
    }

    #[test]
    fn test_without_line_numbers() {
        let options = SkeletonOptions {
            line_numbers: false,
            ..SkeletonOptions::default()
        };
        let out = extract_skeleton(&[models_unit()], &options, &classifier()).unwrap();
        assert!(out.contains("\nclass User(Base):\n"));
        assert!(!out.contains("# L"));
    }

    #[test]
    fn test_tier_filter_is_monotonic() {
        let units = vec![
            models_unit(),
            other_unit("pkg/core/engine.py"),
            other_unit("pkg/views.py"),
        ];
        let render = |tier| {
            let options = SkeletonOptions {
                min_tier: tier,
                ..SkeletonOptions::default()
            };
            extract_skeleton(&units, &options, &classifier()).unwrap()
        };

        let critical = render(Tier::Critical);
        let high = render(Tier::High);
        let low = render(Tier::Low);

        assert!(critical.contains("## pkg/models.py"));
        assert!(!critical.contains("## pkg/core/engine.py"));
        assert!(high.contains("## pkg/models.py"));
        assert!(high.contains("## pkg/core/engine.py"));
        assert!(!high.contains("## pkg/views.py"));
        assert!(low.contains("## pkg/views.py"));
    }

    #[test]
    fn test_failed_units_always_shown() {
        let options = SkeletonOptions {
            min_tier: Tier::Critical,
            ..SkeletonOptions::default()
        };
        let out = extract_skeleton(&[models_unit(), broken_unit()], &options, &classifier())
            .unwrap();
        assert!(out.contains("## pkg/broken.py [parse error: syntax error at line 2, column 9]"));
        assert!(out.ends_with("# 2 files, 1 parsed, 1 failed\n"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let units = vec![other_unit("b.py"), models_unit(), other_unit("a.py")];
        let mut reversed = units.clone();
        reversed.reverse();

        let options = SkeletonOptions::default();
        let first = extract_skeleton(&units, &options, &classifier()).unwrap();
        let second = extract_skeleton(&reversed, &options, &classifier()).unwrap();
        assert_eq!(first, second);
        assert!(first.find("## a.py").unwrap() < first.find("## b.py").unwrap());
    }

    #[test]
    fn test_long_constant_is_summarized() {
        let mut unit = other_unit("a.py");
        unit.constants.push(ModuleConstant {
            name: "QUERY".to_string(),
            type_hint: Some("str".to_string()),
            value: format!("\"{}\"", "x".repeat(200)),
            line: 1,
        });
        let options = SkeletonOptions {
            max_value_len: 10,
            ..SkeletonOptions::default()
        };
        let out = extract_skeleton(&[unit], &options, &classifier()).unwrap();
        assert!(out.contains("QUERY: str = \"xxxxxx...  # L1"));
    }

    #[test]
    fn test_json_output() {
        let options = SkeletonOptions::default().with_format(SkeletonFormat::Json);
        let out =
            extract_skeleton(&[models_unit(), broken_unit()], &options, &classifier()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(json["summary"]["files"], 2);
        assert_eq!(json["summary"]["failed"], 1);
        assert!(json["summary"]["size_estimate"].as_u64().unwrap() > 0);

        let broken = &json["files"][0];
        assert_eq!(broken["path"], "pkg/broken.py");
        assert_eq!(broken["status"], "syntax_error");
        assert_eq!(broken["lines"], 2);

        let models = &json["files"][1];
        assert_eq!(models["status"], "ok");
        assert_eq!(models["tier"], "critical");
        let user = &models["declarations"][0];
        assert_eq!(user["line"], 7);
        assert_eq!(user["decorators"][0]["line"], 6);
        assert_eq!(user["fields"][0]["name"], "name");
        assert_eq!(user["children"].as_array().unwrap().len(), 1);
    }
}
