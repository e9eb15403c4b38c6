use crate::analysis::priority::{PriorityClassifier, Tier};
use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use tracing::warn;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "skelmap.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ignore: IgnoreConfig,
    pub priority: PriorityConfig,
    pub parser: ParserConfig,
    pub skeleton: SkeletonConfig,
    pub survey: SurveyConfig,
    pub graph: GraphConfig,
}

/// Paths skipped by discovery and the surveyor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Directory names, matched against any path component
    pub dirs: Vec<String>,
    /// File extensions without the leading dot
    pub extensions: Vec<String>,
    /// Globs matched against the file name
    pub globs: Vec<String>,
}

/// Ordered glob -> tier rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub rules: Vec<PriorityRuleConfig>,
}

/// A priority rule as written in the config file.
///
/// The tier stays a string here so a typo only drops that one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRuleConfig {
    pub pattern: String,
    pub tier: String,
}

/// Structural parser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Call names recognised as declarative field builders in class bodies
    pub field_builders: Vec<String>,
}

/// Skeleton rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    pub min_tier: Tier,
    pub include_private: bool,
    pub line_numbers: bool,
    /// Longest constant value rendered before it is summarized
    pub max_value_len: usize,
}

/// Directory survey settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Size estimate above which a file gets a large-file warning
    pub large_file_threshold: usize,
}

/// Dependency graph settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Dotted name of the root package; prefixes every module identity
    pub package_root: Option<String>,
    /// Mermaid layout direction (TB, LR, BT, RL)
    pub direction: String,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        let dirs = [
            ".git",
            "__pycache__",
            "venv",
            ".venv",
            "node_modules",
            ".tox",
            ".eggs",
            ".mypy_cache",
            ".pytest_cache",
            "build",
            "dist",
        ];
        let extensions = [
            "pyc", "pyo", "so", "dll", "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "gz",
        ];
        Self {
            dirs: dirs.iter().map(|s| s.to_string()).collect(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            globs: vec!["*.egg-info".to_string(), "*.min.js".to_string()],
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let rules = [
            ("**/tests/**", "low"),
            ("**/test_*.py", "low"),
            ("**/conftest.py", "low"),
            ("**/models.py", "critical"),
            ("**/models/**", "critical"),
            ("**/schemas.py", "critical"),
            ("**/schemas/**", "critical"),
            ("**/types.py", "critical"),
            ("**/data_structures.py", "critical"),
            ("**/config.py", "critical"),
            ("**/settings.py", "critical"),
            ("**/core/**", "high"),
            ("**/api/**", "high"),
            ("**/services/**", "high"),
            ("**/db/**", "high"),
            ("**/main.py", "high"),
            ("**/utils/**", "medium"),
            ("**/helpers/**", "medium"),
        ];
        Self {
            rules: rules
                .iter()
                .map(|(pattern, tier)| PriorityRuleConfig {
                    pattern: pattern.to_string(),
                    tier: tier.to_string(),
                })
                .collect(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        let builders = [
            "field",
            "Field",
            "Column",
            "mapped_column",
            "relationship",
            "ib",
            "attrib",
        ];
        Self {
            field_builders: builders.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            min_tier: Tier::Low,
            include_private: false,
            line_numbers: true,
            max_value_len: 80,
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: 8000,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            package_root: None,
            direction: "LR".to_string(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        package_root: Option<String>,
        min_tier: Option<Tier>,
        include_private: bool,
        no_line_numbers: bool,
    ) {
        if let Some(root) = package_root {
            self.graph.package_root = Some(root);
        }

        if let Some(tier) = min_tier {
            self.skeleton.min_tier = tier;
        }

        if include_private {
            self.skeleton.include_private = true;
        }

        if no_line_numbers {
            self.skeleton.line_numbers = false;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.skeleton.max_value_len < 8 {
            return Err(Error::config_validation("max_value_len must be at least 8"));
        }

        if self.survey.large_file_threshold == 0 {
            return Err(Error::config_validation(
                "large_file_threshold must be at least 1",
            ));
        }

        if !matches!(self.graph.direction.as_str(), "TB" | "TD" | "LR" | "BT" | "RL") {
            return Err(Error::config_validation(format!(
                "unknown diagram direction: {}",
                self.graph.direction
            )));
        }

        if let Some(root) = &self.graph.package_root {
            if root.is_empty() || root.split('.').any(|part| part.is_empty()) {
                return Err(Error::config_validation(format!(
                    "invalid package root: '{}'",
                    root
                )));
            }
        }

        Ok(())
    }

    /// Compile the ignore section, skipping malformed globs
    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::compile(&self.ignore)
    }

    /// Compile the priority section, skipping malformed rules
    pub fn priority_classifier(&self) -> PriorityClassifier {
        PriorityClassifier::from_config(&self.priority.rules)
    }
}

/// Compiled ignore rules: any match excludes the path
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    dirs: HashSet<String>,
    extensions: HashSet<String>,
    globs: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn compile(config: &IgnoreConfig) -> Self {
        let mut globs = Vec::new();
        for raw in &config.globs {
            match Pattern::new(raw) {
                Ok(pattern) => globs.push(pattern),
                Err(e) => warn!("Skipping malformed ignore glob '{}': {}", raw, e),
            }
        }

        Self {
            dirs: config.dirs.iter().cloned().collect(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            globs,
        }
    }

    /// Check whether a directory should be skipped (by its own name)
    pub fn ignores_dir(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        self.dirs.contains(name.as_ref()) || self.globs.iter().any(|g| g.matches(&name))
    }

    /// Check whether a file should be skipped
    pub fn ignores_file(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            if self.extensions.contains(&ext.to_string_lossy().to_lowercase()) {
                return true;
            }
        }

        match path.file_name() {
            Some(name) => {
                let name = name.to_string_lossy();
                self.globs.iter().any(|g| g.matches(&name))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.skeleton.min_tier, Tier::Low);
        assert!(config.skeleton.line_numbers);
        assert!(!config.skeleton.include_private);
        assert_eq!(config.graph.direction, "LR");
        assert!(config.parser.field_builders.contains(&"field".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[ignore]
dirs = ["vendor"]

[[priority.rules]]
pattern = "**/domain/**"
tier = "critical"

[parser]
field_builders = ["field", "Attr"]

[skeleton]
min_tier = "high"
max_value_len = 40

[graph]
package_root = "shop"
direction = "TB"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.ignore.dirs, vec!["vendor".to_string()]);
        assert_eq!(config.priority.rules.len(), 1);
        assert_eq!(config.parser.field_builders.len(), 2);
        assert_eq!(config.skeleton.min_tier, Tier::High);
        assert_eq!(config.skeleton.max_value_len, 40);
        assert_eq!(config.graph.package_root.as_deref(), Some("shop"));
        assert_eq!(config.graph.direction, "TB");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/skelmap.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_on_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[graph]\ndirection = \"sideways\"").unwrap();
        let config = Config::load_or_default(file.path());
        assert_eq!(config.graph.direction, "LR");
    }

    #[test]
    fn test_validation_max_value_len() {
        let mut config = Config::default();
        config.skeleton.max_value_len = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_package_root() {
        let mut config = Config::default();
        config.graph.package_root = Some("shop..core".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::default();
        config.merge_cli(Some("shop".to_string()), Some(Tier::Critical), true, true);
        assert_eq!(config.graph.package_root.as_deref(), Some("shop"));
        assert_eq!(config.skeleton.min_tier, Tier::Critical);
        assert!(config.skeleton.include_private);
        assert!(!config.skeleton.line_numbers);
    }

    #[test]
    fn test_merge_cli_keeps_config_values() {
        let mut config = Config::default();
        config.graph.package_root = Some("shop".to_string());
        config.merge_cli(None, None, false, false);
        assert_eq!(config.graph.package_root.as_deref(), Some("shop"));
        assert!(config.skeleton.line_numbers);
    }

    #[test]
    fn test_ignore_rules_skip_malformed_glob() {
        let ignore = IgnoreConfig {
            dirs: vec![],
            extensions: vec![],
            globs: vec!["[".to_string(), "*.log".to_string()],
        };
        let rules = IgnoreRules::compile(&ignore);
        assert_eq!(rules.globs.len(), 1);
        assert!(rules.ignores_file(Path::new("debug.log")));
    }

    #[test]
    fn test_ignore_rules_defaults() {
        let rules = Config::default().ignore_rules();
        assert!(rules.ignores_dir(OsStr::new("__pycache__")));
        assert!(rules.ignores_file(Path::new("pkg/mod.pyc")));
        assert!(!rules.ignores_file(Path::new("pkg/mod.py")));
    }
}
