// Priority classification of file paths
//
// Rules are evaluated in order and the first matching glob wins.
// Files no rule matches fall into the lowest tier.

use crate::config::PriorityRuleConfig;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Priority tier, ordered from least to most important
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
            Tier::Critical => "critical",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Tier::Low),
            "medium" | "med" => Ok(Tier::Medium),
            "high" => Ok(Tier::High),
            "critical" | "crit" => Ok(Tier::Critical),
            other => Err(format!("unknown priority tier '{}'", other)),
        }
    }
}

/// A compiled priority rule
#[derive(Debug, Clone)]
pub struct PriorityRule {
    pub pattern: Pattern,
    pub tier: Tier,
}

impl PriorityRule {
    /// Compile a rule; `None` when the glob or tier is malformed
    pub fn compile(raw: &PriorityRuleConfig) -> Option<Self> {
        let tier = match raw.tier.parse::<Tier>() {
            Ok(tier) => tier,
            Err(e) => {
                warn!("Skipping priority rule '{}': {}", raw.pattern, e);
                return None;
            }
        };

        match Pattern::new(&raw.pattern) {
            Ok(pattern) => Some(Self { pattern, tier }),
            Err(e) => {
                warn!("Skipping priority rule '{}': {}", raw.pattern, e);
                None
            }
        }
    }
}

/// Maps relative file paths to priority tiers
#[derive(Debug, Clone, Default)]
pub struct PriorityClassifier {
    rules: Vec<PriorityRule>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PriorityClassifier {
    pub fn new(rules: Vec<PriorityRule>) -> Self {
        Self { rules }
    }

    /// Build from config rules, dropping malformed ones with a warning
    pub fn from_config(rules: &[PriorityRuleConfig]) -> Self {
        Self::new(rules.iter().filter_map(PriorityRule::compile).collect())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify a path relative to the analysis root
    pub fn classify(&self, relative: &Path) -> Tier {
        let normalized = relative.to_string_lossy().replace('\\', "/");
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches_with(&normalized, MATCH_OPTIONS))
            .map(|rule| rule.tier)
            .unwrap_or(Tier::Low)
    }
}
