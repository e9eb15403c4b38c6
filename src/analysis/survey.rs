// Directory survey: file counts and size estimates aggregated bottom-up
//
// Every non-ignored file is counted, not just Python sources. Ignored
// directories are never entered.

use crate::analysis::estimate::estimate_bytes;
use crate::config::{Config, IgnoreRules};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Survey settings
#[derive(Debug, Clone)]
pub struct SurveyOptions {
    /// Estimate above which a file is reported as large
    pub large_file_threshold: usize,
}

impl SurveyOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            large_file_threshold: config.survey.large_file_threshold,
        }
    }
}

impl Default for SurveyOptions {
    fn default() -> Self {
        Self {
            large_file_threshold: 8000,
        }
    }
}

/// A file or directory with its aggregated totals
#[derive(Debug, Clone, Serialize)]
pub struct SurveyNode {
    /// Path relative to the survey root, `/`-separated; the root itself is `.`
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub file_count: usize,
    pub size_estimate: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SurveyNode>,
}

/// A file whose estimate exceeds the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeFile {
    pub path: String,
    pub size_estimate: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyReport {
    pub root: SurveyNode,
    pub threshold: usize,
    pub large_files: Vec<LargeFile>,
    /// Files that could not be read; counted with a zero estimate
    pub unreadable: Vec<String>,
}

impl SurveyReport {
    /// Indented tree, one entry per line
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        render_node(&mut out, &self.root, 0);
        self.render_warnings(&mut out);
        out
    }

    /// Root totals and warnings only
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}: {} files, ~{} estimated",
            self.root.name, self.root.file_count, self.root.size_estimate
        );
        self.render_warnings(&mut out);
        out
    }

    fn render_warnings(&self, out: &mut String) {
        for large in &self.large_files {
            let _ = writeln!(
                out,
                "warning: large file {} (~{} > {})",
                large.path, large.size_estimate, self.threshold
            );
        }
        for path in &self.unreadable {
            let _ = writeln!(out, "warning: unreadable file {}", path);
        }
    }
}

fn render_node(out: &mut String, node: &SurveyNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_dir {
        let _ = writeln!(
            out,
            "{}{}/ ({} files, ~{})",
            indent, node.name, node.file_count, node.size_estimate
        );
    } else {
        let _ = writeln!(out, "{}{} (~{})", indent, node.name, node.size_estimate);
    }
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

/// Survey a directory tree
pub fn survey(root: &Path, ignore: &IgnoreRules, options: &SurveyOptions) -> Result<SurveyReport> {
    if !root.exists() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(Error::NotADirectory(root.to_path_buf()));
    }

    let mut surveyor = Surveyor {
        root,
        ignore,
        threshold: options.large_file_threshold,
        large_files: Vec::new(),
        unreadable: Vec::new(),
    };

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());
    let mut node = surveyor.directory(root, ".".to_string(), name, true)?;
    node.path = ".".to_string();

    let mut large_files = surveyor.large_files;
    large_files.sort_by(|a, b| a.path.cmp(&b.path));
    let mut unreadable = surveyor.unreadable;
    unreadable.sort();

    debug!(
        "Surveyed {} files under {}",
        node.file_count,
        root.display()
    );
    Ok(SurveyReport {
        root: node,
        threshold: options.large_file_threshold,
        large_files,
        unreadable,
    })
}

struct Surveyor<'a> {
    root: &'a Path,
    ignore: &'a IgnoreRules,
    threshold: usize,
    large_files: Vec<LargeFile>,
    unreadable: Vec<String>,
}

impl<'a> Surveyor<'a> {
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn directory(
        &mut self,
        dir: &Path,
        relative: String,
        name: String,
        is_root: bool,
    ) -> Result<SurveyNode> {
        let mut node = SurveyNode {
            path: relative,
            name,
            is_dir: true,
            file_count: 0,
            size_estimate: 0,
            children: Vec::new(),
        };

        let listing = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in listing {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_root && e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type();

            let child = if file_type.is_dir() {
                if self.ignore.ignores_dir(entry.file_name()) {
                    continue;
                }
                let relative = self.relative(path);
                self.directory(path, relative, name, false)?
            } else if file_type.is_file() {
                if self.ignore.ignores_file(path) {
                    continue;
                }
                self.file(path, name)
            } else {
                continue;
            };

            node.file_count += child.file_count;
            node.size_estimate += child.size_estimate;
            node.children.push(child);
        }

        Ok(node)
    }

    fn file(&mut self, path: &Path, name: String) -> SurveyNode {
        let relative = self.relative(path);
        let size_estimate = match std::fs::read(path) {
            Ok(bytes) => estimate_bytes(&bytes),
            Err(e) => {
                warn!("Cannot read {}: {}", relative, e);
                self.unreadable.push(relative.clone());
                0
            }
        };

        if size_estimate > self.threshold {
            self.large_files.push(LargeFile {
                path: relative.clone(),
                size_estimate,
            });
        }

        SurveyNode {
            path: relative,
            name,
            is_dir: false,
            file_count: 1,
            size_estimate,
            children: Vec::new(),
        }
    }
}
