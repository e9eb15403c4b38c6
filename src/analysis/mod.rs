// Analysis module: batch loading plus the passes that run over parsed units

pub mod estimate;
pub mod graph;
pub mod imports;
pub mod priority;
pub mod survey;

pub use graph::*;
pub use priority::{PriorityClassifier, PriorityRule, Tier};
pub use survey::*;

use crate::config::{Config, IgnoreRules};
use crate::error::{Error, Result};
use crate::parser::{Language, ParseStatus, ParserSettings, PythonParser, SourceUnit};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A parsed set of source units, sorted by path
#[derive(Debug)]
pub struct Workspace {
    /// Directory the unit paths are relative to
    pub root: PathBuf,
    pub units: Vec<SourceUnit>,
}

impl Workspace {
    pub fn parsed_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.units.len() - self.parsed_count()
    }

    /// Failed units with their diagnostics
    pub fn failures(&self) -> impl Iterator<Item = (&SourceUnit, String)> {
        self.units
            .iter()
            .filter_map(|u| u.status.diagnostic().map(|d| (u, d)))
    }

    /// Error when nothing could be parsed at all
    pub fn ensure_parsed(&self) -> Result<()> {
        if !self.units.is_empty() && self.parsed_count() == 0 {
            return Err(Error::AllFilesFailed(self.units.len()));
        }
        Ok(())
    }
}

/// Discovers and parses Python files
pub struct Loader {
    settings: ParserSettings,
    ignore: IgnoreRules,
    verbose: bool,
}

impl Loader {
    pub fn new(config: &Config) -> Self {
        Self {
            settings: ParserSettings::from_config(config),
            ignore: config.ignore_rules(),
            verbose: false,
        }
    }

    /// Show a progress bar while parsing
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load a single file or every Python file under a directory
    pub fn load(&self, path: &Path) -> Result<Workspace> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }

        let (root, files) = if path.is_dir() {
            let files = self.discover_files(path)?;
            if files.is_empty() {
                return Err(Error::NoSourceFiles(path.to_path_buf()));
            }
            (path.to_path_buf(), files)
        } else {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (root, vec![path.to_path_buf()])
        };

        // Fail early if the grammar cannot be loaded at all
        PythonParser::new(self.settings.clone())?;

        info!("Parsing {} files under {}", files.len(), root.display());
        let units = self.parse_all(&root, &files);

        let workspace = Workspace { root, units };
        debug!(
            "{} parsed, {} failed",
            workspace.parsed_count(),
            workspace.failed_count()
        );
        Ok(workspace)
    }

    /// Discover all Python files in the directory, pruning ignored directories
    pub fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !self.ignore.ignores_dir(entry.file_name())
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let is_python = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Language::from_extension)
                .is_some();
            if !is_python || self.ignore.ignores_file(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    /// Parse files in parallel, one tree-sitter parser per worker
    fn parse_all(&self, root: &Path, files: &[PathBuf]) -> Vec<SourceUnit> {
        let progress = if self.verbose {
            let pb = ProgressBar::new(files.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let mut units: Vec<SourceUnit> = files
            .par_iter()
            .map_init(
                || PythonParser::new(self.settings.clone()),
                |parser, path| {
                    let relative = path.strip_prefix(root).unwrap_or(path);
                    if let Some(ref pb) = progress {
                        pb.set_message(relative.display().to_string());
                        pb.inc(1);
                    }
                    match parser {
                        Ok(parser) => parser.parse_file(path, relative),
                        Err(e) => SourceUnit::failed(
                            relative.to_path_buf(),
                            relative.display().to_string(),
                            String::new(),
                            ParseStatus::Unreadable {
                                message: e.to_string(),
                            },
                        ),
                    }
                },
            )
            .collect();

        if let Some(pb) = progress {
            pb.finish_with_message("Parsing complete");
        }

        units.sort_by(|a, b| a.path.cmp(&b.path));
        units
    }
}
