//! Skelmap - compact structural maps of Python codebases
//!
//! Parses Python sources into structural facts, renders body-free skeletons
//! filtered by priority tier, and builds module dependency graphs with cycle
//! detection.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;

// Re-export main types
pub use analysis::{DependencyGraph, GraphOptions, Loader, PriorityClassifier, Tier, Workspace};
pub use config::Config;
pub use error::{Error, Result};
pub use output::{extract_skeleton, SkeletonFormat, SkeletonOptions};
pub use parser::{ParserSettings, PythonParser, SourceUnit};
