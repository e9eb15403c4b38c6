//! CLI argument parsing

use crate::analysis::Tier;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compact structural maps of Python codebases
#[derive(Parser, Debug)]
#[command(name = "skelmap")]
#[command(about = "Compact structural maps of Python codebases")]
#[command(version)]
pub struct Args {
    /// Config file path (defaults to ./skelmap.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging and a progress bar
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize file counts and size estimates of a directory tree
    Survey {
        /// Root directory to survey
        root: PathBuf,

        /// Only print root totals and warnings
        #[arg(long)]
        summary: bool,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Print signatures, fields and constants without bodies
    Skeleton {
        /// A Python file or a directory
        path: PathBuf,

        /// Minimum priority tier to include (low, medium, high, critical)
        #[arg(short, long)]
        priority: Option<Tier>,

        /// Include private (underscore-prefixed) names
        #[arg(long)]
        include_private: bool,

        /// Omit the `# L<n>` line suffixes
        #[arg(long)]
        no_line_numbers: bool,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the module dependency graph
    Graph {
        /// Root directory of the codebase
        root: PathBuf,

        /// Dotted name of the root package
        #[arg(long)]
        package: Option<String>,

        /// Keep only modules containing this keyword and their neighbours
        #[arg(long)]
        focus: Option<String>,

        /// Emit a Mermaid diagram
        #[arg(long, conflicts_with = "json")]
        mermaid: bool,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_defaults() {
        let args = Args::try_parse_from(["skelmap", "survey", "./src"]).unwrap();
        assert!(!args.verbose);
        assert!(args.config.is_none());
        match args.command {
            Command::Survey { root, summary, json } => {
                assert_eq!(root, PathBuf::from("./src"));
                assert!(!summary);
                assert!(!json);
            }
            _ => panic!("Expected Survey command"),
        }
    }

    #[test]
    fn test_skeleton_with_options() {
        let args = Args::try_parse_from([
            "skelmap",
            "skeleton",
            "./project",
            "--priority",
            "high",
            "--include-private",
            "--no-line-numbers",
            "--json",
            "--config",
            "custom.toml",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        match args.command {
            Command::Skeleton {
                path,
                priority,
                include_private,
                no_line_numbers,
                json,
            } => {
                assert_eq!(path, PathBuf::from("./project"));
                assert_eq!(priority, Some(Tier::High));
                assert!(include_private);
                assert!(no_line_numbers);
                assert!(json);
            }
            _ => panic!("Expected Skeleton command"),
        }
    }

    #[test]
    fn test_skeleton_rejects_unknown_tier() {
        let result = Args::try_parse_from(["skelmap", "skeleton", ".", "--priority", "urgent"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_graph_with_options() {
        let args = Args::try_parse_from([
            "skelmap", "graph", "./src", "--package", "shop", "--focus", "orders", "--mermaid",
        ])
        .unwrap();
        match args.command {
            Command::Graph {
                root,
                package,
                focus,
                mermaid,
                json,
            } => {
                assert_eq!(root, PathBuf::from("./src"));
                assert_eq!(package.as_deref(), Some("shop"));
                assert_eq!(focus.as_deref(), Some("orders"));
                assert!(mermaid);
                assert!(!json);
            }
            _ => panic!("Expected Graph command"),
        }
    }

    #[test]
    fn test_graph_mermaid_conflicts_with_json() {
        let result = Args::try_parse_from(["skelmap", "graph", ".", "--mermaid", "--json"]);
        assert!(result.is_err());
    }
}
