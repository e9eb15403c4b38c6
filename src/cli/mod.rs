//! CLI module for Skelmap

mod args;

pub use args::{Args, Command};

use crate::analysis::{survey, DependencyGraph, GraphOptions, Loader, SurveyOptions, Workspace};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{
    batch_counts, extract_skeleton, render_adjacency, DiagramGenerator, SkeletonFormat,
    SkeletonOptions,
};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();
    init_logging(args.verbose);

    match execute(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the level picked by `--verbose`
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Explicit config paths must load; the default file is optional
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
            info!("Loading config from {}", path.display());
            Config::load(path)
        }
        None => Ok(Config::load_or_default(Path::new(DEFAULT_CONFIG_FILE))),
    }
}

fn execute(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Survey {
            root,
            summary,
            json,
        } => {
            config.validate()?;
            let report = survey(
                &root,
                &config.ignore_rules(),
                &SurveyOptions::from_config(&config),
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if summary {
                print!("{}", report.render_summary());
            } else {
                print!("{}", report.render_tree());
            }
            Ok(())
        }

        Command::Skeleton {
            path,
            priority,
            include_private,
            no_line_numbers,
            json,
        } => {
            config.merge_cli(None, priority, include_private, no_line_numbers);
            config.validate()?;

            let workspace = Loader::new(&config).with_verbose(args.verbose).load(&path)?;
            report_failures(&workspace);

            let format = if json {
                SkeletonFormat::Json
            } else {
                SkeletonFormat::Text
            };
            let options = SkeletonOptions::from_config(&config).with_format(format);
            let output = extract_skeleton(&workspace.units, &options, &config.priority_classifier())?;
            print!("{}", output);
            if json {
                println!();
            }

            workspace.ensure_parsed()
        }

        Command::Graph {
            root,
            package,
            focus,
            mermaid,
            json,
        } => {
            config.merge_cli(package, None, false, false);
            config.validate()?;

            if !root.exists() {
                return Err(Error::PathNotFound(root));
            }
            if !root.is_dir() {
                return Err(Error::NotADirectory(root));
            }

            let workspace = Loader::new(&config).with_verbose(args.verbose).load(&root)?;
            report_failures(&workspace);

            let mut graph = DependencyGraph::build(&workspace.units, &GraphOptions::from_config(&config));
            if let Some(keyword) = focus {
                graph = match graph.focus(&keyword) {
                    Ok(focused) => focused,
                    Err(Error::EmptyFocus(keyword)) => {
                        eprintln!("No module matches focus '{}'", keyword);
                        if json {
                            let empty = serde_json::json!({ "empty_focus": keyword });
                            println!("{}", serde_json::to_string_pretty(&empty)?);
                        }
                        return workspace.ensure_parsed();
                    }
                    Err(e) => return Err(e),
                };
            }

            let counts = batch_counts(
                workspace.units.len(),
                workspace.parsed_count(),
                workspace.failed_count(),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&graph.report())?);
            } else if mermaid {
                let generator = DiagramGenerator::new().with_direction(&config.graph.direction);
                println!("{}", generator.generate_dependency_graph(&graph));
                println!("%% {}", counts);
            } else {
                print!("{}", render_adjacency(&graph));
                println!("# {}", counts);
            }

            workspace.ensure_parsed()
        }
    }
}

/// Per-file failures go to stderr so stdout stays machine-readable
fn report_failures(workspace: &Workspace) {
    for (unit, message) in workspace.failures() {
        eprintln!("warning: {}: {}", unit.display_path(), message);
    }
    debug!(
        "{} files, {} parsed, {} failed",
        workspace.units.len(),
        workspace.parsed_count(),
        workspace.failed_count()
    );
    if workspace.failed_count() > 0 {
        eprintln!(
            "Parsed {} of {} files ({} failed)",
            workspace.parsed_count(),
            workspace.units.len(),
            workspace.failed_count()
        );
    }
}
