//! Command-line interface module for sortodoco.
//!
//! This module handles all CLI-related functionality including:
//! - Command definitions (clap)
//! - Folder and rules-source resolution
//! - Plan / apply orchestration and session history recording
//! - Mapping errors to process exit codes

use crate::config::{ConfigError, IgnoreRulesLoader, default_config_dir};
use crate::executor::{Outcome, apply_with_progress};
use crate::file_category::{ExtensionRules, load_category_rules};
use crate::history::{HistoryError, SessionHistory, SessionSummary};
use crate::ignore_rules::IgnoreRules;
use crate::output::OutputFormatter;
use crate::planner::{Plan, PlanError, Planner};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of user category rules inside the configuration directory.
pub const EXTENSIONS_FILE: &str = "extensions.json";

/// Sort a folder into category subdirectories.
#[derive(Debug, Parser)]
#[command(name = "sortodoco", version, about = "SortoDoco - Local-first file organizer")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate an organization plan for a folder
    Plan {
        /// Folder to organize (defaults to Downloads)
        folder: Option<PathBuf>,

        #[command(flatten)]
        rules: RulesArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Also write the plan as JSON to FILE
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Plan and apply, or apply a saved plan
    Apply {
        /// Folder to organize (defaults to Downloads)
        folder: Option<PathBuf>,

        #[command(flatten)]
        rules: RulesArgs,

        /// Apply a plan previously written with `plan --save`
        #[arg(long, value_name = "FILE", conflicts_with = "folder")]
        plan: Option<PathBuf>,
    },
    /// Show past apply sessions
    History,
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RulesArgs {
    /// Path to category rules (JSON, or TOML by extension)
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Path to ignore rules JSON (instead of the user file)
    #[arg(long, value_name = "FILE")]
    pub ignore_rules: Option<PathBuf>,
}

/// Process exit codes. Usage errors exit with 2 from clap itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    NotFound = 3,
    Config = 4,
    Runtime = 10,
}

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::NotFound(_) | CliError::Plan(PlanError::RootNotFound(_)) => {
                ExitCode::NotFound
            }
            CliError::Config(_) | CliError::Plan(PlanError::Config(_)) => ExitCode::Config,
            CliError::Plan(_) | CliError::History(_) | CliError::Runtime(_) => ExitCode::Runtime,
        }
    }
}

/// Runs a parsed command line.
pub fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Plan {
            folder,
            rules,
            json,
            save,
        } => run_plan(folder, &rules, json, save.as_deref(), cli.verbose),
        Command::Apply {
            folder,
            rules,
            plan,
        } => match plan {
            Some(plan_file) => apply_saved_plan(&plan_file),
            None => run_apply(folder, &rules),
        },
        Command::History => show_history(),
        Command::Version => {
            println!("SortoDoco v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Returns `folder`, or the user's Downloads directory, checking it exists.
pub fn resolve_folder(folder: Option<PathBuf>) -> Result<PathBuf, CliError> {
    let folder = match folder {
        Some(folder) => folder,
        None => dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .ok_or_else(|| CliError::NotFound("Could not determine a Downloads folder".into()))?,
    };
    if !folder.is_dir() {
        return Err(CliError::NotFound(format!(
            "Folder '{}' does not exist",
            folder.display()
        )));
    }
    Ok(folder)
}

/// Resolves category rules in order: explicit file, user config file,
/// `./rules/extensions.json`, built-in defaults.
///
/// An explicit file that is missing or invalid is an error; the fallbacks
/// are only tried when no file was given.
pub fn resolve_category_rules(
    explicit: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<ExtensionRules, CliError> {
    if let Some(path) = explicit {
        return Ok(load_category_rules(path)?);
    }

    let candidates = config_dir
        .map(|dir| dir.join(EXTENSIONS_FILE))
        .into_iter()
        .chain(std::iter::once(PathBuf::from("rules").join(EXTENSIONS_FILE)));
    for candidate in candidates {
        if candidate.is_file() {
            log::debug!("Using category rules from {}", candidate.display());
            return Ok(load_category_rules(&candidate)?);
        }
    }

    log::debug!("Using built-in category rules");
    Ok(ExtensionRules::builtin()?)
}

fn load_ignore_rules(args: &RulesArgs, config_dir: Option<&Path>) -> IgnoreRules {
    let loader = match config_dir {
        Some(dir) => IgnoreRulesLoader::with_config_dir(dir),
        None => IgnoreRulesLoader::default(),
    };
    let loader = match &args.ignore_rules {
        Some(path) => loader.explicit_file(path),
        None => loader,
    };
    loader.load()
}

fn build_plan(folder: Option<PathBuf>, args: &RulesArgs) -> Result<(PathBuf, Plan), CliError> {
    let folder = resolve_folder(folder)?;
    let config_dir = default_config_dir();

    let rules = resolve_category_rules(args.rules.as_deref(), config_dir.as_deref())?;
    let ignore = load_ignore_rules(args, config_dir.as_deref());
    let plan = Planner::new(rules, ignore)?.plan(&folder)?;
    Ok((folder, plan))
}

fn run_plan(
    folder: Option<PathBuf>,
    args: &RulesArgs,
    json: bool,
    save: Option<&Path>,
    verbose: bool,
) -> Result<(), CliError> {
    let (folder, plan) = build_plan(folder, args)?;

    if let Some(path) = save {
        write_plan(&plan, path)?;
    }

    if json {
        let text = serde_json::to_string_pretty(&plan)
            .map_err(|e| CliError::Runtime(format!("Could not serialize plan: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    OutputFormatter::info(&format!("Planning organization for: {}", folder.display()));
    OutputFormatter::plan(&plan, verbose);
    if let Some(path) = save {
        OutputFormatter::success(&format!("Plan saved to {}", path.display()));
    }
    Ok(())
}

fn run_apply(folder: Option<PathBuf>, args: &RulesArgs) -> Result<(), CliError> {
    let (folder, plan) = build_plan(folder, args)?;
    OutputFormatter::info(&format!("Organizing contents of: {}", folder.display()));
    execute(plan, &folder)
}

fn apply_saved_plan(path: &Path) -> Result<(), CliError> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::NotFound(format!("Plan file '{}' does not exist", path.display()))
        } else {
            CliError::Config(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    })?;
    let plan: Plan = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        origin: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let root = common_root(&plan).unwrap_or_else(|| PathBuf::from("."));
    OutputFormatter::info(&format!("Applying saved plan {}", path.display()));
    execute(plan, &root)
}

/// The folder the plan was made for: the parent of its first source.
fn common_root(plan: &Plan) -> Option<PathBuf> {
    plan.ops
        .first()
        .and_then(|op| op.src.parent())
        .map(Path::to_path_buf)
}

fn execute(plan: Plan, root: &Path) -> Result<(), CliError> {
    if plan.is_empty() {
        OutputFormatter::info("No files found to organize.");
        return Ok(());
    }

    let session_id = plan.session_ts.clone();
    let pb = OutputFormatter::create_progress_bar(plan.len() as u64);
    let report = apply_with_progress(plan, |step| {
        if let Outcome::Failed { .. } = step.outcome {
            pb.set_message(format!("failed: {}", step.src.display()));
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    OutputFormatter::apply_report(&report);
    record_session(SessionSummary::from_report(&session_id, root, &report));
    Ok(())
}

fn record_session(session: SessionSummary) {
    let Some(config_dir) = default_config_dir() else {
        return;
    };
    if let Err(e) = SessionHistory::in_dir(&config_dir).append(session) {
        log::warn!("Could not record session history: {}", e);
    }
}

fn show_history() -> Result<(), CliError> {
    let Some(config_dir) = default_config_dir() else {
        OutputFormatter::info("No configuration directory available.");
        return Ok(());
    };
    let sessions = SessionHistory::in_dir(&config_dir).load()?;
    OutputFormatter::sessions(&sessions);
    Ok(())
}

fn write_plan(plan: &Plan, path: &Path) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(plan)
        .map_err(|e| CliError::Runtime(format!("Could not serialize plan: {}", e)))?;
    fs::write(path, text)
        .map_err(|e| CliError::Runtime(format!("Could not write {}: {}", path.display(), e)))
}
