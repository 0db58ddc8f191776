//! Move planning.
//!
//! The planner walks the direct children of a root folder, drops entries the
//! skip rules reject, classifies the remaining files by extension and produces
//! a [`Plan`]: an ordered list of moves into
//! `root/<Category>/<session_ts>/<file name>` plus a per-category count.
//!
//! Planning creates the session directories but never moves anything; that is
//! the executor's job.

use crate::config::ConfigError;
use crate::file_category::{
    ExtensionIndex, ExtensionRules, build_extension_index, classify, load_category_rules,
};
use crate::ignore_rules::{IgnoreRules, casefold, classify_skip};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `strftime` format of session timestamps, e.g. `2024-05-01_13-45-09`.
pub const SESSION_TS_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Returns a session timestamp for the current local time.
pub fn new_session_ts() -> String {
    chrono::Local::now().format(SESSION_TS_FORMAT).to_string()
}

/// Errors that stop a planning run.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The root folder does not exist.
    #[error("Folder '{}' does not exist", .0.display())]
    RootNotFound(PathBuf),

    /// The root path exists but is not a directory.
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Category rules are missing, unreadable or conflicting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the root folder or creating a session directory failed.
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// The kind of a planned operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Move,
    /// Any kind this version does not know how to perform.
    #[serde(other)]
    Unsupported,
}

/// A single planned file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    /// Source path; existed when the plan was made.
    pub src: PathBuf,
    /// Intended destination before collision resolution.
    pub dst: PathBuf,
    /// Category the file was classified into.
    pub category: String,
}

/// An ordered set of operations produced by one planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Shared by every destination path in this plan.
    pub session_ts: String,
    pub ops: Vec<Operation>,
    /// Planned file count per category, including zero counts.
    pub summary: BTreeMap<String, usize>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Keeps only the operations matching `keep`, recounting the summary.
    ///
    /// Categories stay in the summary with a zero count when all their
    /// operations are removed.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Operation) -> bool,
    {
        self.ops.retain(keep);
        for count in self.summary.values_mut() {
            *count = 0;
        }
        for op in &self.ops {
            *self.summary.entry(op.category.clone()).or_insert(0) += 1;
        }
    }

    /// Returns a copy containing only the operations `filter` accepts.
    pub fn filtered(&self, filter: &PlanFilter) -> Plan {
        let mut plan = self.clone();
        plan.retain(|op| filter.matches(op));
        plan
    }
}

/// Narrows a plan by file name text and category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilter {
    /// Case-insensitive substring of the source file name. Empty matches all.
    pub search_text: String,
    /// Exact category name, or `None` for all categories.
    pub category: Option<String>,
}

impl PlanFilter {
    pub fn matches(&self, op: &Operation) -> bool {
        if let Some(category) = &self.category
            && &op.category != category
        {
            return false;
        }
        if self.search_text.is_empty() {
            return true;
        }
        let name = op
            .src
            .file_name()
            .map(|n| casefold(&n.to_string_lossy()))
            .unwrap_or_default();
        name.contains(&casefold(&self.search_text))
    }
}

/// Produces plans from explicit, already-loaded rules.
#[derive(Debug, Clone)]
pub struct Planner {
    rules: ExtensionRules,
    index: ExtensionIndex,
    ignore: IgnoreRules,
    session_ts: Option<String>,
}

impl Planner {
    /// Builds the extension index up front so conflicting rules fail here.
    pub fn new(rules: ExtensionRules, ignore: IgnoreRules) -> PlanResult<Self> {
        let index = build_extension_index(&rules)?;
        Ok(Self {
            rules,
            index,
            ignore,
            session_ts: None,
        })
    }

    /// Uses a fixed session timestamp instead of the current time.
    pub fn with_session_ts(mut self, session_ts: impl Into<String>) -> Self {
        self.session_ts = Some(session_ts.into());
        self
    }

    /// Plans the organization of `root`'s direct children.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::RootNotFound` before touching the filesystem if the
    /// root is missing, and `PlanError::Io` if a session directory cannot be
    /// created or the root cannot be listed.
    pub fn plan(&self, root: &Path) -> PlanResult<Plan> {
        check_root(root)?;

        let session_ts = self.session_ts.clone().unwrap_or_else(new_session_ts);
        let categories = self.rules.destination_categories();
        let target_dirs = ensure_session_dirs(root, &categories, &session_ts)?;

        let mut summary: BTreeMap<String, usize> =
            categories.iter().map(|cat| (cat.clone(), 0)).collect();
        let mut ops = Vec::new();

        for (name, path) in self.collect_candidates(root)? {
            let category = classify(&name.to_string_lossy(), &self.index);
            let dst = target_dirs[category].join(&name);
            log::debug!("Planned {} -> {}", path.display(), dst.display());

            ops.push(Operation {
                kind: OpKind::Move,
                src: path,
                dst,
                category: category.to_string(),
            });
            *summary.entry(category.to_string()).or_insert(0) += 1;
        }

        log::info!(
            "Planned {} moves in {} (session {})",
            ops.len(),
            root.display(),
            session_ts
        );
        Ok(Plan {
            session_ts,
            ops,
            summary,
        })
    }

    /// Lists regular files that survive the skip rules, sorted by case-folded
    /// name (raw name breaks ties so the order is total).
    fn collect_candidates(&self, root: &Path) -> PlanResult<Vec<(OsString, PathBuf)>> {
        let entries = fs::read_dir(root).map_err(|e| PlanError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<(String, OsString, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                    continue;
                }
            };
            let path = entry.path();

            let decision = classify_skip(&path, &self.ignore);
            if decision.skip {
                log::debug!("Skipped {} ({:?})", path.display(), decision.reasons);
                continue;
            }
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name();
            files.push((casefold(&name.to_string_lossy()), name, path));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(files
            .into_iter()
            .map(|(_, name, path)| (name, path))
            .collect())
    }
}

fn check_root(root: &Path) -> PlanResult<()> {
    if !root.exists() {
        return Err(PlanError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(PlanError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

/// Creates `root/<category>/<session_ts>/` for every category.
///
/// Existing directories are fine. Returns the directory for each category.
pub fn ensure_session_dirs(
    root: &Path,
    categories: &[String],
    session_ts: &str,
) -> PlanResult<HashMap<String, PathBuf>> {
    let mut target_dirs = HashMap::new();
    for category in categories {
        let session_dir = root.join(category).join(session_ts);
        fs::create_dir_all(&session_dir).map_err(|e| PlanError::Io {
            path: session_dir.clone(),
            source: e,
        })?;
        target_dirs.insert(category.clone(), session_dir);
    }
    Ok(target_dirs)
}

/// Plans `root` with category rules read from `rules_source`.
///
/// Rules are loaded and validated before any directory is created.
pub fn plan(root: &Path, rules_source: &Path, ignore: &IgnoreRules) -> PlanResult<Plan> {
    check_root(root)?;
    let rules = load_category_rules(rules_source)?;
    Planner::new(rules, ignore.clone())?.plan(root)
}
