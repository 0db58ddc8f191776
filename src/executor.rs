/// Plan execution.
///
/// This module applies a [`Plan`] to the filesystem one operation at a time, in
/// plan order. Destination collisions are resolved at move time with
/// [`unique_target`], so nothing is ever overwritten. A failing operation is
/// recorded in the [`ApplyReport`] and the batch carries on with the next one.
///
/// Hosts that need progress or cancellation can drive [`ApplySteps`] directly
/// and stop pulling between operations.
use crate::planner::{OpKind, Operation, Plan};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns `dst` if it is free, otherwise the first free `stem (N).ext`
/// sibling, counting up from 1.
///
/// Existence is checked against the live filesystem, so on case-insensitive
/// filesystems names differing only in case count as collisions. Symlinks are
/// not followed: a dangling link still occupies its name.
///
/// A trailing dot is part of the stem, so `notes.` becomes `notes. (1)`.
///
/// # Examples
///
/// ```no_run
/// use sortodoco::executor::unique_target;
/// use std::path::Path;
///
/// // With `report.txt` already present:
/// let target = unique_target(Path::new("/tmp/out/report.txt"));
/// assert_eq!(target, Path::new("/tmp/out/report (1).txt"));
/// ```
pub fn unique_target(dst: &Path) -> PathBuf {
    if !is_occupied(dst) {
        return dst.to_path_buf();
    }

    let parent = dst.parent().unwrap_or_else(|| Path::new(""));
    let (stem, suffix) = match dst.extension().filter(|ext| !ext.is_empty()) {
        Some(ext) => (
            dst.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            format!(".{}", ext.to_string_lossy()),
        ),
        None => (
            dst.file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            String::new(),
        ),
    };

    let mut i: u64 = 1;
    loop {
        let candidate = parent.join(format!("{} ({}){}", stem, i, suffix));
        if !is_occupied(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Coarse classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Permission,
    NotFound,
    Other,
}

impl FailureKind {
    fn from_io(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::Permission,
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Other,
        }
    }

    /// Prefix used in human-readable reasons.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::NotFound => "notfound",
            Self::Other => "error",
        }
    }
}

/// What happened to a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file now lives at `target`.
    Moved { target: PathBuf },
    /// The operation kind is not supported and was left alone.
    Skipped,
    /// The move failed; nothing was changed for this operation.
    Failed { kind: FailureKind, reason: String },
}

/// Per-operation result yielded by [`ApplySteps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpOutcome {
    pub src: PathBuf,
    pub outcome: Outcome,
}

/// Aggregate result of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub moved: usize,
    pub skipped: usize,
    /// Failed source paths with a reason such as `"permission: ..."`.
    pub errors: Vec<(PathBuf, String)>,
}

impl ApplyReport {
    /// Folds one operation outcome into the report.
    pub fn record(&mut self, outcome: &OpOutcome) {
        match &outcome.outcome {
            Outcome::Moved { .. } => self.moved += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed { reason, .. } => {
                self.errors.push((outcome.src.clone(), reason.clone()));
            }
        }
    }

    /// Total number of operations processed.
    pub fn total(&self) -> usize {
        self.moved + self.skipped + self.errors.len()
    }

    /// Percentage of processed operations that moved. 100 for an empty run.
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 100.0;
        }
        self.moved as f64 / total as f64 * 100.0
    }

    /// Returns true if nothing was skipped and nothing failed.
    pub fn is_complete_success(&self) -> bool {
        self.skipped == 0 && self.errors.is_empty()
    }
}

/// Resumable, operation-by-operation application of a plan.
///
/// Each call to `next` performs exactly one operation.
#[derive(Debug)]
pub struct ApplySteps {
    ops: std::vec::IntoIter<Operation>,
}

impl ApplySteps {
    /// Operations not yet applied.
    pub fn remaining(&self) -> usize {
        self.ops.len()
    }
}

impl Iterator for ApplySteps {
    type Item = OpOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let op = self.ops.next()?;
        let outcome = apply_operation(&op);
        Some(OpOutcome {
            src: op.src,
            outcome,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ops.size_hint()
    }
}

/// Starts a step-wise application of `plan`.
pub fn steps(plan: Plan) -> ApplySteps {
    ApplySteps {
        ops: plan.ops.into_iter(),
    }
}

/// Applies every operation in `plan` and reports the results.
///
/// Per-file failures never abort the batch.
pub fn apply(plan: Plan) -> ApplyReport {
    apply_with_progress(plan, |_| {})
}

/// Like [`apply`], calling `progress` after each operation.
pub fn apply_with_progress<F>(plan: Plan, mut progress: F) -> ApplyReport
where
    F: FnMut(&OpOutcome),
{
    log::info!(
        "Applying {} operations from session {}",
        plan.ops.len(),
        plan.session_ts
    );
    let mut report = ApplyReport::default();
    for outcome in steps(plan) {
        report.record(&outcome);
        progress(&outcome);
    }
    log::info!(
        "Applied plan: {} moved, {} skipped, {} errors",
        report.moved,
        report.skipped,
        report.errors.len()
    );
    report
}

fn apply_operation(op: &Operation) -> Outcome {
    if op.kind != OpKind::Move {
        log::debug!("Skipping unsupported operation for {}", op.src.display());
        return Outcome::Skipped;
    }

    let target = unique_target(&op.dst);
    let result = ensure_parent(&target).and_then(|()| move_file(&op.src, &target));

    match result {
        Ok(()) => {
            log::debug!("Moved {} -> {}", op.src.display(), target.display());
            Outcome::Moved { target }
        }
        Err(e) => {
            let kind = FailureKind::from_io(&e);
            log::warn!("Failed to move {}: {}", op.src.display(), e);
            Outcome::Failed {
                kind,
                reason: format!("{}: {}", kind.label(), e),
            }
        }
    }
}

fn ensure_parent(target: &Path) -> io::Result<()> {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Renames `src` to `target`, falling back to copy + delete across volumes.
fn move_file(src: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(src, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, target)?;
            fs::remove_file(src).inspect_err(|_| {
                let _ = fs::remove_file(target);
            })
        }
        Err(e) => Err(e),
    }
}
