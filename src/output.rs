//! Output formatting and styling module.
//!
//! Centralizes CLI output: colored status lines, the plan summary table, the
//! apply progress bar and the post-apply report.

use crate::executor::ApplyReport;
use crate::history::SessionSummary;
use crate::planner::Plan;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for applying `total` operations.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the per-category table of a plan, skipping empty categories.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortodoco::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("Plan Summary");

        let rows: Vec<_> = category_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .collect();

        let max_category_len = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &rows {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(**count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = max_category_len
        );
    }

    /// Prints a plan: summary table, session and optionally every move.
    pub fn plan(plan: &Plan, list_operations: bool) {
        Self::summary_table(&plan.summary, plan.len());
        println!("\n{} {}", "Total operations:".bold(), plan.len());
        println!("{} {}", "Session:".bold(), plan.session_ts);

        if list_operations && !plan.is_empty() {
            Self::header("Operations");
            for op in &plan.ops {
                let name = op
                    .src
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                println!(" - {} {} {}", name, "→".cyan(), op.dst.display());
            }
        }
    }

    /// Prints the outcome of an apply run as a partial-success summary.
    pub fn apply_report(report: &ApplyReport) {
        let line = format!(
            "{} moved, {} skipped, {} errors",
            report.moved,
            report.skipped,
            report.errors.len()
        );
        if report.errors.is_empty() {
            Self::success(&line);
        } else {
            Self::warning(&line);
            for (path, reason) in &report.errors {
                Self::error(&format!("{}: {}", path.display(), reason));
            }
        }
    }

    /// Prints past sessions, newest first.
    pub fn sessions(sessions: &[SessionSummary]) {
        if sessions.is_empty() {
            Self::info("No sessions recorded yet.");
            return;
        }
        Self::header("Session History");
        for session in sessions.iter().rev() {
            println!(
                "{}  {}  {} moved, {} skipped, {} errors ({:.0}%)",
                session.session_id.bold(),
                session.root.display(),
                session.moved,
                session.skipped,
                session.errors,
                session.success_rate()
            );
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
