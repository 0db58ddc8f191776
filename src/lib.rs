//! sortodoco - a local-first file organizer
//!
//! This library plans and applies the sorting of a folder's top-level files
//! into category subfolders. Planning is pure apart from creating the session
//! folders: it walks the folder, skips ignorable entries, classifies the rest
//! by extension and produces a deterministic [`Plan`]. Applying executes the
//! plan move by move, renaming on collisions and reporting partial failures.

pub mod cli;
pub mod config;
pub mod executor;
pub mod file_category;
pub mod history;
pub mod ignore_rules;
pub mod output;
pub mod planner;

pub use config::{ConfigError, IgnoreRulesLoader};
pub use executor::{ApplyReport, apply, apply_with_progress, unique_target};
pub use file_category::{
    ExtensionIndex, ExtensionRules, MISC_CATEGORY, build_extension_index, classify,
    load_category_rules,
};
pub use ignore_rules::{IgnoreRules, SkipDecision, SkipReason, classify_skip};
pub use planner::{OpKind, Operation, Plan, PlanError, PlanFilter, Planner, plan};
