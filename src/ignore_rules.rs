//! Skip rules for directory entries.
//!
//! [`IgnoreRules`] is the immutable, case-folded rule set consumed by the
//! planner. [`classify_skip`] evaluates a single path against it and reports
//! whether the entry is skipped and why. Checks run in a fixed order:
//!
//! 1. Master switch (`enabled == false` never skips)
//! 2. Allow-list of exact names (always wins)
//! 3. Directories, when `ignore_dirs` is set
//! 4. Hidden entries (dotfiles, and the hidden attribute on Windows)
//! 5. Exact filename match
//! 6. Filename suffix match
//! 7. Glob pattern match against the case-folded filename

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Why an entry was excluded from planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// The entry is a directory.
    IsDir,
    /// The filename ends with an ignored suffix.
    Suffix,
    /// The filename is listed verbatim.
    NameExact,
    /// The filename matches an ignored glob pattern.
    Glob,
    /// The entry carries the platform hidden attribute (Windows).
    HiddenAttr,
    /// The filename starts with a dot.
    HiddenDotfile,
}

/// Outcome of evaluating one entry against [`IgnoreRules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipDecision {
    pub skip: bool,
    pub reasons: BTreeSet<SkipReason>,
}

impl SkipDecision {
    fn keep() -> Self {
        Self::default()
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            skip: true,
            reasons: BTreeSet::from([reason]),
        }
    }
}

/// Case-folds a filename or rule string for case-insensitive comparison.
///
/// Uses full Unicode default case folding, so `STRAßE` and `strasse` fold to
/// the same string.
pub fn casefold(value: &str) -> String {
    caseless::default_case_fold_str(value)
}

/// Immutable skip-rule configuration.
///
/// Every string field is stored case-folded. Construct it through
/// [`IgnoreRules::builder`], which normalizes raw input, drops empty entries,
/// removes duplicates and compiles the glob patterns once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    enabled: bool,
    ignore_dirs: bool,
    hidden: bool,
    names_cf: BTreeSet<String>,
    allow_names_cf: BTreeSet<String>,
    suffixes_cf: Vec<String>,
    globs_cf: Vec<String>,
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn builder() -> IgnoreRulesBuilder {
        IgnoreRulesBuilder::default()
    }

    /// Rules that never skip anything.
    pub fn disabled() -> Self {
        Self::builder().enabled(false).build()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn ignore_dirs(&self) -> bool {
        self.ignore_dirs
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn names_cf(&self) -> &BTreeSet<String> {
        &self.names_cf
    }

    pub fn allow_names_cf(&self) -> &BTreeSet<String> {
        &self.allow_names_cf
    }

    pub fn suffixes_cf(&self) -> &[String] {
        &self.suffixes_cf
    }

    pub fn globs_cf(&self) -> &[String] {
        &self.globs_cf
    }

    /// Shorthand for `classify_skip(path, self).skip`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        classify_skip(path, self).skip
    }

    fn matches_glob(&self, name_cf: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(name_cf, options))
    }
}

/// Rules with the switches on but no names, suffixes, globs or allow-list.
///
/// This only skips directories and hidden entries. The shipped junk lists
/// come from `config::builtin_ignore_rules`.
impl Default for IgnoreRules {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Collects raw, mixed-case rule input and produces a normalized [`IgnoreRules`].
#[derive(Debug, Clone)]
pub struct IgnoreRulesBuilder {
    enabled: bool,
    ignore_dirs: bool,
    hidden: bool,
    names: Vec<String>,
    allow_names: Vec<String>,
    suffixes: Vec<String>,
    globs: Vec<String>,
}

impl Default for IgnoreRulesBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_dirs: true,
            hidden: true,
            names: Vec::new(),
            allow_names: Vec::new(),
            suffixes: Vec::new(),
            globs: Vec::new(),
        }
    }
}

impl IgnoreRulesBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ignore_dirs(mut self, ignore_dirs: bool) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn allow_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allow_names
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.suffixes
            .extend(suffixes.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn globs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.globs
            .extend(globs.into_iter().map(|g| g.as_ref().to_string()));
        self
    }

    /// Normalizes and freezes the collected rules.
    ///
    /// Glob patterns that fail to compile are dropped with a warning; a bad
    /// pattern never makes the rule set unusable.
    pub fn build(self) -> IgnoreRules {
        let globs_cf: Vec<String> = normalize_ordered(self.globs)
            .into_iter()
            .filter(|glob| match Pattern::new(glob) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Dropping invalid ignore glob '{}': {}", glob, e);
                    false
                }
            })
            .collect();
        let patterns = globs_cf
            .iter()
            .filter_map(|glob| Pattern::new(glob).ok())
            .collect();

        IgnoreRules {
            enabled: self.enabled,
            ignore_dirs: self.ignore_dirs,
            hidden: self.hidden,
            names_cf: normalize_set(self.names),
            allow_names_cf: normalize_set(self.allow_names),
            suffixes_cf: normalize_ordered(self.suffixes),
            globs_cf,
            patterns,
        }
    }
}

fn normalize_set(values: Vec<String>) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| casefold(v.trim()))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Case-folds and deduplicates while keeping first-seen order.
fn normalize_ordered(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .map(|v| casefold(v.trim()))
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

/// Decides whether `path` is skipped under `rules`, and why.
///
/// # Examples
///
/// ```
/// use sortodoco::ignore_rules::{classify_skip, IgnoreRules, SkipReason};
/// use std::path::Path;
///
/// let rules = IgnoreRules::builder().suffixes([".PART"]).build();
/// let decision = classify_skip(Path::new("movie.mkv.part"), &rules);
/// assert!(decision.skip);
/// assert!(decision.reasons.contains(&SkipReason::Suffix));
/// ```
pub fn classify_skip(path: &Path, rules: &IgnoreRules) -> SkipDecision {
    if !rules.enabled {
        return SkipDecision::keep();
    }

    let name_cf = path
        .file_name()
        .map(|n| casefold(&n.to_string_lossy()))
        .unwrap_or_default();

    if rules.allow_names_cf.contains(&name_cf) {
        return SkipDecision::keep();
    }

    if rules.ignore_dirs && path.is_dir() {
        return SkipDecision::skip(SkipReason::IsDir);
    }

    if rules.hidden {
        if name_cf.starts_with('.') {
            return SkipDecision::skip(SkipReason::HiddenDotfile);
        }
        if has_hidden_attribute(path) {
            return SkipDecision::skip(SkipReason::HiddenAttr);
        }
    }

    if rules.names_cf.contains(&name_cf) {
        return SkipDecision::skip(SkipReason::NameExact);
    }

    if rules
        .suffixes_cf
        .iter()
        .any(|suffix| name_cf.ends_with(suffix.as_str()))
    {
        return SkipDecision::skip(SkipReason::Suffix);
    }

    if rules.matches_glob(&name_cf) {
        return SkipDecision::skip(SkipReason::Glob);
    }

    SkipDecision::keep()
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn everything_rules() -> IgnoreRules {
        IgnoreRules::builder()
            .names(["Thumbs.db", "desktop.ini"])
            .suffixes([".tmp", ".PART"])
            .globs(["~$*", "draft-*.txt"])
            .build()
    }

    #[test]
    fn test_builder_case_folds_and_dedups() {
        let rules = IgnoreRules::builder()
            .names(["Thumbs.DB", "thumbs.db", "  "])
            .suffixes([".TMP", ".tmp", ".Part"])
            .globs(["*.BAK", "*.bak"])
            .allow_names([".GitKeep"])
            .build();

        assert_eq!(rules.names_cf().len(), 1);
        assert!(rules.names_cf().contains("thumbs.db"));
        assert_eq!(rules.suffixes_cf(), &[".tmp".to_string(), ".part".to_string()]);
        assert_eq!(rules.globs_cf(), &["*.bak".to_string()]);
        assert!(rules.allow_names_cf().contains(".gitkeep"));
    }

    #[test]
    fn test_default_rules_have_no_lists() {
        let rules = IgnoreRules::default();
        assert!(rules.enabled() && rules.ignore_dirs() && rules.hidden());
        assert!(rules.names_cf().is_empty());
        assert!(rules.allow_names_cf().is_empty());
        assert!(rules.suffixes_cf().is_empty());
        assert!(rules.globs_cf().is_empty());
        assert!(rules.is_ignored(Path::new(".hidden")));
        assert!(!rules.is_ignored(Path::new("thumbs.db")));
    }

    #[test]
    fn test_invalid_glob_is_dropped() {
        let rules = IgnoreRules::builder().globs(["[invalid", "*.bak"]).build();
        assert_eq!(rules.globs_cf(), &["*.bak".to_string()]);
        assert!(rules.is_ignored(Path::new("old.bak")));
    }

    #[test]
    fn test_disabled_rules_never_skip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let rules = IgnoreRules::builder()
            .enabled(false)
            .names(["thumbs.db"])
            .suffixes([".tmp"])
            .globs(["*"])
            .build();

        for name in [".hidden", "thumbs.db", "x.tmp", "anything.jpg"] {
            let decision = classify_skip(Path::new(name), &rules);
            assert_eq!(decision, SkipDecision::default(), "{name} should be kept");
        }
        assert!(!classify_skip(temp_dir.path(), &rules).skip);
    }

    #[test]
    fn test_allow_list_overrides_everything() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join(".Keep.tmp");
        fs::create_dir(&dir).expect("Failed to create directory");

        let rules = IgnoreRules::builder()
            .names([".keep.tmp"])
            .suffixes([".tmp"])
            .globs(["*"])
            .allow_names([".KEEP.TMP"])
            .build();

        let decision = classify_skip(&dir, &rules);
        assert!(!decision.skip);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_directory_skipped_when_ignore_dirs() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let sub = temp_dir.path().join("photos");
        fs::create_dir(&sub).expect("Failed to create directory");

        let decision = classify_skip(&sub, &IgnoreRules::default());
        assert!(decision.skip);
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::IsDir]));

        let keep_dirs = IgnoreRules::builder().ignore_dirs(false).build();
        assert!(!classify_skip(&sub, &keep_dirs).skip);
    }

    #[test]
    fn test_dotfile_skipped_only_when_hidden() {
        let decision = classify_skip(Path::new(".gitkeep"), &IgnoreRules::default());
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::HiddenDotfile]));

        let show_hidden = IgnoreRules::builder().hidden(false).build();
        assert!(!classify_skip(Path::new(".gitkeep"), &show_hidden).skip);
    }

    #[test]
    fn test_exact_name_is_case_insensitive() {
        let decision = classify_skip(Path::new("THUMBS.DB"), &everything_rules());
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::NameExact]));
        assert!(!everything_rules().is_ignored(Path::new("thumbs.db.jpg")));
    }

    #[test]
    fn test_exact_name_uses_unicode_case_folding() {
        let rules = IgnoreRules::builder().names(["strasse.txt"]).build();
        let decision = classify_skip(Path::new("STRAßE.txt"), &rules);
        assert!(decision.skip);
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::NameExact]));

        let folded = IgnoreRules::builder().names(["Maße.TXT"]).build();
        assert!(folded.names_cf().contains("masse.txt"));
        assert_eq!(casefold("STRAßE"), casefold("strasse"));
    }

    #[test]
    fn test_suffix_matches_whole_name_tail() {
        let rules = everything_rules();
        let decision = classify_skip(Path::new("Setup.EXE.part"), &rules);
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::Suffix]));
        assert!(rules.is_ignored(Path::new("report.TMP")));
        assert!(!rules.is_ignored(Path::new("tmp.txt")));
    }

    #[test]
    fn test_glob_matches_case_folded_name() {
        let rules = everything_rules();
        let decision = classify_skip(Path::new("~$Budget.xlsx"), &rules);
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::Glob]));
        assert!(rules.is_ignored(Path::new("DRAFT-notes.TXT")));
        assert!(!rules.is_ignored(Path::new("final-notes.txt")));
    }

    #[test]
    fn test_exact_name_checked_before_suffix() {
        let rules = IgnoreRules::builder()
            .names(["cache.tmp"])
            .suffixes([".tmp"])
            .build();
        let decision = classify_skip(Path::new("cache.tmp"), &rules);
        assert_eq!(decision.reasons, BTreeSet::from([SkipReason::NameExact]));
    }

    #[test]
    fn test_plain_file_is_kept() {
        let decision = classify_skip(Path::new("holiday.jpg"), &everything_rules());
        assert!(!decision.skip);
        assert!(decision.reasons.is_empty());
    }
}
