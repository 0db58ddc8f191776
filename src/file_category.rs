/// Extension-based file categorization.
///
/// [`ExtensionRules`] holds the category → extensions mapping as loaded from a
/// rules source. [`ExtensionIndex`] is the inverted extension → category
/// lookup derived from it; building the index is where conflicting mappings
/// are rejected. Unknown extensions fall back to [`MISC_CATEGORY`].
///
/// # Examples
///
/// ```
/// use sortodoco::file_category::{build_extension_index, classify, ExtensionRules};
///
/// let mut rules = ExtensionRules::new();
/// rules.insert("Images", [".JPG", "png"]);
/// let index = build_extension_index(&rules).unwrap();
/// assert_eq!(classify("holiday.jpg", &index), "Images");
/// assert_eq!(classify("notes", &index), "_Misc");
/// ```
use crate::config::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Category for files whose extension is unknown or missing.
pub const MISC_CATEGORY: &str = "_Misc";

/// Priority order for materializing well-known categories.
pub const CANONICAL_CATEGORIES: [&str; 8] = [
    "Images",
    "Videos",
    "Audios",
    "Documents",
    "Executables",
    "Archives",
    "Fonts",
    "Code",
];

const BUILTIN_EXTENSIONS: &str = include_str!("../rules/extensions.json");

/// Lower-cases an extension and strips a single leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let lowered = ext.trim().to_lowercase();
    match lowered.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

/// Category → extensions mapping, in source insertion order.
///
/// Extensions are stored lower-cased and without their leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionRules {
    categories: Vec<(String, Vec<String>)>,
}

impl ExtensionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rules shipped with the crate (`rules/extensions.json`).
    pub fn builtin() -> ConfigResult<Self> {
        Self::from_json_str(BUILTIN_EXTENSIONS, "<built-in>")
    }

    /// Adds extensions to `category`, creating it if needed.
    ///
    /// Extensions are normalized on the way in; repeats within one category
    /// are collapsed. Cross-category conflicts are not checked here, see
    /// [`build_extension_index`].
    pub fn insert<I, S>(&mut self, category: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let position = match self.categories.iter().position(|(name, _)| name == category) {
            Some(position) => position,
            None => {
                self.categories.push((category.to_string(), Vec::new()));
                self.categories.len() - 1
            }
        };
        let list = &mut self.categories[position].1;
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if !ext.is_empty() && !list.contains(&ext) {
                list.push(ext);
            }
        }
    }

    /// Parses a JSON object of `category -> [extension, ...]`.
    pub fn from_json_str(text: &str, origin: &str) -> ConfigResult<Self> {
        let parse_error = |reason: String| ConfigError::Parse {
            origin: origin.to_string(),
            reason,
        };
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;

        let mut rules = Self::new();
        for (category, value) in map {
            let extensions: Vec<String> = serde_json::from_value(value).map_err(|e| {
                parse_error(format!("category '{}' must be a list of strings: {}", category, e))
            })?;
            rules.insert(&category, extensions);
        }
        Ok(rules)
    }

    /// Parses a TOML table of `Category = ["ext", ...]`.
    pub fn from_toml_str(text: &str, origin: &str) -> ConfigResult<Self> {
        let parse_error = |reason: String| ConfigError::Parse {
            origin: origin.to_string(),
            reason,
        };
        let table: toml::Table = toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;

        let mut rules = Self::new();
        for (category, value) in table {
            let extensions: Vec<String> = value.try_into().map_err(|e| {
                parse_error(format!("category '{}' must be a list of strings: {}", category, e))
            })?;
            rules.insert(&category, extensions);
        }
        Ok(rules)
    }

    /// Category names in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    pub fn extensions(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, exts)| exts.as_slice())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.iter().any(|(name, _)| name == category)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Categories to materialize as destination directories.
    ///
    /// Well-known categories come first in [`CANONICAL_CATEGORIES`] order, then
    /// any other categories in insertion order, then always [`MISC_CATEGORY`].
    pub fn destination_categories(&self) -> Vec<String> {
        let mut ordered: Vec<String> = CANONICAL_CATEGORIES
            .iter()
            .filter(|name| self.contains_category(name))
            .map(|name| name.to_string())
            .collect();
        ordered.extend(
            self.categories()
                .filter(|name| !CANONICAL_CATEGORIES.contains(name) && *name != MISC_CATEGORY)
                .map(str::to_string),
        );
        ordered.push(MISC_CATEGORY.to_string());
        ordered
    }
}

/// Loads category rules from a file.
///
/// Files ending in `.toml` are read as TOML; anything else as JSON. The rules
/// are validated for cross-category conflicts before being returned.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist,
/// `ConfigError::Parse` if it is not a category → list-of-strings mapping, and
/// `ConfigError::ExtensionConflict` if an extension appears under two
/// categories.
pub fn load_category_rules(source: &Path) -> ConfigResult<ExtensionRules> {
    if !source.exists() {
        return Err(ConfigError::NotFound(source.to_path_buf()));
    }
    let text = fs::read_to_string(source).map_err(|e| ConfigError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    let origin = source.display().to_string();
    let is_toml = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let rules = if is_toml {
        ExtensionRules::from_toml_str(&text, &origin)?
    } else {
        ExtensionRules::from_json_str(&text, &origin)?
    };

    build_extension_index(&rules)?;
    log::debug!("Loaded {} categories from {}", rules.len(), origin);
    Ok(rules)
}

/// Extension → category lookup derived from [`ExtensionRules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionIndex {
    extension_map: HashMap<String, String>,
}

impl ExtensionIndex {
    /// Looks up the category for an extension (case-insensitive, dot optional).
    pub fn category_for_extension(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }
}

/// Inverts `rules` into an [`ExtensionIndex`].
///
/// # Errors
///
/// Fails on the first extension found under two different categories.
pub fn build_extension_index(rules: &ExtensionRules) -> ConfigResult<ExtensionIndex> {
    let mut extension_map: HashMap<String, String> = HashMap::new();

    for (category, extensions) in &rules.categories {
        for ext in extensions {
            match extension_map.get(ext) {
                Some(existing) if existing != category => {
                    return Err(ConfigError::ExtensionConflict {
                        extension: ext.clone(),
                        existing: existing.clone(),
                        conflicting: category.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    extension_map.insert(ext.clone(), category.clone());
                }
            }
        }
    }

    Ok(ExtensionIndex { extension_map })
}

/// Returns the category for `filename` based on its final extension.
///
/// Files without an extension, or with an unknown one, map to
/// [`MISC_CATEGORY`].
pub fn classify<'a>(filename: &str, index: &'a ExtensionIndex) -> &'a str {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy())
        .filter(|ext| !ext.is_empty())
        .and_then(|ext| index.category_for_extension(&ext))
        .unwrap_or(MISC_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn standard_rules() -> ExtensionRules {
        let mut rules = ExtensionRules::new();
        rules.insert("Images", ["jpg", "png"]);
        rules.insert("Documents", ["pdf", "csv"]);
        rules.insert("Videos", ["mp4"]);
        rules
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".JPG"), "jpg");
        assert_eq!(normalize_extension("Png"), "png");
        assert_eq!(normalize_extension("..gz"), ".gz");
        assert_eq!(normalize_extension(" .Tar "), "tar");
    }

    #[test]
    fn test_builtin_rules_load_and_index() {
        let rules = ExtensionRules::builtin().expect("built-in rules should parse");
        let index = build_extension_index(&rules).expect("built-in rules should not conflict");

        assert_eq!(rules.categories().collect::<Vec<_>>(), CANONICAL_CATEGORIES);
        assert_eq!(index.category_for_extension("jpg"), Some("Images"));
        assert_eq!(index.category_for_extension(".PDF"), Some("Documents"));
        assert_eq!(index.category_for_extension("ttf"), Some("Fonts"));
    }

    #[test]
    fn test_insert_merges_and_dedups() {
        let mut rules = ExtensionRules::new();
        rules.insert("Images", ["JPG", ".jpg", ""]);
        rules.insert("Images", ["png"]);

        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules.extensions("Images"),
            Some(&["jpg".to_string(), "png".to_string()][..])
        );
    }

    #[test]
    fn test_index_maps_every_extension_to_its_category() {
        let rules = standard_rules();
        let index = build_extension_index(&rules).expect("no conflicts");

        for category in rules.categories() {
            for ext in rules.extensions(category).unwrap_or_default() {
                assert_eq!(index.category_for_extension(ext), Some(category));
            }
        }
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_conflicting_extension_fails() {
        let mut rules = standard_rules();
        rules.insert("Spreadsheets", [".CSV"]);

        match build_extension_index(&rules) {
            Err(ConfigError::ExtensionConflict {
                extension,
                existing,
                conflicting,
            }) => {
                assert_eq!(extension, "csv");
                assert_eq!(existing, "Documents");
                assert_eq!(conflicting, "Spreadsheets");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_uses_final_extension() {
        let mut rules = standard_rules();
        rules.insert("Archives", ["gz"]);
        let index = build_extension_index(&rules).expect("no conflicts");

        assert_eq!(classify("pic.JPG", &index), "Images");
        assert_eq!(classify("readme.PDF", &index), "Documents");
        assert_eq!(classify("backup.tar.gz", &index), "Archives");
        assert_eq!(classify("weirdfile", &index), MISC_CATEGORY);
        assert_eq!(classify("trailing.", &index), MISC_CATEGORY);
        assert_eq!(classify("song.xyz", &index), MISC_CATEGORY);
    }

    #[test]
    fn test_destination_categories_order() {
        let mut rules = ExtensionRules::new();
        rules.insert("Ebooks", ["epub"]);
        rules.insert("Code", ["rs"]);
        rules.insert("Images", ["jpg"]);
        rules.insert("_Misc", ["bin"]);

        assert_eq!(
            rules.destination_categories(),
            vec!["Images", "Code", "Ebooks", "_Misc"]
        );
    }

    #[test]
    fn test_json_preserves_category_order() {
        let rules = ExtensionRules::from_json_str(
            r#"{"Zeta": ["z"], "Alpha": [".A"], "Mid": []}"#,
            "test",
        )
        .expect("valid json");
        assert_eq!(rules.categories().collect::<Vec<_>>(), ["Zeta", "Alpha", "Mid"]);
        assert_eq!(rules.extensions("Alpha"), Some(&["a".to_string()][..]));
    }

    #[test]
    fn test_json_rejects_non_list_values() {
        let result = ExtensionRules::from_json_str(r#"{"Images": "jpg"}"#, "test");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        assert!(ExtensionRules::from_json_str("[1, 2]", "test").is_err());
    }

    #[test]
    fn test_load_category_rules_from_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let json_path = temp_dir.path().join("extensions.json");
        fs::write(&json_path, r#"{"Images": [".JPG"], "Videos": ["mp4"]}"#)
            .expect("Failed to write rules");
        let toml_path = temp_dir.path().join("extensions.toml");
        fs::write(&toml_path, "Images = [\".JPG\"]\nVideos = [\"mp4\"]\n")
            .expect("Failed to write rules");

        let from_json = load_category_rules(&json_path).expect("json rules");
        let from_toml = load_category_rules(&toml_path).expect("toml rules");
        assert_eq!(from_json, from_toml);
        assert_eq!(from_json.extensions("Images"), Some(&["jpg".to_string()][..]));
    }

    #[test]
    fn test_load_category_rules_errors() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            load_category_rules(&missing),
            Err(ConfigError::NotFound(_))
        ));

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{not json").expect("Failed to write rules");
        assert!(matches!(
            load_category_rules(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let conflicting = temp_dir.path().join("conflict.json");
        fs::write(&conflicting, r#"{"Images": ["jpg"], "Photos": ["JPG"]}"#)
            .expect("Failed to write rules");
        assert!(matches!(
            load_category_rules(&conflicting),
            Err(ConfigError::ExtensionConflict { .. })
        ));
    }
}
