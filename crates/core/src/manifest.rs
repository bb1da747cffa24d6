//! The gallery manifest (`gallery-data.json`) and its on-disk store
//!
//! Every level keeps unknown keys in a flattened map so curated data the
//! tools don't understand survives a load/save cycle untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write as _;
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr as _, eyre};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One image entry of a category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path relative to the image base directory, forward slashes
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Caption. Absent means the image still needs one.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Text field that tolerates a mistyped value in a hand-edited file.
///
/// Numbers and booleans keep their text form; `null`, lists and objects read
/// as absent.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => {
            warn!("Ignoring non-text manifest value: {other}");
            None
        }
    })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

impl ImageRecord {
    /// A freshly discovered image with generated alt text and no caption
    #[must_use]
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            alt: Some(alt.into()),
            ..Self::default()
        }
    }

    /// Whether the image still needs a caption
    #[must_use]
    pub fn needs_caption(&self) -> bool {
        self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` when the key is missing from the file, which validators report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRecord>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    /// Images of this category, empty if the list is missing
    #[must_use]
    pub fn images(&self) -> &[ImageRecord] {
        self.images.as_deref().unwrap_or_default()
    }

    /// Whether `name` refers to this category, by id or display name, ignoring case
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.id.to_lowercase() == name || self.name.to_lowercase() == name
    }

    /// Label used in diagnostics
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() { "N/A" } else { &self.name }
    }
}

/// The whole gallery manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Total image records across all categories
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.categories.iter().map(|c| c.images().len()).sum()
    }

    /// Image records without a caption
    #[must_use]
    pub fn uncaptioned_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(Category::images)
            .filter(|img| img.needs_caption())
            .count()
    }

    /// `src` values that appear more than once, with the categories holding them
    ///
    /// Categories are listed in manifest order, once per occurrence.
    #[must_use]
    pub fn duplicate_srcs(&self) -> Vec<DuplicateSrc> {
        let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for category in &self.categories {
            for src in category.images().iter().filter_map(|img| img.src.as_deref()) {
                seen.entry(src).or_default().push(category.label().to_string());
            }
        }

        seen.into_iter()
            .filter(|(_, categories)| categories.len() > 1)
            .map(|(src, categories)| DuplicateSrc {
                src: src.to_string(),
                categories,
            })
            .collect()
    }

    /// Serialize the way the store writes it: 2-space indentation, trailing newline
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// A `src` shared by several image records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSrc {
    pub src: String,
    pub categories: Vec<String>,
}

/// Why a soft load fell back to an empty manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// The file does not exist
    Missing,
    /// The file exists but could not be read or parsed
    Invalid(String),
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "manifest file not found, starting from an empty manifest"),
            Self::Invalid(reason) => {
                write!(f, "manifest could not be loaded ({reason}), starting from an empty manifest")
            }
        }
    }
}

/// Outcome of a soft load
#[derive(Debug, Clone)]
pub struct Loaded {
    pub manifest: Manifest,
    /// Set when `manifest` is the empty fallback rather than the file's contents
    pub warning: Option<LoadWarning>,
}

/// Load a manifest, falling back to an empty one if the file is missing or corrupt.
///
/// This is what lets `update` bootstrap a manifest from nothing. The fallback
/// is reported through [`Loaded::warning`] and logged.
#[must_use]
pub fn load(path: &Path) -> Loaded {
    let result = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<Manifest>(&content)
            .map_err(|e| LoadWarning::Invalid(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LoadWarning::Missing),
        Err(e) => Err(LoadWarning::Invalid(e.to_string())),
    };

    match result {
        Ok(manifest) => {
            debug!(
                "Loaded {} with {} categories",
                path.display(),
                manifest.categories.len()
            );
            Loaded {
                manifest,
                warning: None,
            }
        }
        Err(warning) => {
            warn!("{}: {warning}", path.display());
            Loaded {
                manifest: Manifest::default(),
                warning: Some(warning),
            }
        }
    }
}

/// Load a manifest for validation. Anything short of a well-formed file is an error.
///
/// # Errors
/// Returns an error if the file is missing or unreadable, is not valid JSON,
/// lacks a `categories` list, or does not fit the manifest shape
pub fn load_strict(path: &Path) -> Result<Manifest> {
    if !path.exists() {
        return Err(eyre!("gallery manifest not found at {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("could not read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("{} is not valid JSON", path.display()))?;

    if !value.get("categories").is_some_and(Value::is_array) {
        return Err(eyre!(
            "'categories' key missing or not a list in {}",
            path.display()
        ));
    }

    serde_json::from_value(value)
        .wrap_err_with(|| format!("{} does not match the manifest layout", path.display()))
}

/// Write a manifest, replacing the file atomically.
///
/// The JSON goes to a temporary file next to `path` which is then renamed
/// over it, so readers never observe a half-written manifest.
///
/// # Errors
/// Returns an error if serialization, writing or the final rename fails
pub fn save(path: &Path, manifest: &Manifest) -> Result<()> {
    let json = manifest.to_pretty_json()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("could not create {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .wrap_err_with(|| format!("could not create a temporary file in {}", dir.display()))?;
    temp.write_all(json.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .wrap_err_with(|| format!("could not write {}", path.display()))?;

    debug!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
  "categories": [
    {
      "id": "nature",
      "name": "Nature",
      "description": "Nature photography collection",
      "images": [
        {
          "src": "gallery/nature/a.jpg",
          "alt": "A",
          "description": "Morning fog",
          "featured": true
        },
        { "src": "gallery/nature/b.jpg", "alt": "B" }
      ],
      "cover": "gallery/nature/a.jpg"
    }
  ],
  "version": 3
}"#;

    #[test]
    fn test_parse_keeps_extra_fields() {
        let manifest: Manifest = serde_json::from_str(SAMPLE).unwrap();
        let nature = &manifest.categories[0];
        assert_eq!(nature.images().len(), 2);
        assert_eq!(nature.images()[0].extra["featured"], json!(true));
        assert_eq!(nature.extra["cover"], json!("gallery/nature/a.jpg"));
        assert_eq!(manifest.extra["version"], json!(3));
        assert!(nature.images()[1].needs_caption());
        assert_eq!(manifest.uncaptioned_count(), 1);
    }

    #[test]
    fn test_save_then_load_preserves_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs/gallery-data.json");
        let manifest: Manifest = serde_json::from_str(SAMPLE).unwrap();

        save(&path, &manifest).unwrap();
        let loaded = load(&path);

        assert!(loaded.warning.is_none());
        assert_eq!(loaded.manifest, manifest);
    }

    #[test]
    fn test_save_is_pretty_and_omits_missing_description() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gallery-data.json");
        let manifest = Manifest {
            categories: vec![Category {
                id: "nature".into(),
                name: "Nature".into(),
                description: Some("Nature photography collection".into()),
                images: Some(vec![ImageRecord::new("nature/a.jpg", "A - Nature photography")]),
                extra: Map::new(),
            }],
            extra: Map::new(),
        };

        save(&path, &manifest).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("{\n  \"categories\": [\n    {\n      \"id\": \"nature\""));
        assert!(text.ends_with("}\n"));
        assert!(!text.contains("\"description\": null"));
        assert_eq!(text.matches("\"description\"").count(), 1);
    }

    #[test]
    fn test_load_missing_is_soft() {
        let dir = TempDir::new().unwrap();
        let loaded = load(&dir.path().join("absent.json"));
        assert_eq!(loaded.warning, Some(LoadWarning::Missing));
        assert!(loaded.manifest.categories.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_soft() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gallery-data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = load(&path);
        assert!(matches!(loaded.warning, Some(LoadWarning::Invalid(_))));
        assert!(loaded.manifest.categories.is_empty());
    }

    #[test]
    fn test_load_tolerates_missing_src_and_images() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gallery-data.json");
        std::fs::write(
            &path,
            r#"{"categories": [{"name": "Nature", "images": [{"alt": "no src"}]}, {"name": "Empty"}]}"#,
        )
        .unwrap();

        let loaded = load(&path);
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.manifest.categories[0].images()[0].src, None);
        assert!(loaded.manifest.categories[1].images.is_none());
    }

    #[test]
    fn test_load_tolerates_mistyped_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gallery-data.json");
        std::fs::write(
            &path,
            r#"{"categories": [{"id": "nature", "name": null, "description": null,
                "images": [{"src": "nature/a.jpg", "alt": "Curated", "description": "Dawn"},
                           {"src": "nature/b.jpg", "alt": 42, "description": ["x"]}]}]}"#,
        )
        .unwrap();

        let loaded = load(&path);
        assert!(loaded.warning.is_none());
        let nature = &loaded.manifest.categories[0];
        assert_eq!(nature.name, "");
        assert_eq!(nature.description, None);
        assert_eq!(nature.images()[0].description.as_deref(), Some("Dawn"));
        assert_eq!(nature.images()[1].alt.as_deref(), Some("42"));
        assert_eq!(nature.images()[1].description, None);
    }

    #[test]
    fn test_category_without_description_stays_without() {
        let manifest: Manifest =
            serde_json::from_str(r#"{"categories": [{"id": "nature", "name": "Nature", "images": []}]}"#)
                .unwrap();
        assert!(!manifest.to_pretty_json().unwrap().contains("description"));
    }

    #[test]
    fn test_load_strict_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gallery-data.json");

        assert!(load_strict(&path).is_err());

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(load_strict(&path).is_err());

        std::fs::write(&path, r#"{"gallery": []}"#).unwrap();
        let err = load_strict(&path).unwrap_err();
        assert!(err.to_string().contains("'categories'"));

        std::fs::write(&path, r#"{"categories": []}"#).unwrap();
        assert!(load_strict(&path).unwrap().categories.is_empty());
    }

    #[test]
    fn test_duplicate_srcs() {
        let manifest: Manifest = serde_json::from_str(
            r#"{"categories": [
                {"name": "City", "images": [{"src": "x.jpg"}, {"src": "y.jpg"}]},
                {"name": "Nature", "images": [{"src": "x.jpg"}, {"alt": "no src"}]}
            ]}"#,
        )
        .unwrap();

        let duplicates = manifest.duplicate_srcs();
        assert_eq!(
            duplicates,
            vec![DuplicateSrc {
                src: "x.jpg".into(),
                categories: vec!["City".into(), "Nature".into()],
            }]
        );
    }

    #[test]
    fn test_category_matches_ignores_case() {
        let category = Category {
            id: "street-art".into(),
            name: "Street Art".into(),
            ..Category::default()
        };
        assert!(category.matches("STREET-ART"));
        assert!(category.matches("street art"));
        assert!(!category.matches("street_art"));
    }
}
