//! Project configuration (`gallery.toml`)

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gallery project configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Manifest file, relative to the project root
    pub manifest: PathBuf,
    /// Directory the manifest's `src` paths are relative to
    pub image_base: PathBuf,
    /// Subdirectory of `image_base` holding one directory per category
    pub gallery_dir: String,
    /// Debug log file, relative to the project root
    pub log_file: Option<PathBuf>,
    pub remote: RemoteConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("docs/gallery-data.json"),
            image_base: PathBuf::from("docs/images"),
            gallery_dir: "gallery".to_string(),
            log_file: None,
            remote: RemoteConfig::default(),
        }
    }
}

/// Remote bucket configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub bucket: String,
    /// Key prefix inside the bucket, e.g. `website-images/`
    pub prefix: String,
    /// Public URL of the bucket; derived from `bucket` when unset
    pub base_url: Option<String>,
    /// Credential profile handed to the sync tool
    pub profile: String,
    /// Sync tool executable
    pub sync_program: String,
    /// Per-request timeout for existence checks
    pub timeout_secs: u64,
    /// Existence checks in flight at once
    pub concurrency: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bucket: "photos-joyfulphotographs-com".to_string(),
            prefix: "website-images/".to_string(),
            base_url: None,
            profile: "joyful-photos".to_string(),
            sync_program: "aws".to_string(),
            timeout_secs: 5,
            concurrency: 8,
        }
    }
}

impl RemoteConfig {
    /// Public base URL of the bucket, always ending in `/`
    #[must_use]
    pub fn public_base_url(&self) -> String {
        let url = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com/", self.bucket));
        if url.ends_with('/') { url } else { format!("{url}/") }
    }

    /// Sync destination, e.g. `s3://bucket/website-images/`
    #[must_use]
    pub fn sync_destination(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Config file name
pub const CONFIG_FILE: &str = "gallery.toml";

impl GalleryConfig {
    /// Load config from project root.
    ///
    /// Returns default config if gallery.toml doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(root: &Path) -> color_eyre::Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve every path against `root`
    #[must_use]
    pub fn layout(&self, root: &Path) -> Layout {
        let image_base = root.join(&self.image_base);
        Layout {
            manifest: root.join(&self.manifest),
            gallery_root: image_base.join(self.gallery_dir.trim_matches('/')),
            image_base,
            gallery_dir: self.gallery_dir.trim_matches('/').to_string(),
            log_file: self.log_file.as_ref().map(|file| root.join(file)),
        }
    }
}

/// Concrete paths a run operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub manifest: PathBuf,
    pub image_base: PathBuf,
    /// `image_base/gallery_dir`, the directory scanned for categories
    pub gallery_root: PathBuf,
    /// Name of the gallery subtree; also the prefix of every scanned `src`
    pub gallery_dir: String,
    pub log_file: Option<PathBuf>,
}
