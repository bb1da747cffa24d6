//! Gallery directory scanning via the `ignore` crate
//!
//! A gallery root holds one directory per category; each category directory
//! holds image files. Nothing deeper than that is considered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use tracing::{debug, warn};

/// Extensions (lowercase, without the dot) recognized as gallery images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// One image file found inside a category directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedImage {
    /// Bare file name, e.g. `sunset.jpg`
    pub file_name: String,
    /// Forward-slash path as stored in the manifest, e.g. `gallery/nature/sunset.jpg`
    pub relative_path: String,
}

/// Result of scanning a gallery root
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Images per category directory, keyed by directory name
    pub categories: BTreeMap<String, Vec<ScannedImage>>,
    /// Category directories that could not be read, with the reason
    pub failed: BTreeMap<String, String>,
    /// The gallery root itself did not exist
    pub root_missing: bool,
}

impl ScanResult {
    /// Total number of images across all categories
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Build a scan result directly from `(category, [file names])` pairs.
    ///
    /// Relative paths are `<category>/<file>`, with no source prefix.
    pub fn from_listing<'a, I, F>(listing: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, F)>,
        F: IntoIterator<Item = &'a str>,
    {
        let categories = listing
            .into_iter()
            .map(|(category, files)| {
                let images = files
                    .into_iter()
                    .map(|file| ScannedImage {
                        file_name: file.to_string(),
                        relative_path: join_src("", category, file),
                    })
                    .collect();
                (category.to_string(), images)
            })
            .collect();

        Self {
            categories,
            ..Self::default()
        }
    }
}

/// Whether a file name carries one of the recognized image extensions
#[must_use]
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Join a manifest `src` value from its parts, always with forward slashes
#[must_use]
pub fn join_src(prefix: &str, category: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{category}/{file_name}")
    } else {
        format!("{prefix}/{category}/{file_name}")
    }
}

/// Scanner for a gallery root directory
pub struct Scanner {
    root: PathBuf,
    /// Prefix prepended to every relative path (the gallery dir name under the image base)
    prefix: String,
}

impl Scanner {
    /// Create a new scanner for the given gallery root
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: String::new(),
        }
    }

    /// Prefix every relative path with `prefix/`
    ///
    /// The manifest stores paths relative to the image base directory, so a
    /// gallery root at `<base>/gallery` scans with the prefix `gallery`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Create a walk builder that lists the direct children of `dir`
    fn walk_builder(dir: &Path) -> WalkBuilder {
        let mut builder = WalkBuilder::new(dir);
        builder
            .standard_filters(false) // gitignore rules must never hide gallery images
            .hidden(true) // but dot-files are never gallery content
            .follow_links(true)
            .max_depth(Some(1))
            .sort_by_file_name(|a, b| a.cmp(b));
        builder
    }

    /// Direct children of `dir`, excluding `dir` itself
    fn children(dir: &Path) -> impl Iterator<Item = Result<DirEntry, ignore::Error>> {
        Self::walk_builder(dir)
            .build()
            .filter(|result| result.as_ref().map_or(true, |entry| entry.depth() > 0))
    }

    /// Scan one category directory
    fn scan_category(&self, category: &str, dir: &Path) -> Result<Vec<ScannedImage>> {
        let mut images = Vec::new();

        for child in Self::children(dir) {
            let entry = child?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                warn!("Skipping non UTF-8 file name in {}", dir.display());
                continue;
            };
            if !is_image_file(file_name) {
                continue;
            }

            images.push(ScannedImage {
                file_name: file_name.to_string(),
                relative_path: join_src(&self.prefix, category, file_name),
            });
        }

        Ok(images)
    }

    /// Scan the gallery root
    ///
    /// A missing root yields an empty result with `root_missing` set. A
    /// category that cannot be read is recorded in `failed` and the scan
    /// moves on to the next one.
    #[must_use]
    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();

        if !self.root.is_dir() {
            warn!("Gallery path not found: {}", self.root.display());
            result.root_missing = true;
            return result;
        }

        for child in Self::children(&self.root) {
            let entry = match child {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable gallery entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_dir()) {
                continue;
            }
            let Some(category) = entry.file_name().to_str() else {
                warn!("Skipping non UTF-8 category directory {}", entry.path().display());
                continue;
            };

            match self.scan_category(category, entry.path()) {
                Ok(images) => {
                    debug!("Category {category}: {} images", images.len());
                    result.categories.insert(category.to_string(), images);
                }
                Err(e) => {
                    warn!("Failed to scan category {category}: {e}");
                    result.failed.insert(category.to_string(), e.to_string());
                }
            }
        }

        result
    }
}
