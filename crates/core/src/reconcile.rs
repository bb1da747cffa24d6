//! Reconciliation: merge a fresh gallery scan into the previous manifest
//!
//! Curated text (alt, description, any extra keys) is carried over for every
//! image that is still on disk, even if it moved to another category.
//! Images that vanished are dropped, new images get generated alt text and
//! no description.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::manifest::{Category, DuplicateSrc, ImageRecord, Manifest};
use crate::scan::{ScanResult, ScannedImage};

/// Title-case every alphabetic run: first letter upper, the rest lower
///
/// `"sunset beach 01"` becomes `"Sunset Beach 01"` and `"01abc"` becomes `"01Abc"`.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alphabetic = false;
    for c in text.chars() {
        if prev_alphabetic {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alphabetic = c.is_alphabetic();
    }
    out
}

/// Display name for a category directory: separators become spaces, then title case
#[must_use]
pub fn display_name(category: &str) -> String {
    title_case(&category.replace(['-', '_'], " "))
}

/// Alt text for a newly discovered image
///
/// `generate_alt_text("sunset_beach-01.jpg", "nature")` is
/// `"Sunset Beach 01 - Nature photography"`.
#[must_use]
pub fn generate_alt_text(file_name: &str, category: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let name = title_case(&stem.replace(['_', '-'], " "));
    format!("{name} - {} photography", title_case(category))
}

/// A new category for a directory the manifest doesn't know yet
#[must_use]
pub fn new_category(dir_name: &str) -> Category {
    let name = display_name(dir_name);
    Category {
        id: dir_name.to_string(),
        description: Some(format!("{name} photography collection")),
        name,
        images: Some(Vec::new()),
        ..Category::default()
    }
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records kept as-is in their category
    pub kept: usize,
    /// Records carried over from another category or file location
    pub moved: usize,
    /// Records created for new files
    pub added: usize,
    /// Old records with no file left on disk
    pub removed: usize,
    /// Directories that got a freshly synthesized category
    pub created_categories: Vec<String>,
    /// Old categories with no directory left on disk
    pub dropped_categories: Vec<String>,
    /// Categories whose directory could not be scanned, kept unchanged
    pub unscanned_categories: Vec<String>,
}

/// Output of [`reconcile`]
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub manifest: Manifest,
    pub stats: ReconcileStats,
    /// `src` values duplicated in the previous manifest; the first occurrence won
    pub duplicates: Vec<DuplicateSrc>,
}

/// Take the first unclaimed old category that `name` refers to
fn claim(slots: &mut [Option<Category>], name: &str) -> Option<Category> {
    slots
        .iter_mut()
        .find(|slot| slot.as_ref().is_some_and(|c| c.matches(name)))
        .and_then(Option::take)
}

fn file_name_of(src: &str) -> &str {
    src.rsplit('/').next().unwrap_or(src)
}

/// Old records keyed by `src` plus a by-file-name view of the ones whose file vanished
struct PreviousImages {
    by_src: HashMap<String, ImageRecord>,
    /// Vanished `src` values per file name, in manifest order
    vanished_by_name: HashMap<String, Vec<String>>,
    /// Vanished `src` values already carried over to a new location
    relocated: HashSet<String>,
}

impl PreviousImages {
    fn index(categories: &[Category], present: &HashSet<String>) -> Self {
        let mut by_src: HashMap<String, ImageRecord> = HashMap::new();
        let mut vanished_by_name: HashMap<String, Vec<String>> = HashMap::new();

        for image in categories.iter().flat_map(Category::images) {
            let Some(src) = &image.src else { continue };
            if by_src.contains_key(src) {
                continue;
            }
            by_src.insert(src.clone(), image.clone());
            if !present.contains(src) {
                vanished_by_name
                    .entry(file_name_of(src).to_string())
                    .or_default()
                    .push(src.clone());
            }
        }

        Self {
            by_src,
            vanished_by_name,
            relocated: HashSet::new(),
        }
    }

    /// An old record for `file`: same path elsewhere, or a vanished record with the same file name
    fn carry_over(&mut self, file: &ScannedImage) -> Option<ImageRecord> {
        if let Some(record) = self.by_src.get(&file.relative_path) {
            return Some(record.clone());
        }

        let candidates = self.vanished_by_name.get(&file.file_name)?;
        let src = candidates
            .iter()
            .find(|src| !self.relocated.contains(*src))?
            .clone();
        debug!("{src} moved to {}", file.relative_path);
        let record = self.by_src.get(&src).cloned();
        self.relocated.insert(src);
        record
    }
}

/// Merge `scan` into `existing`, returning the new manifest.
///
/// Per scanned directory the matching old category (by id or display name,
/// ignoring case) is reused, otherwise a new one is synthesized. Each scanned
/// file keeps its old record when it has one in that category, inherits the
/// record of the same path or of a vanished file with the same name from
/// elsewhere, or else gets a new record. Only categories present in the scan
/// survive, sorted by display name. Directories that failed to scan keep
/// their old category unchanged.
#[must_use]
pub fn reconcile(existing: Manifest, scan: &ScanResult) -> Reconciliation {
    let duplicates = existing.duplicate_srcs();
    for duplicate in &duplicates {
        warn!(
            "{} appears in several categories ({}); using the first",
            duplicate.src,
            duplicate.categories.join(", ")
        );
    }

    let Manifest {
        categories: old_categories,
        extra,
    } = existing;
    let mut stats = ReconcileStats::default();

    let mut slots: Vec<Option<Category>> = old_categories.iter().cloned().map(Some).collect();
    let mut updated = Vec::with_capacity(scan.categories.len() + scan.failed.len());
    let mut present: HashSet<String> = HashSet::new();

    // Unscannable directories keep what they had
    for name in scan.failed.keys() {
        if let Some(category) = claim(&mut slots, name) {
            warn!("Keeping category {name} unchanged, its directory could not be scanned");
            present.extend(category.images().iter().filter_map(|img| img.src.clone()));
            stats.unscanned_categories.push(name.clone());
            updated.push(category);
        }
    }

    present.extend(
        scan.categories
            .values()
            .flatten()
            .map(|file| file.relative_path.clone()),
    );
    let mut previous = PreviousImages::index(&old_categories, &present);

    for (name, files) in &scan.categories {
        let mut category = claim(&mut slots, name).unwrap_or_else(|| {
            debug!("New category {name}");
            stats.created_categories.push(name.clone());
            new_category(name)
        });

        let mut in_category: HashMap<String, ImageRecord> = HashMap::new();
        for image in category.images.take().unwrap_or_default() {
            if let Some(src) = image.src.clone() {
                in_category.entry(src).or_insert(image);
            }
        }

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            let mut record = if let Some(record) = in_category.remove(&file.relative_path) {
                stats.kept += 1;
                record
            } else if let Some(mut record) = previous.carry_over(file) {
                stats.moved += 1;
                record.src = Some(file.relative_path.clone());
                record
            } else {
                stats.added += 1;
                ImageRecord::new(
                    file.relative_path.clone(),
                    generate_alt_text(&file.file_name, name),
                )
            };

            if record.alt.is_none() {
                record.alt = Some(generate_alt_text(&file.file_name, name));
            }
            images.push(record);
        }

        category.images = Some(images);
        updated.push(category);
    }

    stats.dropped_categories = slots
        .into_iter()
        .flatten()
        .map(|c| c.label().to_string())
        .collect();
    stats.removed = previous
        .by_src
        .keys()
        .filter(|src| !present.contains(*src) && !previous.relocated.contains(*src))
        .count();

    updated.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        "Reconciled {} categories: {} kept, {} moved, {} added, {} removed",
        updated.len(),
        stats.kept,
        stats.moved,
        stats.added,
        stats.removed
    );

    Reconciliation {
        manifest: Manifest {
            categories: updated,
            extra,
        },
        stats,
        duplicates,
    }
}
