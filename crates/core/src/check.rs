//! Consistency checks between the manifest, the local image tree and the remote bucket

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt as _;
use futures_util::stream;
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::manifest::{DuplicateSrc, Manifest};

/// A single problem found by a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A category has no `images` list
    MissingImages { category: String },
    /// An image record has no `src`
    MissingSrc { category: String, record: String },
    /// The same `src` is used by several records
    DuplicateSrc { src: String, categories: Vec<String> },
    /// A referenced image is not on disk
    MissingLocal { src: String, expected: PathBuf },
    /// A file under the gallery tree that no record references
    Unreferenced { path: String },
    /// A referenced image is not in the remote store
    MissingRemote { src: String },
}

impl From<DuplicateSrc> for Finding {
    fn from(duplicate: DuplicateSrc) -> Self {
        Self::DuplicateSrc {
            src: duplicate.src,
            categories: duplicate.categories,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingImages { category } => {
                write!(f, "Category '{category}' missing 'images' list")
            }
            Self::MissingSrc { category, record } => {
                write!(f, "Image item in category '{category}' missing 'src' key: {record}")
            }
            Self::DuplicateSrc { src, categories } => {
                write!(f, "Duplicate src {src} in categories: {}", categories.join(", "))
            }
            Self::MissingLocal { src, expected } => {
                write!(f, "Missing local file: {src} (expected at {})", expected.display())
            }
            Self::Unreferenced { path } => write!(f, "Unreferenced image: {path}"),
            Self::MissingRemote { src } => write!(f, "Missing in remote store: {src}"),
        }
    }
}

/// The `src` values of a manifest that can be checked, plus structural findings
struct References {
    srcs: Vec<String>,
    findings: Vec<Finding>,
}

impl References {
    fn collect(manifest: &Manifest) -> Self {
        let mut srcs = Vec::new();
        let mut findings = Vec::new();

        for category in &manifest.categories {
            let Some(images) = &category.images else {
                findings.push(Finding::MissingImages {
                    category: category.label().to_string(),
                });
                continue;
            };
            for image in images {
                match &image.src {
                    Some(src) => srcs.push(src.clone()),
                    None => findings.push(Finding::MissingSrc {
                        category: category.label().to_string(),
                        record: serde_json::to_string(image).unwrap_or_default(),
                    }),
                }
            }
        }

        findings.extend(manifest.duplicate_srcs().into_iter().map(Finding::from));
        Self { srcs, findings }
    }
}

/// Result of [`check_local`]
#[derive(Debug, Clone, Default)]
pub struct LocalReport {
    pub findings: Vec<Finding>,
    /// Number of records with a `src`
    pub referenced: usize,
    /// Whether the gallery subtree existed, i.e. the unreferenced pass ran
    pub gallery_scanned: bool,
}

impl LocalReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Every file under `dir`, as forward-slash paths relative to `base`
fn files_under(base: &Path, dir: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(true)
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        files.push(parts.join("/"));
    }

    files
}

/// Check every manifest reference against the files under `image_base`.
///
/// Reports records without a `src`, referenced files that are missing, and
/// files under `image_base/<gallery_dir>` that nothing references. Files
/// outside the gallery subtree are never reported as unreferenced.
#[must_use]
pub fn check_local(manifest: &Manifest, image_base: &Path, gallery_dir: &str) -> LocalReport {
    let References { srcs, mut findings } = References::collect(manifest);

    for src in &srcs {
        let expected = src
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(image_base.to_path_buf(), |path, part| path.join(part));
        if !expected.exists() {
            findings.push(Finding::MissingLocal {
                src: src.clone(),
                expected,
            });
        }
    }
    info!("Found {} image references in the manifest", srcs.len());

    let gallery_dir = gallery_dir.trim_matches('/');
    let gallery_root = image_base.join(gallery_dir);
    let gallery_scanned = gallery_root.is_dir();

    if gallery_scanned {
        let referenced: HashSet<&str> = srcs.iter().map(String::as_str).collect();
        let scope = format!("{gallery_dir}/");
        let mut unreferenced: Vec<String> = files_under(image_base, &gallery_root)
            .into_iter()
            .filter(|path| !referenced.contains(path.as_str()))
            .filter(|path| path.starts_with(&scope))
            .collect();
        unreferenced.sort();

        debug!("{} unreferenced files", unreferenced.len());
        findings.extend(
            unreferenced
                .into_iter()
                .map(|path| Finding::Unreferenced { path }),
        );
    } else {
        info!(
            "Gallery path {} does not exist, skipping unreferenced check",
            gallery_root.display()
        );
    }

    LocalReport {
        findings,
        referenced: srcs.len(),
        gallery_scanned,
    }
}

/// Answers whether an object exists in the remote store.
///
/// Implementations must fold every failure into `false`.
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn exists(&self, src: &str) -> bool;
}

/// Result of [`check_remote`]
#[derive(Debug, Clone, Default)]
pub struct RemoteReport {
    pub findings: Vec<Finding>,
    /// Number of records the oracle was asked about
    pub checked: usize,
    /// Number of records missing from the remote store
    pub missing: usize,
}

impl RemoteReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Ask `oracle` about every referenced image, up to `concurrency` at a time.
///
/// Missing images are reported sorted by `src`, so the report does not depend
/// on the order in which the checks complete.
pub async fn check_remote<O>(manifest: &Manifest, oracle: &O, concurrency: usize) -> RemoteReport
where
    O: ExistenceOracle + ?Sized,
{
    let References { srcs, mut findings } = References::collect(manifest);
    let checked = srcs.len();

    let mut missing: Vec<String> = stream::iter(srcs)
        .map(|src| async move {
            let exists = oracle.exists(&src).await;
            (src, exists)
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(src, exists)| async move { (!exists).then_some(src) })
        .collect()
        .await;
    missing.sort();

    info!("Checked {checked} image references against the remote store");

    let missing_count = missing.len();
    findings.extend(missing.into_iter().map(|src| Finding::MissingRemote { src }));

    RemoteReport {
        findings,
        checked,
        missing: missing_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn manifest(value: serde_json::Value) -> Manifest {
        serde_json::from_value(value).unwrap()
    }

    fn touch(base: &Path, relative: &str) {
        let path = base.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "img").unwrap();
    }

    #[test]
    fn test_local_missing_and_unreferenced() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "gallery/nature/a.jpg");
        touch(dir.path(), "gallery/y.jpg");
        touch(dir.path(), "logo.jpg");
        touch(dir.path(), "other/z.jpg");

        let manifest = manifest(json!({"categories": [{"name": "Nature", "images": [
            {"src": "gallery/nature/a.jpg", "alt": "A"},
            {"src": "gallery/x.jpg", "alt": "X"}
        ]}]}));

        let report = check_local(&manifest, dir.path(), "gallery");

        assert_eq!(report.referenced, 2);
        assert!(report.gallery_scanned);
        assert_eq!(report.findings.len(), 2);
        assert!(matches!(
            &report.findings[0],
            Finding::MissingLocal { src, .. } if src == "gallery/x.jpg"
        ));
        assert_eq!(
            report.findings[1],
            Finding::Unreferenced {
                path: "gallery/y.jpg".into()
            }
        );
    }

    #[test]
    fn test_local_structural_errors_do_not_stop_checks() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "gallery/a.jpg");

        let manifest = manifest(json!({"categories": [
            {"name": "Broken"},
            {"name": "Nature", "images": [{"alt": "no src"}, {"src": "gallery/a.jpg"}]}
        ]}));

        let report = check_local(&manifest, dir.path(), "gallery");

        assert_eq!(report.referenced, 1);
        assert_eq!(report.findings.len(), 2);
        assert_eq!(
            report.findings[0],
            Finding::MissingImages {
                category: "Broken".into()
            }
        );
        assert!(matches!(&report.findings[1], Finding::MissingSrc { category, .. } if category == "Nature"));
        assert!(report.findings[1].to_string().contains("no src"));
    }

    #[test]
    fn test_local_without_gallery_dir() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest(json!({"categories": []}));

        let report = check_local(&manifest, dir.path(), "gallery");
        assert!(report.is_ok());
        assert!(!report.gallery_scanned);
    }

    #[test]
    fn test_local_duplicate_is_reported() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "gallery/a.jpg");
        let manifest = manifest(json!({"categories": [
            {"name": "A", "images": [{"src": "gallery/a.jpg"}]},
            {"name": "B", "images": [{"src": "gallery/a.jpg"}]}
        ]}));

        let report = check_local(&manifest, dir.path(), "gallery");
        assert_eq!(report.findings.len(), 1);
        assert!(matches!(report.findings[0], Finding::DuplicateSrc { .. }));
    }

    /// Oracle backed by a fixed set, answering after a per-path delay
    struct FakeOracle {
        present: HashSet<String>,
        calls: AtomicUsize,
        asked: Mutex<Vec<String>>,
    }

    impl FakeOracle {
        fn new(present: &[&str]) -> Self {
            Self {
                present: present.iter().map(ToString::to_string).collect(),
                calls: AtomicUsize::new(0),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExistenceOracle for FakeOracle {
        async fn exists(&self, src: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Earlier paths answer later, so completion order is reversed
            let delay = 30u64.saturating_sub(src.len() as u64 * 2);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.asked.lock().unwrap().push(src.to_string());
            self.present.contains(src)
        }
    }

    fn remote_manifest() -> Manifest {
        manifest(json!({"categories": [
            {"name": "City", "images": [{"src": "c/a.jpg"}, {"src": "c/bb.jpg"}]},
            {"name": "Nature", "images": [{"src": "n/ccc.jpg"}, {"src": "n/dddd.jpg"}, {"alt": "x"}]}
        ]}))
    }

    #[tokio::test]
    async fn test_remote_counts_missing() {
        let oracle = FakeOracle::new(&["c/a.jpg", "n/ccc.jpg"]);
        let report = check_remote(&remote_manifest(), &oracle, 4).await;

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.checked, 4);
        assert_eq!(report.missing, 2);
        // One structural finding plus two missing
        assert_eq!(report.findings.len(), 3);
        assert_eq!(
            report.findings[1..],
            [
                Finding::MissingRemote { src: "c/bb.jpg".into() },
                Finding::MissingRemote { src: "n/dddd.jpg".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_remote_report_independent_of_concurrency() {
        let sequential = check_remote(&remote_manifest(), &FakeOracle::new(&[]), 1).await;
        let concurrent = check_remote(&remote_manifest(), &FakeOracle::new(&[]), 16).await;

        assert_eq!(sequential.findings, concurrent.findings);
        assert_eq!(concurrent.missing, 4);
    }

    #[tokio::test]
    async fn test_remote_all_present() {
        let oracle = FakeOracle::new(&["c/a.jpg", "c/bb.jpg", "n/ccc.jpg", "n/dddd.jpg"]);
        let manifest = manifest(json!({"categories": [
            {"name": "City", "images": [{"src": "c/a.jpg"}, {"src": "c/bb.jpg"}]},
            {"name": "Nature", "images": [{"src": "n/ccc.jpg"}, {"src": "n/dddd.jpg"}]}
        ]}));

        let report = check_remote(&manifest, &oracle, 0).await;
        assert!(report.is_ok());
        assert_eq!(oracle.asked.lock().unwrap().len(), 4);
    }
}
