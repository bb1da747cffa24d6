//! gallery-core: manifest reconciliation and validation
//!
//! Provides gallery scanning, the manifest store, reconciliation, and the
//! local and remote consistency checks.

pub mod check;
pub mod config;
pub mod manifest;
pub mod reconcile;
pub mod scan;

pub use check::{ExistenceOracle, Finding, LocalReport, RemoteReport, check_local, check_remote};
pub use config::{GalleryConfig, Layout};
pub use manifest::{Category, ImageRecord, LoadWarning, Loaded, Manifest};
pub use reconcile::{Reconciliation, generate_alt_text, reconcile};
pub use scan::{ScanResult, ScannedImage, Scanner};
