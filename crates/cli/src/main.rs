//! gallery: maintenance commands for a static photography site
//!
//! - Regenerate the gallery manifest from the image directory
//! - Validate the manifest against local files and the remote bucket
//! - Mirror local images into the bucket

mod debug_log;
mod progress;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand, ValueEnum, builder::Styles};
use color_eyre::Result;
use tracing::{debug, info, warn};

use gallery_core::config::RemoteConfig;
use gallery_core::{GalleryConfig, Layout, Manifest, Scanner, check_local, check_remote, manifest};
use gallery_transport::{AwsCliSync, HttpOracle, SyncStatus, SyncTool};

use crate::progress::{ProgressOracle, RunProgress, Status};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser)]
#[command(name = "gallery")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Keep the photo gallery manifest, image folders and bucket in step")]
#[command(long_about = r#"
gallery maintains the gallery manifest of a static photography site.

Paths and bucket settings come from gallery.toml in the project root;
every key is optional.

Examples:
  gallery update                 Rebuild docs/gallery-data.json from docs/images/gallery
  gallery validate-local         Check manifest entries against local files
  gallery validate-remote        Check manifest entries against the bucket
  gallery sync                   Upload docs/images to the bucket
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root containing gallery.toml
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScanFormat {
    Summary,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the manifest with the gallery directory
    Update {
        /// Print the new manifest instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check manifest entries against local image files
    ValidateLocal,

    /// Check manifest entries against the remote bucket
    ValidateRemote {
        /// Existence checks in flight at once (overrides gallery.toml)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Mirror the local image directory into the bucket
    Sync {
        /// Credential profile (overrides gallery.toml)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Scan the gallery directory and print what was found
    Scan {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ScanFormat::Summary)]
        format: ScanFormat,
    },

    /// Show version and build info
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = GalleryConfig::load(&cli.root)?;
    let layout = config.layout(&cli.root);
    let _log_guard = debug_log::init(cli.verbose, layout.log_file.as_deref())?;
    debug!("Layout: {layout:?}");

    let passed = match cli.command {
        Commands::Version => {
            eprintln!("gallery {}", env!("CARGO_PKG_VERSION"));
            eprintln!("Built with Rust {}", env!("CARGO_PKG_RUST_VERSION"));
            true
        }
        Commands::Scan { format } => scan_command(&layout, format)?,
        Commands::Update { dry_run } => update_command(&layout, dry_run)?,
        Commands::ValidateLocal => validate_local_command(&layout)?,
        Commands::ValidateRemote { concurrency } => {
            let concurrency = concurrency.unwrap_or(config.remote.concurrency);
            validate_remote_command(&layout, &config.remote, concurrency).await?
        }
        Commands::Sync { profile } => {
            let profile = profile.unwrap_or_else(|| config.remote.profile.clone());
            sync_command(&layout, &config.remote, &profile).await?
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn scanner(layout: &Layout) -> Scanner {
    Scanner::new(&layout.gallery_root).prefix(layout.gallery_dir.clone())
}

fn scan_command(layout: &Layout, format: ScanFormat) -> Result<bool> {
    info!("Scanning {}...", layout.gallery_root.display());

    let scan = scanner(layout).scan();

    match format {
        ScanFormat::Json => {
            let json = serde_json::to_string_pretty(&scan)?;
            println!("{json}");
        }
        ScanFormat::Summary => {
            eprintln!("Categories: {}", scan.categories.len());
            eprintln!("Images: {}", scan.image_count());

            for (category, images) in &scan.categories {
                eprintln!("  {category} ({} images)", images.len());
            }
            for (category, reason) in &scan.failed {
                eprintln!("  {category} (unreadable: {reason})");
            }
        }
    }

    Ok(scan.failed.is_empty())
}

fn print_summary(manifest: &Manifest) {
    progress::detail(&format!(
        "{} categories with {} total images",
        manifest.categories.len(),
        manifest.image_count()
    ));
    progress::detail(&format!(
        "Images without captions: {}",
        manifest.uncaptioned_count()
    ));
    for category in &manifest.categories {
        progress::detail(&format!(
            "  - {}: {} images",
            category.label(),
            category.images().len()
        ));
    }
}

fn update_command(layout: &Layout, dry_run: bool) -> Result<bool> {
    let run = RunProgress::new();

    let loaded = manifest::load(&layout.manifest);
    if let Some(warning) = &loaded.warning {
        progress::warning(&format!("{}: {warning}", layout.manifest.display()));
    }
    progress::status(
        Status::LOADED,
        &format!(
            "{} ({} categories)",
            layout.manifest.display(),
            loaded.manifest.categories.len()
        ),
    );

    progress::status(Status::SCANNING, &layout.gallery_root.display().to_string());
    let scan = scanner(layout).scan();
    if scan.root_missing {
        progress::warning(&format!(
            "gallery path not found: {}",
            layout.gallery_root.display()
        ));
    }
    for (category, reason) in &scan.failed {
        progress::error(&format!("could not scan category {category}: {reason}"));
    }
    info!("Found {} gallery categories", scan.categories.len());

    let result = gallery_core::reconcile(loaded.manifest, &scan);
    for duplicate in &result.duplicates {
        progress::warning(&format!(
            "{} is listed in several categories ({}), kept the first",
            duplicate.src,
            duplicate.categories.join(", ")
        ));
    }

    let stats = &result.stats;
    progress::detail(&format!(
        "{} kept, {} moved, {} added, {} removed",
        stats.kept, stats.moved, stats.added, stats.removed
    ));
    for category in &stats.dropped_categories {
        progress::detail(&format!("dropped category {category} (directory is gone)"));
    }

    if dry_run {
        print!("{}", result.manifest.to_pretty_json()?);
    } else {
        manifest::save(&layout.manifest, &result.manifest)?;
        progress::status(Status::UPDATED, &layout.manifest.display().to_string());
    }
    print_summary(&result.manifest);

    run.finish("gallery update", scan.failed.len());
    Ok(scan.failed.is_empty())
}

fn validate_local_command(layout: &Layout) -> Result<bool> {
    let run = RunProgress::new();

    progress::status(Status::CHECKING, &layout.manifest.display().to_string());
    let manifest = manifest::load_strict(&layout.manifest)?;
    if !layout.image_base.is_dir() {
        progress::error(&format!(
            "local image directory not found: {}",
            layout.image_base.display()
        ));
        run.finish("local validation", 1);
        return Ok(false);
    }

    let report = check_local(&manifest, &layout.image_base, &layout.gallery_dir);
    for finding in &report.findings {
        progress::error(&finding.to_string());
    }
    progress::detail(&format!(
        "{} image references checked against {}",
        report.referenced,
        layout.image_base.display()
    ));

    if report.is_ok() {
        progress::status(Status::PASSED, "all local validations passed");
    }
    run.finish("local validation", report.findings.len());
    Ok(report.is_ok())
}

async fn validate_remote_command(
    layout: &Layout,
    remote: &RemoteConfig,
    concurrency: usize,
) -> Result<bool> {
    let run = RunProgress::new();

    let manifest = manifest::load_strict(&layout.manifest)?;
    let base_url = remote.public_base_url();
    progress::status(
        Status::CHECKING,
        &format!("{} against {base_url}{}", layout.manifest.display(), remote.prefix),
    );

    let oracle = HttpOracle::new(&base_url, &remote.prefix, remote.timeout())?;
    let total = manifest
        .categories
        .iter()
        .flat_map(|c| c.images())
        .filter(|img| img.src.is_some())
        .count();
    let bar = progress::check_bar(total as u64);
    let tracked = ProgressOracle::new(&oracle, bar.clone());

    let report = check_remote(&manifest, &tracked, concurrency).await;
    bar.finish_and_clear();

    for finding in &report.findings {
        progress::error(&finding.to_string());
    }
    progress::detail(&format!(
        "{} image references checked against the bucket",
        report.checked
    ));

    if report.is_ok() {
        progress::status(Status::PASSED, "all referenced images found in the bucket");
    } else {
        if report.missing > 0 {
            progress::detail(&format!(
                "{} images are referenced in the manifest but missing from the bucket",
                report.missing
            ));
        }
        if report.findings.len() > report.missing {
            progress::detail("additional structural errors found in the manifest");
        }
    }

    run.finish("remote validation", report.findings.len());
    Ok(report.is_ok())
}

async fn sync_command(layout: &Layout, remote: &RemoteConfig, profile: &str) -> Result<bool> {
    let source: &Path = &layout.image_base;
    if !source.is_dir() {
        progress::error(&format!(
            "local image directory not found: {}",
            source.display()
        ));
        return Ok(false);
    }

    let destination = remote.sync_destination();
    debug!("Sync {} -> {destination} (profile {profile})", source.display());

    let tool = AwsCliSync::new(remote.sync_program.clone());
    let spinner = progress::spinner(&format!("{} -> {destination}", source.display()));
    let outcome = tool.sync(source, &destination, profile).await?;
    spinner.finish_and_clear();

    for line in outcome.stdout.lines() {
        info!("{line}");
    }
    for line in outcome.stderr.lines() {
        warn!("{line}");
    }

    match outcome.status {
        SyncStatus::Success => {
            progress::status(Status::SYNCED, &format!("{} -> {destination}", source.display()));
        }
        SyncStatus::Partial => {
            progress::warning("sync completed, but some files may not have been transferred");
            for line in outcome.diagnostic_text().lines() {
                progress::detail(line);
            }
        }
        SyncStatus::Failed => {
            let code = outcome
                .exit_code
                .map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}"));
            progress::error(&format!("sync failed ({code})"));
            for line in outcome.diagnostic_text().lines() {
                progress::detail(line);
            }
        }
    }

    Ok(outcome.succeeded())
}
