//! Cargo-style status output for gallery commands
//!
//! ```text
//!    Scanning docs/images/gallery
//!     Updated docs/gallery-data.json
//!       Error Missing local file: gallery/nature/lake.jpg (expected at ...)
//!    Finished local validation in 1.31s with 2 errors
//! ```

use std::io::Write as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gallery_core::ExistenceOracle;

/// Status verbs for cargo-style output (right-aligned to 12 chars)
pub struct Status;

impl Status {
    pub const SCANNING: &str = "Scanning";
    pub const LOADED: &str = "Loaded";
    pub const UPDATED: &str = "Updated";
    pub const CHECKING: &str = "Checking";
    pub const SYNCING: &str = "Syncing";
    pub const SYNCED: &str = "Synced";
    pub const PASSED: &str = "Passed";
    pub const WARNING: &str = "Warning";
    pub const ERROR: &str = "Error";
}

fn print_styled(style: &console::Style, status: &str, message: &str) {
    let mut term = console::Term::stderr();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

/// Print a cargo-style status line
pub fn status(status: &str, message: &str) {
    print_styled(&console::Style::new().green().bold(), status, message);
}

/// Print a yellow warning line
pub fn warning(message: &str) {
    print_styled(&console::Style::new().yellow().bold(), Status::WARNING, message);
}

/// Print a red error line with a custom verb
pub fn failure(status: &str, message: &str) {
    print_styled(&console::Style::new().red().bold(), status, message);
}

/// Print a red error line
pub fn error(message: &str) {
    failure(Status::ERROR, message);
}

/// Plain indented detail line under a status line
pub fn detail(message: &str) {
    let mut term = console::Term::stderr();
    let _ = writeln!(term, "{:>12} {}", "", message);
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Tracks a command run for the final summary line
pub struct RunProgress {
    start: Instant,
}

impl RunProgress {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Show final summary
    pub fn finish(&self, what: &str, error_count: usize) {
        let elapsed_str = format_elapsed(self.start.elapsed());

        if error_count == 0 {
            status("Finished", &format!("{what} in {elapsed_str}, no errors"));
        } else {
            failure(
                "Finished",
                &format!("{what} in {elapsed_str} with {error_count} errors"),
            );
        }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a spinner for a long-running external command
pub fn spinner(message: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg:>12} {prefix}")
            .expect("valid template"),
    );
    pb.set_message(Status::SYNCING);
    pb.set_prefix(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a progress bar for remote existence checks
pub fn check_bar(total: u64) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(total);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:>12} [{bar:25.cyan/dim}] {pos}/{len} {prefix:.dim}")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb.set_message(Status::CHECKING);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Wraps an oracle and advances a progress bar as answers come in
pub struct ProgressOracle<'a, O: ?Sized> {
    inner: &'a O,
    bar: indicatif::ProgressBar,
}

impl<'a, O: ExistenceOracle + ?Sized> ProgressOracle<'a, O> {
    pub fn new(inner: &'a O, bar: indicatif::ProgressBar) -> Self {
        Self { inner, bar }
    }
}

#[async_trait]
impl<'a, O: ExistenceOracle + ?Sized> ExistenceOracle for ProgressOracle<'a, O> {
    async fn exists(&self, src: &str) -> bool {
        let exists = self.inner.exists(src).await;
        self.bar.set_prefix(src.to_string());
        self.bar.inc(1);
        exists
    }
}
