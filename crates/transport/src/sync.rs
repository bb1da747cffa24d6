//! Bucket sync through an external command-line tool
//!
//! Uses the system `aws` CLI so the user's existing credential profiles apply.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::process::Command;
use tracing::{debug, info};

/// How a sync run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Everything was transferred
    Success,
    /// The tool finished but some files may not have been transferred
    Partial,
    /// The tool failed or could not be started
    Failed,
}

impl SyncStatus {
    /// Classify a sync tool exit code: 0 is success, 2 partial, anything else failure
    #[must_use]
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            Some(2) => Self::Partial,
            _ => Self::Failed,
        }
    }
}

/// Outcome of a sync run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    /// `None` if the tool could not be started or was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SyncOutcome {
    /// Success or partial success
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, SyncStatus::Success | SyncStatus::Partial)
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == SyncStatus::Partial
    }

    /// Combined tool output for diagnostics
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Something that can mirror a local directory into the bucket
#[async_trait]
pub trait SyncTool: Send + Sync {
    /// Mirror `source` to `destination` using the named credential `profile`.
    ///
    /// # Errors
    /// Returns an error only for failures outside the tool itself; tool
    /// failures are reported through [`SyncOutcome::status`].
    async fn sync(&self, source: &Path, destination: &str, profile: &str) -> Result<SyncOutcome>;
}

/// `aws s3 sync` via the system AWS CLI
pub struct AwsCliSync {
    program: String,
}

impl AwsCliSync {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments after the program name
    fn args(source: &Path, destination: &str, profile: &str) -> Vec<String> {
        // Trailing separator: sync the directory's contents, not the directory
        let mut source = source.display().to_string();
        if !source.ends_with(std::path::MAIN_SEPARATOR) {
            source.push(std::path::MAIN_SEPARATOR);
        }

        vec![
            "s3".to_string(),
            "sync".to_string(),
            source,
            destination.to_string(),
            "--profile".to_string(),
            profile.to_string(),
        ]
    }
}

impl Default for AwsCliSync {
    fn default() -> Self {
        Self::new("aws")
    }
}

#[async_trait]
impl SyncTool for AwsCliSync {
    async fn sync(&self, source: &Path, destination: &str, profile: &str) -> Result<SyncOutcome> {
        let args = Self::args(source, destination, profile);
        info!("Executing: {} {}", self.program, args.join(" "));

        let output = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SyncOutcome {
                    status: SyncStatus::Failed,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!(
                        "'{}' command not found. Ensure it is installed and in PATH.",
                        self.program
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let exit_code = output.status.code();
        debug!("{} exited with {:?}", self.program, exit_code);

        Ok(SyncOutcome {
            status: SyncStatus::from_exit_code(exit_code),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
