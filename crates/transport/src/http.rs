//! Remote existence checks over plain HTTP
//!
//! The bucket is public-read, so a `HEAD` on the object URL is enough.

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;
use gallery_core::ExistenceOracle;
use tracing::debug;

/// Existence oracle that issues `HEAD <base_url><prefix><src>`
pub struct HttpOracle {
    client: reqwest::Client,
    /// Base URL with the key prefix appended, always ending in `/`
    object_base: String,
}

impl HttpOracle {
    /// Build an oracle for objects under `prefix` at `base_url`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, prefix: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("could not build HTTP client")?;

        Ok(Self {
            client,
            object_base: object_base(base_url, prefix),
        })
    }

    /// Public URL of the object for a manifest `src`
    #[must_use]
    pub fn object_url(&self, src: &str) -> String {
        format!("{}{}", self.object_base, src.replace('\\', "/").trim_start_matches('/'))
    }
}

fn object_base(base_url: &str, prefix: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{prefix}/")
    }
}

#[async_trait]
impl ExistenceOracle for HttpOracle {
    async fn exists(&self, src: &str) -> bool {
        let url = self.object_url(src);
        match self.client.head(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    debug!("HEAD {url}: HTTP {status}");
                }
                status.is_success()
            }
            Err(e) => {
                debug!("HEAD {url} failed: {e}");
                false
            }
        }
    }
}
