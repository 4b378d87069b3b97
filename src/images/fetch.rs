use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::images::vector::{is_valid_icon_id, IconRegistry, VectorIcon};
use crate::retry::{
    retry_with_backoff, run_catching, Cancelled, Caught, MapFailure, RetryError, RetryPolicy,
};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Icon request failed with status: {0}")]
    Status(StatusCode),

    #[error("Invalid icon id: {0}")]
    InvalidId(String),

    #[error("Invalid icon data: {0}")]
    InvalidIcon(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl FetchError {
    /// Rate limiting, server errors and transport failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NetworkError(e) => !e.is_builder() && !e.is_decode(),
            FetchError::Status(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

impl From<RetryError<FetchError>> for FetchError {
    fn from(error: RetryError<FetchError>) -> Self {
        match error {
            RetryError::Cancelled(cancelled) => FetchError::Cancelled(cancelled),
            RetryError::Failed(error) => error,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreloadReport {
    pub loaded: usize,
    pub failed: Vec<String>,
}

/// Downloads SVG icons from a remote icon server.
pub struct IconFetcher {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl IconFetcher {
    pub fn new(
        base_url: impl Into<String>,
        timeout: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
        })
    }

    pub fn icon_url(&self, id: &str) -> String {
        format!("{}/{}.svg", self.base_url.trim_end_matches('/'), id)
    }

    // Fetch one icon, retrying transient failures
    pub async fn fetch_svg(
        &self,
        id: &str,
        token: &CancellationToken,
    ) -> Result<String, FetchError> {
        if !is_valid_icon_id(id) {
            return Err(FetchError::InvalidId(id.to_string()));
        }

        let url = self.icon_url(id);
        let url = url.as_str();
        let svg = retry_with_backoff(
            &self.policy,
            token,
            |attempt, error: &FetchError| {
                let transient = error.is_transient();
                if transient {
                    warn!(
                        "Fetching icon '{}' failed on attempt {}: {}",
                        id,
                        attempt + 1,
                        error
                    );
                }
                transient
            },
            move |_| self.make_request(url),
        )
        .await?;

        Ok(svg)
    }

    async fn make_request(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "image/svg+xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("Icon request to {} failed with status: {}", url, status);
            return Err(FetchError::Status(status));
        }

        debug!("Icon request to {} successful", url);
        Ok(response.text().await?)
    }

    /// Fetches every id into `registry`. Individual failures are logged and
    /// reported; cancellation stops the whole preload.
    pub async fn preload(
        &self,
        ids: &[String],
        registry: &IconRegistry,
        token: &CancellationToken,
    ) -> Result<PreloadReport, Cancelled> {
        let mut report = PreloadReport::default();

        for id in ids {
            let outcome = run_catching(token, async {
                let svg = self.fetch_svg(id, token).await?;
                VectorIcon::from_svg(id, &svg)
                    .map_err(|e| FetchError::InvalidIcon(e.to_string()))?;
                Ok::<_, FetchError>(svg)
            })
            .await?;

            if let Err(Caught::Failed(FetchError::Cancelled(cancelled))) = &outcome {
                return Err(*cancelled);
            }

            match outcome.map_failure(|error| format!("{} ({})", error, self.icon_url(id))) {
                Ok(svg) => {
                    registry.register(id.clone(), svg);
                    report.loaded += 1;
                }
                Err(caught) => {
                    warn!("Failed to preload icon '{}': {}", id, caught);
                    report.failed.push(id.clone());
                }
            }
        }

        info!(
            "Preloaded {}/{} remote icons",
            report.loaded,
            ids.len()
        );
        Ok(report)
    }
}
