use crate::config::ScanConfig;
use crate::error::{FetchFailure, Result};
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Builds the HTTP client used for page loads and resource fetches.
pub fn build_client(config: &ScanConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(config.timeout_secs.div_ceil(2)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Fetches resource bodies for one session. Each URL is requested at most
/// once; the token is checked before a request starts and again once it
/// finishes, so a late response is discarded instead of returned.
pub struct ResourceFetcher {
    client: Client,
    processed: HashSet<String>,
    cancel: CancellationToken,
}

impl ResourceFetcher {
    pub fn new(client: Client, cancel: CancellationToken) -> Self {
        Self {
            client,
            processed: HashSet::new(),
            cancel,
        }
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.processed.contains(url)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub async fn fetch(&mut self, url: &str) -> std::result::Result<String, FetchFailure> {
        if self.cancel.is_cancelled() {
            return Err(FetchFailure::Cancelled(url.to_string()));
        }
        if !self.processed.insert(url.to_string()) {
            return Err(FetchFailure::AlreadyProcessed(url.to_string()));
        }

        debug!("Fetching and processing: {}", url);

        let outcome = self.request(url).await;
        if self.cancel.is_cancelled() {
            return Err(FetchFailure::Cancelled(url.to_string()));
        }
        outcome
    }

    async fn request(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let transport = |source| FetchFailure::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}
