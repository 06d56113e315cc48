// Code-injection boundary between the coordinator and a page context

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::event::SessionChannel;
use crate::fetcher::build_client;
use crate::page::PageSnapshot;
use crate::session::ScanSession;
use crate::spa;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::debug;
use url::Url;

/// Runs scanner code in a target's page context.
pub trait Injector: Send + Sync + 'static {
    /// Evaluates the SPA heuristic inside the target.
    fn probe_spa(&self, target: &Url) -> impl Future<Output = Result<bool>> + Send;

    /// Starts a session for `channel.origin` inside the target and returns
    /// once it is running. The session reports back through `channel` only.
    fn inject(
        &self,
        target: &Url,
        channel: SessionChannel,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Injector that loads the target over HTTP and runs the session on the
/// tokio runtime against the loaded snapshot. A snapshot loaded by the SPA check
/// is reused by the following injection into the same target.
pub struct HttpInjector {
    client: Client,
    config: ScanConfig,
    loaded: Mutex<HashMap<Url, PageSnapshot>>,
}

impl HttpInjector {
    pub fn new(config: ScanConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            client,
            config,
            loaded: Mutex::new(HashMap::new()),
        })
    }

    async fn load(&self, target: &Url) -> Result<PageSnapshot> {
        PageSnapshot::load(&self.client, target)
            .await
            .map_err(|e| ScanError::InjectionFailed(format!("cannot load {}: {}", target, e)))
    }

    fn take_loaded(&self, target: &Url) -> Option<PageSnapshot> {
        self.loaded
            .lock()
            .ok()
            .and_then(|mut loaded| loaded.remove(target))
    }
}

impl Injector for HttpInjector {
    async fn probe_spa(&self, target: &Url) -> Result<bool> {
        let page = self.load(target).await?;
        let is_spa = spa::probe_page(&page)?;
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(target.clone(), page);
        }
        Ok(is_spa)
    }

    async fn inject(&self, target: &Url, channel: SessionChannel) -> Result<()> {
        let page = match self.take_loaded(target) {
            Some(page) => page,
            None => self.load(target).await?,
        };
        debug!(
            "Injecting {} into {} ({} resources)",
            channel.session,
            target,
            page.resources.len()
        );

        let session = ScanSession::with_client(page, channel, self.client.clone(), &self.config);
        tokio::spawn(session.run());
        Ok(())
    }
}
