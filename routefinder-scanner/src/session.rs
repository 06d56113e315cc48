use crate::config::ScanConfig;
use crate::error::{FetchFailure, Result, ScanError};
use crate::event::{SessionChannel, SessionSignal};
use crate::extractor::PathExtractor;
use crate::fetcher::{ResourceFetcher, build_client};
use crate::page::{Page, is_script_resource};
use reqwest::Client;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    DiscoveringResources,
    ProcessingScripts,
    ScanningPageContent,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

/// One scan run against one page. Resources are processed strictly one at a
/// time; the route set and processed-set belong to this session only.
pub struct ScanSession<P: Page> {
    page: P,
    channel: SessionChannel,
    fetcher: ResourceFetcher,
    extractor: PathExtractor,
    markup_extractor: PathExtractor,
    routes: HashSet<String>,
    state: SessionState,
    finalize_delay: Duration,
}

impl<P: Page> ScanSession<P> {
    pub fn new(page: P, channel: SessionChannel, config: &ScanConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self::with_client(page, channel, client, config))
    }

    pub fn with_client(
        page: P,
        channel: SessionChannel,
        client: Client,
        config: &ScanConfig,
    ) -> Self {
        let fetcher = ResourceFetcher::new(client, channel.cancel_token().clone());
        Self {
            page,
            channel,
            fetcher,
            extractor: PathExtractor::new(),
            markup_extractor: PathExtractor::for_markup(),
            routes: HashSet::new(),
            state: SessionState::NotStarted,
            finalize_delay: config.finalize_delay(),
        }
    }

    /// Runs the session to a terminal state. The coordinator always receives
    /// a final `Exited` signal, whatever the outcome.
    pub async fn run(mut self) -> SessionState {
        info!("{} scanning for {}", self.channel.session, self.channel.origin);

        let outcome = self.drive().await;
        self.state = match outcome {
            Ok(state) => state,
            Err(_) if self.channel.is_cancelled() => SessionState::Cancelled,
            Err(e) => {
                warn!("{} failed: {}", self.channel.session, e);
                self.channel.send(SessionSignal::Error {
                    error: e.to_string(),
                });
                SessionState::Failed
            }
        };

        debug!("{} finished in state {:?}", self.channel.session, self.state);
        self.channel.finish();
        self.state
    }

    async fn drive(&mut self) -> Result<SessionState> {
        self.state = SessionState::DiscoveringResources;
        if self.channel.is_cancelled() {
            return Ok(SessionState::Cancelled);
        }
        self.progress(10, "Scanning page resources...")?;

        let resources: Vec<String> = self
            .page
            .resource_entries()?
            .into_iter()
            .filter(|url| is_script_resource(url))
            .collect();
        debug!("Script resources found: {}", resources.len());

        self.state = SessionState::ProcessingScripts;
        self.progress(30, "Processing JavaScript files...")?;
        let total = resources.len();
        for (i, url) in resources.iter().enumerate() {
            if self.channel.is_cancelled() {
                return Ok(SessionState::Cancelled);
            }
            self.process_resource(url).await?;
            let percent = 30 + (30 * (i + 1) / total) as u8;
            self.progress(percent, &format!("Processing {}/{} files...", i + 1, total))?;
        }

        self.state = SessionState::ScanningPageContent;
        if self.channel.is_cancelled() {
            return Ok(SessionState::Cancelled);
        }
        self.progress(70, "Scanning page content...")?;
        for src in self.page.script_sources()? {
            if self.channel.is_cancelled() {
                return Ok(SessionState::Cancelled);
            }
            if !src.is_empty() {
                self.process_resource(&src).await?;
            }
        }

        let markup = self.page.markup()?;
        let page_paths = self.markup_extractor.extract(&markup);
        self.report_new_routes(page_paths)?;

        self.state = SessionState::Finalizing;
        if self.channel.is_cancelled() {
            return Ok(SessionState::Cancelled);
        }
        self.progress(90, "Finalizing results...")?;

        tokio::select! {
            _ = tokio::time::sleep(self.finalize_delay) => {}
            _ = self.channel.cancel_token().cancelled() => {
                return Ok(SessionState::Cancelled);
            }
        }

        let mut unique: Vec<String> = self
            .routes
            .iter()
            .filter(|route| route.len() > 1)
            .cloned()
            .collect();
        unique.sort();
        info!("{} found {} routes", self.channel.session, unique.len());

        self.progress(100, &format!("Found {} routes", unique.len()))?;
        let mut routes_by_origin = BTreeMap::new();
        routes_by_origin.insert(self.channel.origin.clone(), unique);
        self.emit(SessionSignal::Complete { routes_by_origin })?;

        Ok(SessionState::Completed)
    }

    async fn process_resource(&mut self, url: &str) -> Result<()> {
        match self.fetcher.fetch(url).await {
            Ok(content) => {
                let paths = self.extractor.extract(&content);
                self.report_new_routes(paths)
            }
            Err(FetchFailure::AlreadyProcessed(_)) | Err(FetchFailure::Cancelled(_)) => Ok(()),
            Err(failure) => {
                if !self.channel.is_cancelled() {
                    warn!("Failed to fetch resource: {}", failure);
                }
                Ok(())
            }
        }
    }

    /// Adds `paths` to the session set and emits the ones not seen before.
    fn report_new_routes(&mut self, paths: Vec<String>) -> Result<()> {
        let mut new_routes = Vec::new();
        for path in paths {
            if self.routes.insert(path.clone()) {
                new_routes.push(path);
            }
        }
        if new_routes.is_empty() {
            return Ok(());
        }

        self.emit(SessionSignal::RealTimeUpdate {
            origin: self.channel.origin.clone(),
            new_routes,
        })
    }

    fn progress(&self, progress: u8, message: &str) -> Result<()> {
        self.emit(SessionSignal::Progress {
            progress,
            message: message.to_string(),
        })
    }

    /// A dropped receiver means nobody is listening any more, so the session
    /// fails. After cancellation sends are silently skipped.
    fn emit(&self, signal: SessionSignal) -> Result<()> {
        if self.channel.is_cancelled() {
            return Ok(());
        }
        if self.channel.send(signal) {
            Ok(())
        } else {
            Err(ScanError::ChannelClosed)
        }
    }
}
