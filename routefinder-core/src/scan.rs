use crate::coordinator::{CoordinatorHandle, ScanCoordinator};
use crate::error::{CoreError, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use routefinder_scanner::{HttpInjector, Injector, RouteSet, ScanConfig, ScanEvent, is_valid_origin};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Options for configuring a scan run
pub struct ScanOptions {
    pub urls: Vec<String>,
    pub show_progress_bars: bool,
    pub config: ScanConfig,
    /// Cancelled by the front-end (Ctrl-C) to stop the active scan.
    pub interrupt: CancellationToken,
}

impl ScanOptions {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            show_progress_bars: false,
            config: ScanConfig::default(),
            interrupt: CancellationToken::new(),
        }
    }
}

/// Callback for scan events as they come in, together with the origin being
/// scanned
pub type ScanEventCallback = Arc<dyn Fn(&str, &ScanEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed { routes: Vec<String> },
    Failed { error: String },
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    pub target: String,
    pub origin: String,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

impl TargetResult {
    pub fn routes(&self) -> &[String] {
        match &self.outcome {
            ScanOutcome::Completed { routes } => routes,
            _ => &[],
        }
    }
}

/// Everything found during one run, grouped by origin.
pub fn collect_routes(results: &[TargetResult]) -> RouteSet {
    let mut set = RouteSet::new();
    for result in results {
        set.merge(&result.origin, result.routes());
    }
    set
}

/// Scheme, host and port of `target`, or `None` for opaque origins.
pub fn target_origin(target: &Url) -> Option<String> {
    let origin = target.origin();
    if !origin.is_tuple() {
        return None;
    }
    let serialized = origin.ascii_serialization();
    is_valid_origin(&serialized).then_some(serialized)
}

/// Scans every URL with the HTTP injector.
pub async fn execute_scan(
    options: ScanOptions,
    event_callback: Option<ScanEventCallback>,
) -> Result<Vec<TargetResult>> {
    let injector = HttpInjector::new(options.config.clone())?;
    execute_scan_with(injector, options, event_callback).await
}

/// Scans each URL in turn through one coordinator. An interrupt stops the
/// active scan and skips the remaining targets.
pub async fn execute_scan_with<I: Injector>(
    injector: I,
    options: ScanOptions,
    event_callback: Option<ScanEventCallback>,
) -> Result<Vec<TargetResult>> {
    let ScanOptions {
        urls,
        show_progress_bars,
        config: _,
        interrupt,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting scan...");
        Some(pb)
    } else {
        None
    };

    let (handle, mut events) = ScanCoordinator::spawn(injector);
    let mut results = Vec::with_capacity(urls.len());

    for (idx, url_str) in urls.iter().enumerate() {
        if interrupt.is_cancelled() {
            break;
        }

        let prefix = if urls.len() > 1 {
            format!("[{}/{}] ", idx + 1, urls.len())
        } else {
            String::new()
        };

        let target = match Url::parse(url_str) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping {}: {}", url_str, e);
                results.push(TargetResult {
                    target: url_str.clone(),
                    origin: String::new(),
                    outcome: ScanOutcome::Failed {
                        error: CoreError::InvalidTarget(format!("{}: {}", url_str, e)).to_string(),
                    },
                });
                continue;
            }
        };
        let Some(origin) = target_origin(&target) else {
            results.push(TargetResult {
                target: url_str.clone(),
                origin: String::new(),
                outcome: ScanOutcome::Failed {
                    error: CoreError::InvalidTarget(format!("{} has no origin", url_str)).to_string(),
                },
            });
            continue;
        };

        if let Some(ref pb) = progress_bar {
            pb.set_message(format!("{}Scanning {}", prefix, origin));
        }
        info!("Scanning {} ({})", origin, target);

        let outcome = scan_target(
            &handle,
            &mut events,
            &target,
            &origin,
            &interrupt,
            |event| {
                if let (Some(pb), ScanEvent::ProgressUpdate { progress, message }) =
                    (&progress_bar, event)
                {
                    pb.set_message(format!("{}{}% {}", prefix, progress, message));
                }
                if let Some(ref callback) = event_callback {
                    match progress_bar {
                        Some(ref pb) => pb.suspend(|| callback(&origin, event)),
                        None => callback(&origin, event),
                    }
                }
            },
        )
        .await?;

        debug!("Scan of {} ended: {:?}", origin, outcome);
        results.push(TargetResult {
            target: target.to_string(),
            origin,
            outcome,
        });
    }

    if let Some(ref pb) = progress_bar {
        let total = collect_routes(&results).len();
        if interrupt.is_cancelled() {
            pb.finish_with_message(format!("Scan stopped. {} routes found", total));
        } else {
            pb.finish_with_message(format!("Scan complete! {} routes found", total));
        }
    }

    Ok(results)
}

async fn scan_target(
    handle: &CoordinatorHandle,
    events: &mut UnboundedReceiver<ScanEvent>,
    target: &Url,
    origin: &str,
    interrupt: &CancellationToken,
    mut on_event: impl FnMut(&ScanEvent),
) -> Result<ScanOutcome> {
    tokio::select! {
        ack = handle.start(target.clone(), origin) => {
            ack?;
        }
        _ = interrupt.cancelled() => {
            handle.stop().await?;
            return Ok(ScanOutcome::Stopped);
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.ok_or(CoreError::CoordinatorClosed)?;
                on_event(&event);
                match event {
                    ScanEvent::ScanComplete { mut routes_by_origin } => {
                        let routes = routes_by_origin.remove(origin).unwrap_or_default();
                        return Ok(ScanOutcome::Completed { routes });
                    }
                    ScanEvent::ScanError { error } => {
                        return Ok(ScanOutcome::Failed { error });
                    }
                    _ => {}
                }
            }
            _ = interrupt.cancelled() => {
                handle.stop().await?;
                return Ok(ScanOutcome::Stopped);
            }
        }
    }
}

/// Render stored or freshly found routes as text
pub fn generate_route_report(routes: &RouteSet) -> String {
    let mut report = String::new();
    report.push_str(&"━".repeat(52));
    report.push_str("\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Origins: {}\n", routes.origins().count()));
    report.push_str(&format!("  Routes found: {}\n", routes.len()));
    report.push('\n');
    report.push_str(&"━".repeat(52));
    report.push_str("\n\n");

    for (origin, origin_routes) in routes.iter() {
        report.push_str(&format!("## {}\n", origin.bright_white().bold()));
        report.push_str(&format!("  {} routes found\n\n", origin_routes.len()));
        for route in origin_routes {
            report.push_str(&format!("  {} {}\n", "→".blue(), route));
        }
        report.push('\n');
    }

    report
}

/// One line per target: what happened to it.
pub fn generate_outcome_summary(results: &[TargetResult]) -> String {
    let mut summary = String::new();
    for result in results {
        let line = match &result.outcome {
            ScanOutcome::Completed { routes } => format!(
                "{} {} ({} routes)",
                "✓".green().bold(),
                result.target,
                routes.len()
            ),
            ScanOutcome::Failed { error } => {
                format!("{} {}: {}", "✗".red().bold(), result.target, error)
            }
            ScanOutcome::Stopped => format!("{} {} (stopped)", "⚠".yellow().bold(), result.target),
        };
        summary.push_str(&line);
        summary.push('\n');
    }
    summary
}
