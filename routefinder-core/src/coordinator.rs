// Process-wide scan controller. Owns the scan status and relays session
// signals to the listener as public events.

use crate::error::{CoreError, Result};
use routefinder_scanner::{
    Injector, ScanEvent, SessionChannel, SessionEvent, SessionId, SessionSignal, StartAck,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Completed,
    Errored,
}

/// Snapshot returned by [`CoordinatorHandle::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub progress: u8,
    pub message: String,
    #[serde(skip)]
    pub state: ScanState,
}

impl ScanStatus {
    fn initial() -> Self {
        Self {
            is_scanning: false,
            progress: 0,
            message: "Initializing...".to_string(),
            state: ScanState::Idle,
        }
    }
}

enum Command {
    Start {
        target: Url,
        origin: String,
        reply: oneshot::Sender<StartAck>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable front for a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ScanStatus>,
}

impl CoordinatorHandle {
    /// Requests a scan of `target`. Resolves once the session has been
    /// injected, or the attempt failed (reported as a `ScanError` event), or
    /// a stop arrived. Resolves immediately when a scan is already running.
    pub async fn start(&self, target: Url, origin: impl Into<String>) -> Result<StartAck> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(Command::Start {
                target,
                origin: origin.into(),
                reply,
            })
            .map_err(|_| CoreError::CoordinatorClosed)?;
        ack.await.map_err(|_| CoreError::CoordinatorClosed)
    }

    pub async fn stop(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Stop { reply })
            .map_err(|_| CoreError::CoordinatorClosed)?;
        done.await.map_err(|_| CoreError::CoordinatorClosed)
    }

    /// Current status. Never triggers work.
    pub fn status(&self) -> ScanStatus {
        self.status.borrow().clone()
    }
}

pub struct ScanCoordinator<I: Injector> {
    injector: Arc<I>,
    state: ScanState,
    progress: u8,
    message: String,
    aborted: bool,
    cancel: CancellationToken,
    active: Option<SessionId>,
    next_session: u64,
    pending_ack: Option<(SessionId, oneshot::Sender<StartAck>)>,
    status_tx: watch::Sender<ScanStatus>,
    listener: mpsc::UnboundedSender<ScanEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl<I: Injector> ScanCoordinator<I> {
    /// Spawns the coordinator task. Public events arrive on the returned
    /// receiver. Dropping every handle shuts the coordinator down and cancels
    /// the active session.
    pub fn spawn(injector: I) -> (CoordinatorHandle, mpsc::UnboundedReceiver<ScanEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (listener, events) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let initial = ScanStatus::initial();
        let (status_tx, status_rx) = watch::channel(initial.clone());

        let coordinator = Self {
            injector: Arc::new(injector),
            state: initial.state,
            progress: initial.progress,
            message: initial.message,
            aborted: false,
            cancel: CancellationToken::new(),
            active: None,
            next_session: 0,
            pending_ack: None,
            status_tx,
            listener,
            session_tx,
        };
        tokio::spawn(coordinator.run(command_rx, session_rx));

        (
            CoordinatorHandle {
                commands: command_tx,
                status: status_rx,
            },
            events,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut sessions: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start { target, origin, reply }) => {
                        self.start(target, origin, reply);
                    }
                    Some(Command::Stop { reply }) => {
                        self.stop();
                        let _ = reply.send(());
                    }
                    None => break,
                },
                Some(event) = sessions.recv() => self.relay(event),
            }
        }

        self.cancel.cancel();
        debug!("Scan coordinator shut down");
    }

    /// Accepts a start and launches probe and injection on their own task.
    /// The reply is held until that task reports back, or a stop arrives.
    fn start(&mut self, target: Url, origin: String, reply: oneshot::Sender<StartAck>) {
        if self.state == ScanState::Running {
            debug!("Scan already running, ignoring start for {}", origin);
            let _ = reply.send(StartAck { success: true });
            return;
        }

        self.settle_pending_ack();
        self.aborted = false;
        self.cancel = CancellationToken::new();
        self.next_session += 1;
        let session = SessionId(self.next_session);
        self.active = Some(session);
        self.pending_ack = Some((session, reply));
        self.state = ScanState::Running;
        self.publish();
        info!("Starting {} for {} ({})", session, origin, target);

        let channel = SessionChannel::new(
            session,
            origin,
            self.cancel.clone(),
            self.session_tx.clone(),
        );
        tokio::spawn(launch(Arc::clone(&self.injector), target, channel));
    }

    fn stop(&mut self) {
        self.aborted = true;
        self.cancel.cancel();
        self.settle_pending_ack();
        self.state = if self.active.is_some() {
            ScanState::Stopping
        } else {
            ScanState::Stopped
        };
        self.progress = 0;
        self.message = "Scan stopped".to_string();
        self.publish();
        self.emit(ScanEvent::ProgressUpdate {
            progress: 0,
            message: "Scan stopped".to_string(),
        });
    }

    fn relay(&mut self, event: SessionEvent) {
        if matches!(
            event.signal,
            SessionSignal::Injected | SessionSignal::InjectFailed { .. }
        ) && self
            .pending_ack
            .as_ref()
            .is_some_and(|(session, _)| *session == event.session)
        {
            self.settle_pending_ack();
        }

        if self.active != Some(event.session) {
            trace!("Dropping {:?} from stale {}", event.signal, event.session);
            return;
        }

        match event.signal {
            SessionSignal::Exited => {
                self.active = None;
                match self.state {
                    ScanState::Stopping => self.state = ScanState::Stopped,
                    ScanState::Running => {
                        warn!("{} exited without a result", event.session);
                        self.state = ScanState::Idle;
                    }
                    _ => {}
                }
                self.publish();
            }
            SessionSignal::Injected => {
                debug!("{} injected", event.session);
            }
            SessionSignal::InjectFailed { error } => {
                self.active = None;
                if self.aborted {
                    debug!("{} failed to start after stop: {}", event.session, error);
                    self.state = ScanState::Stopped;
                } else {
                    self.state = ScanState::Errored;
                    self.emit(ScanEvent::ScanError { error });
                }
                self.publish();
            }
            signal if self.aborted => {
                trace!("Dropping {:?} after stop", signal);
            }
            SessionSignal::SpaDetected { is_spa } => {
                self.emit(if is_spa {
                    ScanEvent::IsSpa
                } else {
                    ScanEvent::NotSpa
                });
            }
            SessionSignal::Progress { progress, message } => {
                self.progress = progress.min(100);
                self.message = message.clone();
                self.publish();
                self.emit(ScanEvent::ProgressUpdate {
                    progress: self.progress,
                    message,
                });
            }
            SessionSignal::RealTimeUpdate { origin, new_routes } => {
                self.emit(ScanEvent::RealTimeUpdate { origin, new_routes });
            }
            SessionSignal::Complete { routes_by_origin } => {
                self.state = ScanState::Completed;
                self.publish();
                self.emit(ScanEvent::ScanComplete { routes_by_origin });
            }
            SessionSignal::Error { error } => {
                self.state = ScanState::Errored;
                self.publish();
                self.emit(ScanEvent::ScanError { error });
            }
        }
    }

    fn settle_pending_ack(&mut self) {
        if let Some((_, reply)) = self.pending_ack.take() {
            let _ = reply.send(StartAck { success: true });
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(ScanStatus {
            is_scanning: self.state == ScanState::Running,
            progress: self.progress,
            message: self.message.clone(),
            state: self.state,
        });
    }

    fn emit(&self, event: ScanEvent) {
        if self.listener.send(event).is_err() {
            trace!("No listener for scan events");
        }
    }
}

/// Probes and injects one session, reporting each outcome back through
/// `channel`. Injection is skipped once the session is cancelled.
async fn launch<I: Injector>(injector: Arc<I>, target: Url, channel: SessionChannel) {
    let reporter = channel.clone();

    // Advisory only, the scan proceeds either way
    match injector.probe_spa(&target).await {
        Ok(is_spa) => {
            reporter.send(SessionSignal::SpaDetected { is_spa });
        }
        Err(e) => warn!("SPA probe failed for {}: {}", target, e),
    }

    let outcome = if reporter.is_cancelled() {
        SessionSignal::InjectFailed {
            error: format!("{} stopped before injection", reporter.session),
        }
    } else {
        match injector.inject(&target, channel).await {
            Ok(()) => SessionSignal::Injected,
            Err(e) => {
                warn!("Injection into {} failed: {}", target, e);
                SessionSignal::InjectFailed {
                    error: e.to_string(),
                }
            }
        }
    };
    reporter.report(outcome);
}
