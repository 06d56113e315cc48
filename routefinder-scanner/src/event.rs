// Messages exchanged between scan sessions, the coordinator and listeners

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Public event vocabulary delivered to display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanEvent {
    IsSpa,
    NotSpa,
    ProgressUpdate {
        progress: u8,
        message: String,
    },
    RealTimeUpdate {
        origin: String,
        #[serde(rename = "newRoutes")]
        new_routes: Vec<String>,
    },
    ScanComplete {
        #[serde(rename = "routesByOrigin")]
        routes_by_origin: BTreeMap<String, Vec<String>>,
    },
    ScanError {
        error: String,
    },
}

/// Reply to a start request. `success` is true for an accepted start and
/// for a start ignored because a scan is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Internal signal sent by a session to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Progress {
        progress: u8,
        message: String,
    },
    RealTimeUpdate {
        origin: String,
        new_routes: Vec<String>,
    },
    Complete {
        routes_by_origin: BTreeMap<String, Vec<String>>,
    },
    Error {
        error: String,
    },
    /// The session task has returned. Never relayed.
    Exited,
    /// Launch outcome of the SPA check.
    SpaDetected {
        is_spa: bool,
    },
    /// Launch outcome: the session is running inside the target.
    Injected,
    /// Launch outcome: the session could not be started.
    InjectFailed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub signal: SessionSignal,
}

/// Everything a session receives from the coordinator: the origin it scans
/// for, a cancellation token and the way back.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    pub session: SessionId,
    pub origin: String,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionChannel {
    pub fn new(
        session: SessionId,
        origin: impl Into<String>,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            origin: origin.into(),
            cancel,
            events,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sends a signal unless the session was cancelled. Returns false when
    /// nothing was sent.
    pub fn send(&self, signal: SessionSignal) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.deliver(signal)
    }

    /// Reports that the session task is done. Sent even after cancellation.
    pub fn finish(&self) {
        self.deliver(SessionSignal::Exited);
    }

    /// Sends a launch outcome. Delivered even after cancellation so the
    /// coordinator can settle a pending start.
    pub fn report(&self, signal: SessionSignal) -> bool {
        self.deliver(signal)
    }

    fn deliver(&self, signal: SessionSignal) -> bool {
        self.events
            .send(SessionEvent {
                session: self.session,
                signal,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ScanEvent::RealTimeUpdate {
            origin: "https://a.test".to_string(),
            new_routes: vec!["/x".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "REAL_TIME_UPDATE",
                "origin": "https://a.test",
                "newRoutes": ["/x"],
            })
        );

        let json = serde_json::to_value(ScanEvent::IsSpa).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "IS_SPA" }));
    }

    #[test]
    fn test_channel_suppresses_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let channel = SessionChannel::new(SessionId(7), "https://a.test", cancel.clone(), tx);

        assert!(channel.send(SessionSignal::Error {
            error: "boom".to_string()
        }));
        cancel.cancel();
        assert!(!channel.send(SessionSignal::Progress {
            progress: 50,
            message: "late".to_string()
        }));
        channel.finish();

        assert_eq!(
            rx.try_recv().unwrap().signal,
            SessionSignal::Error {
                error: "boom".to_string()
            }
        );
        let last = rx.try_recv().unwrap();
        assert_eq!(last.session, SessionId(7));
        assert_eq!(last.signal, SessionSignal::Exited);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_launch_outcome_delivered_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let channel = SessionChannel::new(SessionId(2), "https://a.test", cancel.clone(), tx);

        cancel.cancel();
        assert!(!channel.send(SessionSignal::SpaDetected { is_spa: true }));
        assert!(channel.report(SessionSignal::InjectFailed {
            error: "tab closed".to_string()
        }));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, SessionId(2));
        assert_eq!(
            event.signal,
            SessionSignal::InjectFailed {
                error: "tab closed".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
