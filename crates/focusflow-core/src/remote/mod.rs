//! External collaborators: the session bookkeeping service and the media
//! catalog. Engines only see these traits; any failure means "continue
//! locally".

mod http;

pub use http::HttpBackend;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::RemoteError;
use crate::timer::SessionType;

/// Opaque handle for a session opened on the remote service.
///
/// Whatever JSON value the service returned is echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(serde_json::Value);

impl SessionId {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// One item of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub file: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }

    /// Filename up to the first `.`, lowercased.
    pub fn stem(&self) -> String {
        self.file
            .split('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// Planned duration in whole minutes.
    pub duration: u64,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StartSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndSessionRequest {
    pub session_id: SessionId,
    /// Elapsed whole minutes.
    pub actual_duration: u64,
    pub completed: bool,
}

/// How a session ended, before the remote id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Elapsed whole minutes.
    pub actual_duration: u64,
    pub completed: bool,
}

impl SessionOutcome {
    pub fn request(self, session_id: SessionId) -> EndSessionRequest {
        EndSessionRequest {
            session_id,
            actual_duration: self.actual_duration,
            completed: self.completed,
        }
    }
}

/// Sending half of a [`PendingSession`].
pub type SessionReply = oneshot::Sender<Result<SessionId, RemoteError>>;

/// Reply to a start request that may still be in flight.
#[derive(Debug)]
pub struct PendingSession {
    rx: oneshot::Receiver<Result<SessionId, RemoteError>>,
}

impl PendingSession {
    pub fn channel() -> (SessionReply, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A reply that is already known.
    pub fn resolved(result: Result<SessionId, RemoteError>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(result);
        pending
    }

    /// Non-blocking check. `None` while the request is in flight.
    pub fn try_take(&mut self) -> Option<Result<SessionId, RemoteError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RemoteError::Abandoned)),
        }
    }

    pub async fn wait(self) -> Result<SessionId, RemoteError> {
        self.rx.await.unwrap_or(Err(RemoteError::Abandoned))
    }

    /// Block the calling thread until the reply arrives. Must not be called
    /// from inside an async runtime.
    pub fn blocking_wait(self) -> Result<SessionId, RemoteError> {
        self.rx.blocking_recv().unwrap_or(Err(RemoteError::Abandoned))
    }
}

/// The session an end request refers to.
#[derive(Debug)]
pub enum SessionRef {
    Open(SessionId),
    /// The start request has not answered yet.
    Opening(PendingSession),
}

impl SessionRef {
    pub async fn resolve(self) -> Result<SessionId, RemoteError> {
        match self {
            SessionRef::Open(id) => Ok(id),
            SessionRef::Opening(pending) => pending.wait().await,
        }
    }
}

/// Session bookkeeping. Neither call may block the caller: start replies
/// through a [`PendingSession`], end is fire and forget and the
/// implementation logs its own failures.
pub trait SessionService: Send + Sync {
    fn start_session(&self, request: &StartSessionRequest) -> PendingSession;
    fn end_session(&self, session: SessionRef, outcome: SessionOutcome);
    /// Wait up to `timeout` for requests still in flight. Called on
    /// shutdown, never while timing.
    fn flush(&self, _timeout: Duration) {}
}

pub trait CatalogService: Send + Sync {
    fn audio_files(&self) -> Result<Vec<CatalogEntry>, RemoteError>;
    fn backgrounds(&self) -> Result<Vec<CatalogEntry>, RemoteError>;
}

/// Backend for local-only operation: every request fails with
/// [`RemoteError::Offline`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

impl SessionService for OfflineBackend {
    fn start_session(&self, _request: &StartSessionRequest) -> PendingSession {
        PendingSession::resolved(Err(RemoteError::Offline))
    }

    fn end_session(&self, _session: SessionRef, _outcome: SessionOutcome) {}
}

impl CatalogService for OfflineBackend {
    fn audio_files(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        Err(RemoteError::Offline)
    }

    fn backgrounds(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        Err(RemoteError::Offline)
    }
}
