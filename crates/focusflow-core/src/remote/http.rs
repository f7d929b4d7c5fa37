//! HTTP client for the session and catalog endpoints.
//!
//! Session calls are spawned on a private runtime and never block the
//! caller. Catalog listings are only fetched while loading, so they block
//! for at most the configured timeout.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use super::{
    CatalogEntry, CatalogService, PendingSession, SessionOutcome, SessionRef, SessionService,
    StartSessionRequest, StartSessionResponse,
};
use crate::error::RemoteError;
use crate::storage::ServerConfig;

pub struct HttpBackend {
    base: Url,
    client: Client,
    runtime: tokio::runtime::Runtime,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Setup(e.to_string()))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("focusflow-http")
            .enable_all()
            .build()
            .map_err(|e| RemoteError::Setup(e.to_string()))?;
        Ok(Self {
            base,
            client,
            runtime,
            in_flight: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, RemoteError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs.max(1)))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(path)?)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        let request = self.client.get(url.clone());
        self.runtime.block_on(send_and_decode(request, url.as_str()))
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Requests spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .map(|hs| hs.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

fn post<B: Serialize>(client: &Client, url: &Url, body: &B) -> reqwest::RequestBuilder {
    tracing::debug!(%url, "POST");
    client.post(url.clone()).json(body)
}

async fn send_and_decode<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<T, RemoteError> {
    let transport = |source| RemoteError::Transport {
        endpoint: endpoint.to_string(),
        source,
    };
    let resp = request.send().await.map_err(transport)?;
    let status = resp.status();
    let body = resp.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| RemoteError::Malformed {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

impl SessionService for HttpBackend {
    fn start_session(&self, request: &StartSessionRequest) -> PendingSession {
        let url = match self.endpoint("api/session/start") {
            Ok(url) => url,
            Err(e) => return PendingSession::resolved(Err(e)),
        };
        let call = post(&self.client, &url, request);
        let (reply, pending) = PendingSession::channel();
        self.spawn(async move {
            let result = send_and_decode::<StartSessionResponse>(call, url.as_str())
                .await
                .map(|resp| resp.session_id);
            let _ = reply.send(result);
        });
        pending
    }

    fn end_session(&self, session: SessionRef, outcome: SessionOutcome) {
        let url = match self.endpoint("api/session/end") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "failed to end remote session");
                return;
            }
        };
        let client = self.client.clone();
        self.spawn(async move {
            let session_id = match session.resolve().await {
                Ok(id) => id,
                Err(e) => {
                    tracing::debug!(error = %e, "no remote session to end");
                    return;
                }
            };
            let call = post(&client, &url, &outcome.request(session_id));
            if let Err(e) = send_and_decode::<serde_json::Value>(call, url.as_str()).await {
                tracing::warn!(error = %e, "failed to end remote session");
            }
        });
    }

    fn flush(&self, timeout: Duration) {
        let handles: Vec<_> = match self.in_flight.lock() {
            Ok(mut in_flight) => in_flight.drain(..).collect(),
            Err(_) => return,
        };
        if handles.is_empty() {
            return;
        }
        let pending = handles.len();
        let drained = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                for handle in handles {
                    let _ = handle.await;
                }
            })
            .await
        });
        if drained.is_err() {
            tracing::warn!(pending, "gave up waiting for session requests");
        }
    }
}

impl CatalogService for HttpBackend {
    fn audio_files(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.get_json("api/audio-files")
    }

    fn backgrounds(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.get_json("api/backgrounds")
    }
}
