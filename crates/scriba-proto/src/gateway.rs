//! Remote operation gateway — the asynchronous call boundary to the backend.
//!
//! The control surface never talks to the backend directly.  Every operation
//! is an async request through a cloneable [`Gateway`] handle; a driver task
//! on the other end of the channel services requests (HTTP in production,
//! scripted responders in tests).  Every call may fail or be arbitrarily slow,
//! and no ordering holds across independent calls.

use tokio::sync::{mpsc, oneshot};

use crate::history::HistorySnapshot;

/// Errors surfaced by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The driver task is gone (backend shut down or channel dropped).
    #[error("gateway closed")]
    Closed,
    /// The backend answered with an error.
    #[error("backend error: {0}")]
    Backend(String),
}

type Reply<T> = oneshot::Sender<Result<T, GatewayError>>;

/// One backend operation plus its reply slot.
#[derive(Debug)]
pub enum GatewayRequest {
    ListHistory {
        reply: Reply<HistorySnapshot>,
    },
    PlayItem {
        filename: String,
        /// `true` = backend acknowledged playback started.
        reply: Reply<bool>,
    },
    StopPlayback {
        reply: Reply<()>,
    },
    IsPlaying {
        reply: Reply<bool>,
    },
    ReprocessItem {
        filename: String,
        /// `None` = backend reported no result (transcription failed).
        reply: Reply<Option<HistorySnapshot>>,
    },
    DeleteItem {
        filename: String,
        reply: Reply<HistorySnapshot>,
    },
}

/// Cloneable handle for issuing backend operations.
#[derive(Debug, Clone)]
pub struct Gateway {
    tx: mpsc::Sender<GatewayRequest>,
}

impl Gateway {
    /// Create a gateway and the request stream a driver task must service.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<GatewayRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> GatewayRequest,
    ) -> Result<T, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| GatewayError::Closed)?;
        rx.await.map_err(|_| GatewayError::Closed)?
    }

    pub async fn list_history(&self) -> Result<HistorySnapshot, GatewayError> {
        self.call(|reply| GatewayRequest::ListHistory { reply }).await
    }

    pub async fn play_item(&self, filename: &str) -> Result<bool, GatewayError> {
        let filename = filename.to_string();
        self.call(|reply| GatewayRequest::PlayItem { filename, reply })
            .await
    }

    pub async fn stop_playback(&self) -> Result<(), GatewayError> {
        self.call(|reply| GatewayRequest::StopPlayback { reply }).await
    }

    pub async fn is_playing(&self) -> Result<bool, GatewayError> {
        self.call(|reply| GatewayRequest::IsPlaying { reply }).await
    }

    pub async fn reprocess_item(
        &self,
        filename: &str,
    ) -> Result<Option<HistorySnapshot>, GatewayError> {
        let filename = filename.to_string();
        self.call(|reply| GatewayRequest::ReprocessItem { filename, reply })
            .await
    }

    pub async fn delete_item(&self, filename: &str) -> Result<HistorySnapshot, GatewayError> {
        let filename = filename.to_string();
        self.call(|reply| GatewayRequest::DeleteItem { filename, reply })
            .await
    }
}
