//! HTTP driver for the gateway — translates [`GatewayRequest`]s into calls
//! against the backend's REST surface.
//!
//! Each request is serviced in its own task so a slow history fetch never
//! blocks a stop.  Ordering guarantees live with the callers: the controller
//! sequences the calls that must be sequenced before they reach this layer.

use scriba_proto::config::BackendConfig;
use scriba_proto::gateway::{GatewayError, GatewayRequest};
use scriba_proto::history::HistorySnapshot;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Deserialize)]
struct PlayReply {
    started: bool,
}

#[derive(Deserialize)]
struct PlayingReply {
    playing: bool,
}

#[derive(Clone)]
struct Backend {
    client: reqwest::Client,
    base_url: String,
}

impl Backend {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(to_gateway_err)?;
        check_status(&resp)?;
        resp.json::<T>().await.map_err(to_gateway_err)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let resp = self
            .client
            .post(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(to_gateway_err)?;
        check_status(&resp)?;
        resp.json::<T>().await.map_err(to_gateway_err)
    }

    async fn post_empty(&self, path: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(to_gateway_err)?;
        check_status(&resp)
    }

    async fn delete_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let resp = self
            .client
            .delete(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(to_gateway_err)?;
        check_status(&resp)?;
        resp.json::<T>().await.map_err(to_gateway_err)
    }
}

fn to_gateway_err(e: reqwest::Error) -> GatewayError {
    GatewayError::Backend(e.to_string())
}

fn check_status(resp: &reqwest::Response) -> Result<(), GatewayError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Backend(format!("backend returned {}", status)))
    }
}

/// Service gateway requests against the backend at `backend.base_url()` until
/// the request channel closes.
pub fn start_driver(
    backend: &BackendConfig,
    mut rx: mpsc::Receiver<GatewayRequest>,
) -> JoinHandle<()> {
    let backend = Backend {
        client: reqwest::Client::new(),
        base_url: backend.base_url(),
    };
    tokio::spawn(async move {
        while let Some(req) = rx.recv().await {
            let backend = backend.clone();
            tokio::spawn(async move {
                serve(backend, req).await;
            });
        }
        debug!("gateway driver shutting down");
    })
}

async fn serve(backend: Backend, req: GatewayRequest) {
    // A dropped reply means the caller went away; nothing to do.
    match req {
        GatewayRequest::ListHistory { reply } => {
            let result = backend.get_json::<HistorySnapshot>("/api/history").await;
            let _ = reply.send(result);
        }
        GatewayRequest::PlayItem { filename, reply } => {
            let result = backend
                .post_json::<PlayReply>("/api/play", &[("filename", filename.as_str())])
                .await
                .map(|r| r.started);
            let _ = reply.send(result);
        }
        GatewayRequest::StopPlayback { reply } => {
            let result = backend.post_empty("/api/stop").await;
            let _ = reply.send(result);
        }
        GatewayRequest::IsPlaying { reply } => {
            let result = backend
                .get_json::<PlayingReply>("/api/playing")
                .await
                .map(|r| r.playing);
            let _ = reply.send(result);
        }
        GatewayRequest::ReprocessItem { filename, reply } => {
            let result = backend
                .post_json::<Option<HistorySnapshot>>(
                    "/api/reprocess",
                    &[("filename", filename.as_str())],
                )
                .await;
            let _ = reply.send(result);
        }
        GatewayRequest::DeleteItem { filename, reply } => {
            let result = backend
                .delete_json::<HistorySnapshot>(
                    "/api/history",
                    &[("filename", filename.as_str())],
                )
                .await;
            let _ = reply.send(result);
        }
    }
}
