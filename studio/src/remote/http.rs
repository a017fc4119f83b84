//! reqwest-backed [`SessionApi`].
//!
//! Thin JSON-over-HTTP wrapper. Status checks and body parsing live in pure
//! functions (`check_status`, `parse_body`, `parse_batch_delete`) so they
//! can be tested without a server.

use async_trait::async_trait;
use canvas::doc::ItemPatch;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::SessionApi;
use super::types::{
    BatchDeleteRequest, BatchDeleteResponse, CanvasItemRef, NewCanvasItem, RemoteError, SaveGenerationRequest,
    SessionDetail, SessionPatch, SubmitRequest, SubmitResponse, TaskStatusResponse,
};
use crate::config::RemoteConfig;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpSessionApi {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpSessionApi {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the reqwest client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RemoteError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url, api_token: config.api_token })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, RemoteError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        check_status(status, text)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, RemoteError> {
        let text = self.send(builder).await?;
        parse_body(&text)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn submit_task(&self, session_id: &str, request: &SubmitRequest) -> Result<SubmitResponse, RemoteError> {
        debug!(%session_id, model = %request.model, n = request.n, "remote: submit task");
        let url = self.url(&format!("sessions/{session_id}/tasks"));
        self.send_json(self.http.post(url).json(request)).await
    }

    async fn get_task_status(&self, session_id: &str, task_id: &str) -> Result<TaskStatusResponse, RemoteError> {
        let url = self.url(&format!("sessions/{session_id}/tasks/{task_id}"));
        self.send_json(self.http.get(url)).await
    }

    async fn get_session_detail(&self, session_id: &str) -> Result<SessionDetail, RemoteError> {
        let url = self.url(&format!("sessions/{session_id}"));
        self.send_json(self.http.get(url)).await
    }

    async fn update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<(), RemoteError> {
        let url = self.url(&format!("sessions/{session_id}"));
        self.send(self.http.patch(url).json(patch)).await.map(|_| ())
    }

    async fn update_canvas_item(&self, item_id: &str, patch: &ItemPatch) -> Result<(), RemoteError> {
        let url = self.url(&format!("canvas-items/{item_id}"));
        self.send(self.http.patch(url).json(patch)).await.map(|_| ())
    }

    async fn batch_delete_canvas_items(&self, item_ids: &[String]) -> Result<(), RemoteError> {
        debug!(count = item_ids.len(), "remote: batch delete");
        let url = self.url("canvas-items/batch-delete");
        let body = BatchDeleteRequest { item_ids: item_ids.to_vec() };
        let text = self.send(self.http.post(url).json(&body)).await?;
        parse_batch_delete(&text)
    }

    async fn save_generation_result(
        &self,
        session_id: &str,
        request: &SaveGenerationRequest,
    ) -> Result<CanvasItemRef, RemoteError> {
        let url = self.url(&format!("sessions/{session_id}/generations"));
        self.send_json(self.http.post(url).json(request)).await
    }

    async fn create_canvas_item(&self, session_id: &str, item: &NewCanvasItem) -> Result<CanvasItemRef, RemoteError> {
        let url = self.url(&format!("sessions/{session_id}/canvas-items"));
        self.send_json(self.http.post(url).json(item)).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn check_status(status: u16, body: String) -> Result<String, RemoteError> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(RemoteError::Response { status, body })
    }
}

fn parse_body<T: DeserializeOwned>(json: &str) -> Result<T, RemoteError> {
    serde_json::from_str(json).map_err(|e| RemoteError::Parse(e.to_string()))
}

fn parse_batch_delete(json: &str) -> Result<(), RemoteError> {
    let reply: BatchDeleteResponse = parse_body(json)?;
    if reply.success {
        Ok(())
    } else {
        Err(RemoteError::Rejected(reply.error.unwrap_or_else(|| "batch delete failed".into())))
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
