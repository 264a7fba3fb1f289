//! HTTP notification receiver.
//!
//! Accepts the webhook payload emitted by Radarr/Sonarr custom-script
//! bridges (`file_path`, `item_type`, `item_tags`, `item_id`), enqueues the
//! file, and acknowledges immediately; processing happens on the worker
//! pool, never on the request path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use mkp_core::Error;

use crate::context::AppContext;
use crate::coordinator::{ItemRef, ProcessRequest};
use crate::error::AppError;

/// Build the receiver router.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/process", post(process))
        .route("/healthz", get(healthz))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct ProcessPayload {
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    item_type: String,
    /// Comma-separated tag list, as the arr webhook templates render it.
    #[serde(default)]
    item_tags: String,
    #[serde(default)]
    item_id: String,
}

impl ProcessPayload {
    fn into_request(self) -> Result<ProcessRequest, Error> {
        if self.file_path.is_empty() {
            return Err(Error::Validation("file_path is required".into()));
        }

        let mut req = ProcessRequest::new(&self.file_path);
        req.tags = self
            .item_tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if !self.item_type.is_empty() {
            if let Ok(id) = self.item_id.parse::<i64>() {
                req.item = Some(ItemRef {
                    kind: self.item_type,
                    id,
                });
            }
        }
        Ok(req)
    }
}

async fn process(
    State(ctx): State<AppContext>,
    Json(payload): Json<ProcessPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let req = payload.into_request()?;
    let path = req.path.display().to_string();

    ctx.queue
        .try_send(req)
        .map_err(|_| Error::Internal("processing queue is full".into()))?;

    tracing::info!(path = %path, "request queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "file_path": path })),
    ))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
