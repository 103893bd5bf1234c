//! HTTP endpoint handlers. Thin wrappers over `DailyService`.

use std::sync::Arc;

use axum::{
  extract::{Path, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
  Json,
};
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::daily::DailyService;
use crate::error::BotError;
use crate::protocol::{ErrorOut, HealthOut, PublishOut};

impl IntoResponse for BotError {
  fn into_response(self) -> Response {
    let status = match self.root() {
      BotError::UnknownStream(_) => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      error!(target: "boardwhite", error = %self, "Admin request failed");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Reject requests whose `x-admin-token` does not equal the configured secret.
pub async fn require_admin_token(State(token): State<String>, req: Request, next: Next) -> Response {
  let presented = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
  if presented != Some(token.as_str()) {
    warn!(target: "boardwhite", path = %req.uri().path(), "Admin request without valid token");
    let body = ErrorOut { error: format!("missing or invalid {ADMIN_TOKEN_HEADER}") };
    return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
  }
  next.run(req).await
}

#[instrument(level = "info", skip(service))]
pub async fn http_health(State(service): State<Arc<DailyService>>) -> impl IntoResponse {
  let streams = service.streams().iter().map(|s| s.name.clone()).collect();
  Json(HealthOut { ok: true, streams })
}

#[instrument(level = "info", skip(service))]
pub async fn http_get_stream(
  State(service): State<Arc<DailyService>>,
  Path(name): Path<String>,
) -> Result<impl IntoResponse, BotError> {
  let stream = service.stream(&name)?.clone();
  let status = service.status(&stream).await?;
  Ok(Json(status))
}

#[instrument(level = "info", skip(service))]
pub async fn http_post_publish(
  State(service): State<Arc<DailyService>>,
  Path(name): Path<String>,
) -> Result<impl IntoResponse, BotError> {
  let stream = service.stream(&name)?.clone();
  let published = service.publish_daily(&stream, Utc::now()).await?;
  info!(target: "daily", stream = %name, message_id = published.message_id, "HTTP publish served");
  Ok(Json(PublishOut { stream: name, message_id: published.message_id, day_idx: published.day_idx }))
}
