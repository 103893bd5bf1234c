//! Admin HTTP payloads (serde ready).

use serde::Serialize;

use crate::domain::MessageId;

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub streams: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOut {
    pub stream: String,
    pub message_id: MessageId,
    pub day_idx: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}
