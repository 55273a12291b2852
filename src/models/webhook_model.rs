use serde::{Deserialize, Serialize};

/// Payload del webhook del proveedor (formato anidado de la Cloud API).
/// Solo modelamos lo que consumimos; el resto queda en el log de auditoría.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub statuses: Vec<WebhookStatus>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// Una actualización de estado de entrega, tal cual llega del proveedor.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Evento de estado normalizado que consume el reconciliador.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub message_id: String,
    pub status: String,
    pub recipient_id: Option<String>,
    pub error: Option<String>,
}

/// Fila de auditoría de webhooks (GET /api/webhook-logs).
#[derive(Debug, Clone, Serialize)]
pub struct WebhookLogRecord {
    pub event_type: String,
    pub phone: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: String,
}

/// Query de verificación del webhook (handshake de Meta).
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}
