//! handlers/webhook_handler.rs
//! Ingreso de callbacks del proveedor + handshake de verificación.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::config::dispatch_config::DispatchConfig;
use crate::models::webhook_model::WebhookVerifyQuery;
use crate::services::webhook_service::WebhookService;

/// GET /health
pub async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "dispatch_service",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// GET /webhook — handshake de Meta: si el token coincide devolvemos el
/// challenge tal cual, si no 403.
pub async fn verify_webhook_endpoint(
    query: web::Query<WebhookVerifyQuery>,
    config: web::Data<DispatchConfig>,
) -> HttpResponse {
    let mode_ok = query.mode.as_deref() == Some("subscribe");
    let token_ok = query.verify_token.as_deref() == Some(config.webhook_verify_token.as_str());

    if mode_ok && token_ok {
        log::info!("(verify_webhook) Webhook verificado");
        HttpResponse::Ok().body(query.challenge.clone().unwrap_or_default())
    } else {
        log::error!("(verify_webhook) Verificación rechazada: token no coincide");
        HttpResponse::Forbidden().body("Verification failed")
    }
}

/// POST /webhook — siempre responde 200; lo que no se entienda se audita
/// y se descarta para que el proveedor no reintente en tormenta.
/// El cuerpo se toma crudo: un extractor Json rechazaría con 400 antes
/// de llegar acá, sin auditoría.
pub async fn receive_webhook_endpoint(
    body: web::Bytes,
    webhook_service: web::Data<WebhookService>,
) -> HttpResponse {
    let payload = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(v) => v,
        Err(e) => {
            log::error!("(receive_webhook) Cuerpo no es JSON: {}", e);
            // process_payload lo audita como "error" y lo descarta
            serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
        }
    };

    webhook_service.process_payload(payload).await;
    HttpResponse::Ok().body("OK")
}

#[derive(Deserialize)]
pub struct WebhookLogsQuery {
    pub limit: Option<i64>,
}

/// GET /api/webhook-logs?limit=...
pub async fn webhook_logs_endpoint(
    query: web::Query<WebhookLogsQuery>,
    webhook_service: web::Data<WebhookService>,
) -> HttpResponse {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(50);

    match webhook_service.recent_logs(limit).await {
        Ok(logs) => HttpResponse::Ok().json(json!({ "logs": logs })),
        Err(e) => {
            log::error!("(webhook_logs) Error: {:?}", e);
            HttpResponse::InternalServerError().json(json!({ "logs": [] }))
        }
    }
}
