//! tests/webhook_tests.rs
//! El reconciliador tolera payloads malformados, eventos sin fila y
//! llegadas fuera de orden; el ledger nunca retrocede.

use actix_web::{test, web, App};
use serde_json::json;

use crate::handlers::webhook_handler;
use crate::models::message_model::SendOutcome;
use crate::models::webhook_model::StatusEvent;
use crate::services::ledger_service::LedgerService;
use crate::services::webhook_service::WebhookService;
use crate::tests::support::test_pool;

const TEMPLATE: &str = "promo_enero";
const PHONE: &str = "5215550001";

fn status_payload(message_id: &str, status: &str) -> serde_json::Value {
    json!({
        "entry": [{
            "changes": [{
                "value": {
                    "statuses": [{
                        "id": message_id,
                        "status": status,
                        "recipient_id": PHONE
                    }]
                }
            }]
        }]
    })
}

#[actix_rt::test]
async fn test_webhook_actualiza_el_ledger() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger.clone());

    ledger
        .record_attempt(PHONE, TEMPLATE, &SendOutcome::ok(Some("wamid.x".into())))
        .await
        .expect("envío");

    webhook
        .process_payload(status_payload("wamid.x", "delivered"))
        .await;

    let (logs, _) = ledger.recent_messages(Some(TEMPLATE), 10).await.expect("logs");
    assert_eq!(logs[0].status, "delivered");

    // Quedó auditado
    let audit = webhook.recent_logs(10).await.expect("webhook_logs");
    assert!(audit.iter().any(|l| l.event_type == "status"));
}

#[actix_rt::test]
async fn test_precedencia_aplicada_desde_webhook() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger.clone());

    ledger
        .record_attempt(PHONE, TEMPLATE, &SendOutcome::ok(Some("wamid.y".into())))
        .await
        .expect("envío");

    // sent, failed, delivered en ese orden: el final es delivered
    webhook.process_payload(status_payload("wamid.y", "sent")).await;
    webhook.process_payload(status_payload("wamid.y", "failed")).await;
    webhook
        .process_payload(status_payload("wamid.y", "delivered"))
        .await;

    let (logs, _) = ledger.recent_messages(Some(TEMPLATE), 10).await.expect("logs");
    assert_eq!(logs[0].status, "delivered", "failed intermedio no gana");
}

#[actix_rt::test]
async fn test_backfill_desde_webhook() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger.clone());

    // Fila escrita antes de conocer el id del proveedor
    ledger
        .record_attempt(PHONE, TEMPLATE, &SendOutcome::ok(None))
        .await
        .expect("envío sin id");

    webhook
        .process_payload(status_payload("wamid.tardio", "read"))
        .await;

    let (logs, _) = ledger.recent_messages(Some(TEMPLATE), 10).await.expect("logs");
    assert_eq!(logs[0].status, "read", "el evento se correlacionó por teléfono");
}

#[actix_rt::test]
async fn test_evento_sin_fila_se_descarta() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger.clone());

    let event = StatusEvent {
        message_id: "wamid.fantasma".to_string(),
        status: "delivered".to_string(),
        recipient_id: Some("5219999999".to_string()),
        error: None,
    };

    // Carrera aceptada: no es un error
    webhook.apply_event(&event).await.expect("se tolera");

    let (_, total) = ledger.recent_messages(None, 10).await.expect("logs");
    assert_eq!(total, 0, "no se inventan filas");
}

#[actix_rt::test]
async fn test_payload_malformado_se_audita_y_descarta() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger);

    // Sin entry: estructura válida pero vacía
    webhook.process_payload(json!({ "object": "whatsapp" })).await;
    // Directamente otra cosa
    webhook.process_payload(json!("esto no es un webhook")).await;

    let audit = webhook.recent_logs(10).await.expect("webhook_logs");
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().any(|l| l.event_type == "unknown"));
    assert!(audit.iter().any(|l| l.event_type == "error"));
}

#[actix_rt::test]
async fn test_endpoint_responde_200_con_cuerpo_invalido() {
    let pool = test_pool().await;
    let ledger = LedgerService::new(pool.clone());
    let webhook = WebhookService::new(pool, ledger);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(webhook.clone()))
            .route(
                "/webhook",
                web::post().to(webhook_handler::receive_webhook_endpoint),
            ),
    )
    .await;

    // Cuerpo que ni siquiera es JSON: debe responder 200 igual, nunca 400
    // (un 4xx haría que el proveedor reintente en tormenta).
    let req = test::TestRequest::post()
        .uri("/webhook")
        .insert_header(("content-type", "application/json"))
        .set_payload("esto no es json {")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success(), "status: {}", resp.status());

    // Y quedó auditado
    let audit = webhook.recent_logs(10).await.expect("webhook_logs");
    assert!(audit.iter().any(|l| l.event_type == "error"));
}
