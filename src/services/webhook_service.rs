//! services/webhook_service.rs
//! Reconciliador de estados: consume los callbacks asíncronos del
//! proveedor y los aplica sobre el ledger. Corre concurrente con el
//! dispatcher y consigo mismo (un task por request entrante).
//!
//! Consistencia eventual a propósito: un evento que llega antes de que el
//! dispatcher termine de escribir su fila se tolera (backfill por
//! teléfono) o se descarta con log; nunca es un error para el proveedor.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::webhook_model::{StatusEvent, WebhookLogRecord, WebhookPayload};
use crate::services::ledger_service::LedgerService;

#[derive(Clone)]
pub struct WebhookService {
    db_pool: Pool<Sqlite>,
    ledger: LedgerService,
}

impl WebhookService {
    pub fn new(db_pool: Pool<Sqlite>, ledger: LedgerService) -> Self {
        WebhookService { db_pool, ledger }
    }

    /// Procesa un payload crudo del webhook. Nunca devuelve error hacia el
    /// endpoint: lo que no se entiende se audita y se descarta, para que
    /// el proveedor no entre en tormenta de reintentos.
    pub async fn process_payload(&self, payload: serde_json::Value) {
        let parsed: WebhookPayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::error!("(process_payload) Payload malformado: {}", e);
                self.audit("error", None, &payload).await;
                return;
            }
        };

        let mut saw_something = false;

        for entry in &parsed.entry {
            for change in &entry.changes {
                for status in &change.value.statuses {
                    saw_something = true;
                    let event = StatusEvent {
                        message_id: status.id.clone(),
                        status: status.status.clone(),
                        recipient_id: status.recipient_id.clone(),
                        error: status.errors.as_ref().map(|e| e.to_string()),
                    };

                    log::info!(
                        "(process_payload) Estado recibido: {} -> {} (destinatario: {})",
                        event.status,
                        event.message_id,
                        event.recipient_id.as_deref().unwrap_or("desconocido")
                    );

                    let data = serde_json::json!({
                        "status": event.status,
                        "message_id": event.message_id,
                    });
                    self.audit("status", event.recipient_id.as_deref(), &data)
                        .await;

                    if let Err(e) = self.apply_event(&event).await {
                        // Error de reconciliación: se loguea y se descarta.
                        log::error!(
                            "(process_payload) Fallo aplicando evento {}: {:?}",
                            event.message_id,
                            e
                        );
                    }
                }

                for message in &change.value.messages {
                    saw_something = true;
                    // Mensajes entrantes: fuera del core, solo auditoría.
                    let phone = message
                        .get("from")
                        .and_then(|f| f.as_str())
                        .map(str::to_string);
                    self.audit("incoming_message", phone.as_deref(), message)
                        .await;
                }
            }
        }

        if !saw_something {
            self.audit("unknown", None, &payload).await;
        }
    }

    /// Aplica un evento sobre el ledger, con backfill del message_id si la
    /// fila se escribió antes de conocer el id del proveedor.
    pub async fn apply_event(&self, event: &StatusEvent) -> Result<()> {
        let matched = self
            .ledger
            .apply_status_event(&event.message_id, &event.status, event.error.as_deref())
            .await?;

        if matched {
            return Ok(());
        }

        if let Some(phone) = &event.recipient_id {
            if self.ledger.backfill_message_id(phone, &event.message_id).await? {
                self.ledger
                    .apply_status_event(&event.message_id, &event.status, event.error.as_deref())
                    .await?;
                log::info!(
                    "(apply_event) message_id correlacionado por teléfono: {} -> {}",
                    phone,
                    event.message_id
                );
                return Ok(());
            }
        }

        // Carrera aceptada: el evento llegó antes que la fila. Se descarta.
        log::warn!(
            "(apply_event) Evento sin fila en el ledger, se descarta: {} ({})",
            event.message_id,
            event.status
        );
        Ok(())
    }

    /// Auditoría best-effort: un fallo acá no debe afectar el flujo.
    async fn audit(&self, event_type: &str, phone: Option<&str>, data: &serde_json::Value) {
        if let Err(e) = self.insert_log(event_type, phone, data).await {
            log::error!("(audit) No se pudo guardar webhook_log: {:?}", e);
        }
    }

    async fn insert_log(
        &self,
        event_type: &str,
        phone: Option<&str>,
        data: &serde_json::Value,
    ) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO webhook_logs (id, event_type, phone, data, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&id)
        .bind(event_type)
        .bind(phone)
        .bind(data.to_string())
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar webhook_log")?;

        Ok(())
    }

    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<WebhookLogRecord>> {
        let sql = format!(
            r#"
            SELECT event_type, phone, data, timestamp
            FROM webhook_logs
            ORDER BY timestamp DESC
            LIMIT {limit}
            "#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.db_pool).await?;

        let mut logs = Vec::with_capacity(rows.len());
        for r in rows {
            let data_raw: String = r.try_get("data")?;
            logs.push(WebhookLogRecord {
                event_type: r.try_get("event_type")?,
                phone: r.try_get("phone")?,
                data: serde_json::from_str(&data_raw).unwrap_or(serde_json::Value::Null),
                timestamp: r.try_get("timestamp")?,
            });
        }
        Ok(logs)
    }
}
