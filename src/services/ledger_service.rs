//! services/ledger_service.rs
//! Ledger de entregas: la única fuente de verdad para la deduplicación.
//!
//! Regla central: para un par (phone, template_name) a lo sumo una fila
//! puede llegar a estado exitoso (sent/delivered/read). Un evento "failed"
//! del proveedor nunca borra un estado exitoso ya registrado; hacerlo
//! reabriría la entrega y provocaría mensajes duplicados a usuarios reales.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::contact_model::ContactRecord;
use crate::models::message_model::{
    is_successful_status, status_rank, ContactTemplateStatus, DispatchLogEntry, DispatchRecord,
    MessageStats, SendOutcome, TemplateStatusResponse, TemplateStatusStats, STATUS_DELIVERED,
    STATUS_FAILED, STATUS_READ, STATUS_SENT,
};

#[derive(Clone)]
pub struct LedgerService {
    db_pool: Pool<Sqlite>,
}

impl LedgerService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        LedgerService { db_pool }
    }

    /// Registra el resultado de un intento de envío.
    ///
    /// Éxito: inserta una fila en 'sent' (con message_id si el proveedor
    /// ya lo devolvió). Si el par ya estaba cumplido NO inserta otra fila
    /// exitosa ni pisa la existente.
    /// Fallo: inserta una fila en 'failed'; el par sigue elegible para
    /// corridas futuras.
    pub async fn record_attempt(
        &self,
        phone: &str,
        template_name: &str,
        outcome: &SendOutcome,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();

        if outcome.success {
            if self.is_fulfilled(phone, template_name).await? {
                log::warn!(
                    "(record_attempt) Par ya cumplido, no se re-inserta: {} / {}",
                    phone,
                    template_name
                );
                return Ok(());
            }

            sqlx::query(
                r#"
                INSERT INTO messages (id, phone, template_name, status, message_id, sent_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
            )
            .bind(&id)
            .bind(phone)
            .bind(template_name)
            .bind(STATUS_SENT)
            .bind(&outcome.message_id)
            .bind(&now)
            .execute(&self.db_pool)
            .await
            .context("Fallo al insertar intento exitoso en el ledger")?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO messages (id, phone, template_name, status, error_message, failed_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
            )
            .bind(&id)
            .bind(phone)
            .bind(template_name)
            .bind(STATUS_FAILED)
            .bind(&outcome.error)
            .bind(&now)
            .execute(&self.db_pool)
            .await
            .context("Fallo al insertar intento fallido en el ledger")?;
        }

        Ok(())
    }

    /// ¿Existe una fila exitosa para este par?
    pub async fn is_fulfilled(&self, phone: &str, template_name: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as cnt
            FROM messages
            WHERE phone = ?1
              AND template_name = ?2
              AND status IN ('sent', 'delivered', 'read')
            "#,
        )
        .bind(phone)
        .bind(template_name)
        .fetch_one(&self.db_pool)
        .await?;

        let cnt: i64 = row.try_get("cnt")?;
        Ok(cnt > 0)
    }

    /// Teléfonos con entrega exitosa para la plantilla (insumo del resolver).
    pub async fn fulfilled_phones(&self, template_name: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT phone
            FROM messages
            WHERE template_name = ?1
              AND status IN ('sent', 'delivered', 'read')
            "#,
        )
        .bind(template_name)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al leer teléfonos cumplidos")?;

        rows.into_iter()
            .map(|r| r.try_get::<String, _>("phone").map_err(Into::into))
            .collect()
    }

    /// Aplica un evento de estado del proveedor sobre la fila con ese
    /// message_id. Devuelve false si ninguna fila lo tiene todavía (carrera
    /// con la escritura del dispatcher; el llamador decide reintentar).
    ///
    /// Precedencia: read > delivered > sent. Un "failed" entrante solo
    /// registra metadata (error, failed_at) cuando la fila ya está en
    /// estado exitoso.
    pub async fn apply_status_event(
        &self,
        message_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT id, status
            FROM messages
            WHERE message_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        let id: String = row.try_get("id")?;
        let current: String = row.try_get("status")?;
        let now = Utc::now().to_rfc3339();

        if status == STATUS_FAILED {
            if is_successful_status(&current) {
                // Nunca degradar: solo anotamos el error.
                sqlx::query(
                    r#"UPDATE messages SET error_message = ?2, failed_at = ?3 WHERE id = ?1"#,
                )
                .bind(&id)
                .bind(error)
                .bind(&now)
                .execute(&self.db_pool)
                .await
                .context("Fallo al anotar evento failed")?;
            } else {
                sqlx::query(
                    r#"
                    UPDATE messages
                    SET status = 'failed', error_message = ?2, failed_at = ?3
                    WHERE id = ?1
                    "#,
                )
                .bind(&id)
                .bind(error)
                .bind(&now)
                .execute(&self.db_pool)
                .await
                .context("Fallo al marcar failed")?;
            }
            return Ok(true);
        }

        if status_rank(status) > status_rank(&current) {
            let ts_col = match status {
                STATUS_SENT => "sent_at",
                STATUS_DELIVERED => "delivered_at",
                STATUS_READ => "read_at",
                _ => {
                    log::warn!("(apply_status_event) Estado desconocido: {}", status);
                    return Ok(true);
                }
            };

            let sql = format!(
                r#"UPDATE messages SET status = ?1, {ts_col} = ?2 WHERE id = ?3"#
            );
            sqlx::query(&sql)
                .bind(status)
                .bind(&now)
                .bind(&id)
                .execute(&self.db_pool)
                .await
                .context("Fallo al avanzar estado del mensaje")?;
        }

        Ok(true)
    }

    /// Busca la fila más reciente con ese message_id del proveedor.
    pub async fn find_by_message_id(&self, message_id: &str) -> Result<Option<DispatchRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, phone, template_name, status, message_id, error_message,
                   sent_at, delivered_at, read_at, failed_at, created_at
            FROM messages
            WHERE message_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(|r| {
            Ok(DispatchRecord {
                id: r.try_get("id")?,
                phone: r.try_get("phone")?,
                template_name: r.try_get("template_name")?,
                status: r.try_get("status")?,
                message_id: r.try_get("message_id")?,
                error_message: r.try_get("error_message")?,
                sent_at: r.try_get("sent_at")?,
                delivered_at: r.try_get("delivered_at")?,
                read_at: r.try_get("read_at")?,
                failed_at: r.try_get("failed_at")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    /// Correlación oportunista: el dispatcher a veces inserta la fila antes
    /// de conocer el id del proveedor. Adjunta el id a la fila exitosa más
    /// reciente sin id de ese teléfono. Solo filas exitosas: una fila failed
    /// nunca tiene id del proveedor, y adjuntárselo la promovería con el
    /// próximo evento, cumpliendo un par que nunca se entregó.
    pub async fn backfill_message_id(&self, phone: &str, message_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET message_id = ?2
            WHERE id = (
                SELECT id FROM messages
                WHERE phone = ?1
                  AND message_id IS NULL
                  AND status IN ('sent', 'delivered', 'read')
                ORDER BY created_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(phone)
        .bind(message_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al adjuntar message_id")?;

        Ok(result.rows_affected() > 0)
    }

    /// Historial de envíos con nombre de contacto y total real.
    pub async fn recent_messages(
        &self,
        template_name: Option<&str>,
        limit: i64,
    ) -> Result<(Vec<DispatchLogEntry>, i64)> {
        let filter_sql = if template_name.is_some() {
            "WHERE m.template_name = ?1"
        } else {
            ""
        };

        let count_sql = format!(
            r#"SELECT COUNT(*) as cnt FROM messages m {filter_sql}"#
        );
        let mut count_query = sqlx::query(&count_sql);
        if let Some(t) = template_name {
            count_query = count_query.bind(t);
        }
        let total: i64 = count_query
            .fetch_one(&self.db_pool)
            .await?
            .try_get("cnt")?;

        let list_sql = format!(
            r#"
            SELECT m.phone, COALESCE(c.name, 'Desconocido') as name,
                   m.template_name, m.status, m.sent_at, m.error_message
            FROM messages m
            LEFT JOIN contacts c ON c.phone = m.phone
            {filter_sql}
            ORDER BY m.created_at DESC
            LIMIT {limit}
            "#
        );
        let mut list_query = sqlx::query(&list_sql);
        if let Some(t) = template_name {
            list_query = list_query.bind(t);
        }
        let rows = list_query.fetch_all(&self.db_pool).await?;

        let mut logs = Vec::with_capacity(rows.len());
        for r in rows {
            logs.push(DispatchLogEntry {
                phone: r.try_get("phone")?,
                name: r.try_get("name")?,
                template_name: r.try_get("template_name")?,
                status: r.try_get("status")?,
                sent_at: r.try_get("sent_at")?,
                error_message: r.try_get("error_message")?,
            });
        }

        Ok((logs, total))
    }

    /// Conteo de mensajes por estado, opcionalmente filtrado por plantilla.
    pub async fn message_stats(&self, template_name: Option<&str>) -> Result<MessageStats> {
        let filter_sql = if template_name.is_some() {
            "WHERE template_name = ?1"
        } else {
            ""
        };
        let sql = format!(
            r#"SELECT status, COUNT(*) as cnt FROM messages {filter_sql} GROUP BY status"#
        );
        let mut query = sqlx::query(&sql);
        if let Some(t) = template_name {
            query = query.bind(t);
        }
        let rows = query.fetch_all(&self.db_pool).await?;

        let mut stats = MessageStats::default();
        for r in rows {
            let status: String = r.try_get("status")?;
            let cnt: i64 = r.try_get("cnt")?;
            stats.total += cnt;
            match status.as_str() {
                STATUS_SENT => stats.sent += cnt,
                STATUS_DELIVERED => stats.delivered += cnt,
                STATUS_READ => stats.read += cnt,
                STATUS_FAILED => stats.failed += cnt,
                _ => stats.pending += cnt,
            }
        }
        Ok(stats)
    }

    /// Desglose por contacto: ¿recibió esta plantilla o no?
    pub async fn template_status(
        &self,
        template_name: &str,
        contacts: &[ContactRecord],
    ) -> Result<TemplateStatusResponse> {
        let rows = sqlx::query(
            r#"
            SELECT phone, status, sent_at
            FROM messages
            WHERE template_name = ?1
              AND status IN ('sent', 'delivered', 'read')
            "#,
        )
        .bind(template_name)
        .fetch_all(&self.db_pool)
        .await?;

        let mut fulfilled: HashMap<String, (String, Option<String>)> = HashMap::new();
        for r in rows {
            let phone: String = r.try_get("phone")?;
            let status: String = r.try_get("status")?;
            let sent_at: Option<String> = r.try_get("sent_at")?;
            fulfilled.insert(phone, (status, sent_at));
        }

        let mut result = Vec::with_capacity(contacts.len());
        let mut sent_count = 0;
        for contact in contacts {
            match fulfilled.get(&contact.phone) {
                Some((status, sent_at)) => {
                    sent_count += 1;
                    result.push(ContactTemplateStatus {
                        phone: contact.phone.clone(),
                        name: contact.name.clone(),
                        country: contact.country.clone(),
                        tags: contact.tags.clone(),
                        sent: true,
                        status: status.clone(),
                        sent_at: sent_at.clone(),
                    });
                }
                None => result.push(ContactTemplateStatus {
                    phone: contact.phone.clone(),
                    name: contact.name.clone(),
                    country: contact.country.clone(),
                    tags: contact.tags.clone(),
                    sent: false,
                    status: "not_sent".to_string(),
                    sent_at: None,
                }),
            }
        }

        // Primero los enviados, después por nombre.
        result.sort_by(|a, b| b.sent.cmp(&a.sent).then(a.name.cmp(&b.name)));

        let stats = TemplateStatusStats {
            total_contacts: contacts.len(),
            sent: sent_count,
            not_sent: contacts.len() - sent_count,
        };

        Ok(TemplateStatusResponse {
            success: true,
            template_name: template_name.to_string(),
            stats,
            contacts: result,
        })
    }
}
