//! services/contact_service.rs
//! Fuente de destinatarios. El core solo la lee; el CRUD expuesto es
//! mínimo para que el servicio sea operable por sí solo.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::models::contact_model::{ContactRecord, CreateContactRequest};

#[derive(Clone)]
pub struct ContactService {
    db_pool: Pool<Sqlite>,
}

impl ContactService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ContactService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al correr migraciones")?;
        Ok(())
    }

    pub async fn create_contact(&self, req: CreateContactRequest) -> Result<ContactRecord> {
        let now = Utc::now().to_rfc3339();
        let tags = req.tags.unwrap_or_default();
        let tags_json = serde_json::to_string(&tags)?;
        let country = req.country.unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO contacts (phone, name, country, tags, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            "#,
        )
        .bind(&req.phone)
        .bind(&req.name)
        .bind(&country)
        .bind(&tags_json)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar contacto")?;

        Ok(ContactRecord {
            phone: req.phone,
            name: req.name,
            country,
            tags,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_contact(&self, phone: &str) -> Result<Option<ContactRecord>> {
        let row = sqlx::query(
            r#"
            SELECT phone, name, country, tags, is_active, created_at, updated_at
            FROM contacts
            WHERE phone = ?1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(row_to_contact).transpose()
    }

    /// Todos los contactos activos, en orden de alta estable.
    /// El orden importa: el resolver de elegibilidad lo preserva para que
    /// los previews y las corridas parciales sean reproducibles.
    pub async fn list_active_contacts(&self) -> Result<Vec<ContactRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT phone, name, country, tags, is_active, created_at, updated_at
            FROM contacts
            WHERE is_active = 1
            ORDER BY created_at ASC, phone ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar contactos")?;

        rows.into_iter().map(row_to_contact).collect()
    }

    /// Baja lógica (is_active = 0)
    pub async fn deactivate_contact(&self, phone: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"UPDATE contacts SET is_active = 0, updated_at = ?2 WHERE phone = ?1"#,
        )
        .bind(phone)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al desactivar contacto")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_contact(row: SqliteRow) -> Result<ContactRecord> {
    let tags_json: String = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let is_active: i64 = row.try_get("is_active")?;

    Ok(ContactRecord {
        phone: row.try_get("phone")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        tags,
        is_active: is_active != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
