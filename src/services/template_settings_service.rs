//! services/template_settings_service.rs
//! Defaults por plantilla (ID de imagen de cabecera).

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::models::template_settings_model::TemplateSettingsRecord;

#[derive(Clone)]
pub struct TemplateSettingsService {
    db_pool: Pool<Sqlite>,
}

impl TemplateSettingsService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        TemplateSettingsService { db_pool }
    }

    /// ID de imagen guardado para la plantilla; None si no hay o está vacío.
    pub async fn get_header_image_id(&self, template_name: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"SELECT header_image_id FROM template_settings WHERE template_name = ?1"#,
        )
        .bind(template_name)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row
            .map(|r| r.try_get::<String, _>("header_image_id"))
            .transpose()?
            .filter(|s| !s.trim().is_empty()))
    }

    pub async fn save_header_image_id(
        &self,
        template_name: &str,
        header_image_id: &str,
    ) -> Result<TemplateSettingsRecord> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO template_settings (template_name, header_image_id, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (template_name)
            DO UPDATE SET header_image_id = ?2, updated_at = ?3
            "#,
        )
        .bind(template_name)
        .bind(header_image_id)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar template_settings")?;

        Ok(TemplateSettingsRecord {
            template_name: template_name.to_string(),
            header_image_id: header_image_id.to_string(),
            updated_at: now,
        })
    }

    pub async fn get_settings(
        &self,
        template_name: &str,
    ) -> Result<Option<TemplateSettingsRecord>> {
        let row = sqlx::query(
            r#"
            SELECT template_name, header_image_id, updated_at
            FROM template_settings
            WHERE template_name = ?1
            "#,
        )
        .bind(template_name)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(|r| {
            Ok(TemplateSettingsRecord {
                template_name: r.try_get("template_name")?,
                header_image_id: r.try_get("header_image_id")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
    }
}
