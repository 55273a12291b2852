//! services/provider_service.rs
//! Cliente del proveedor de plantillas (WhatsApp Cloud API).
//!
//! El trait TemplateSender es la costura del dispatcher: en producción lo
//! implementa WhatsAppClient; en tests, un stub. Ninguna implementación
//! debe devolver Err hacia el loop: todo error se pliega en SendOutcome.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::provider_config::ProviderConfig;
use crate::models::message_model::SendOutcome;

/// Qué plantilla enviar, con qué idioma y cabecera.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub name: String,
    pub language_code: String,
    pub header_image_id: Option<String>,
}

#[async_trait]
pub trait TemplateSender: Send + Sync {
    async fn send_template(&self, phone: &str, template: &TemplateSpec) -> SendOutcome;
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http_client: Client,
    config: ProviderConfig,
}

impl WhatsAppClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("No se pudo construir el cliente HTTP del proveedor")?;

        Ok(WhatsAppClient {
            http_client,
            config,
        })
    }

    fn build_payload(&self, phone: &str, template: &TemplateSpec) -> serde_json::Value {
        let mut template_obj = json!({
            "name": template.name,
            "language": { "code": template.language_code }
        });

        // Cabecera con imagen solo si viene un ID no vacío.
        if let Some(image_id) = template
            .header_image_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            template_obj["components"] = json!([
                {
                    "type": "header",
                    "parameters": [
                        { "type": "image", "image": { "id": image_id } }
                    ]
                }
            ]);
        }

        json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "template",
            "template": template_obj
        })
    }
}

#[async_trait]
impl TemplateSender for WhatsAppClient {
    async fn send_template(&self, phone: &str, template: &TemplateSpec) -> SendOutcome {
        let url = self.config.messages_url();
        let payload = self.build_payload(phone, template);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                log::error!("(send_template) Timeout enviando a {}", phone);
                return SendOutcome::failed(format!(
                    "Timeout del proveedor ({}s)",
                    self.config.timeout_secs
                ));
            }
            Err(e) => {
                log::error!("(send_template) Error de red enviando a {}: {}", phone, e);
                return SendOutcome::failed(format!("Error de red: {e}"));
            }
        };

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();

        if status.is_success() {
            // El id del mensaje viene en messages[0].id
            let message_id = body
                .get("messages")
                .and_then(|m| m.get(0))
                .and_then(|m| m.get("id"))
                .and_then(|id| id.as_str())
                .map(str::to_string);

            log::info!(
                "(send_template) Enviado a {} (message_id={:?})",
                phone,
                message_id
            );
            SendOutcome::ok(message_id)
        } else {
            let error_msg = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Error desconocido del proveedor")
                .to_string();

            log::error!(
                "(send_template) Proveedor respondió {} para {}: {}",
                status,
                phone,
                error_msg
            );
            SendOutcome::failed(error_msg)
        }
    }
}
