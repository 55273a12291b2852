//! config/dispatch_config.rs
//! Parámetros del loop de envío masivo.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Ritmo por defecto si el request no trae messages_per_minute.
    pub default_messages_per_minute: u32,
    /// Código de idioma por defecto de las plantillas.
    pub default_language_code: String,
    /// Token esperado en el handshake de verificación del webhook.
    pub webhook_verify_token: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            default_messages_per_minute: 30,
            default_language_code: "es".to_string(),
            webhook_verify_token: "changeme".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let defaults = DispatchConfig::default();
        DispatchConfig {
            default_messages_per_minute: std::env::var("MESSAGES_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_messages_per_minute),
            default_language_code: std::env::var("TEMPLATE_LANGUAGE_CODE")
                .unwrap_or(defaults.default_language_code),
            webhook_verify_token: std::env::var("VERIFY_TOKEN")
                .unwrap_or(defaults.webhook_verify_token),
        }
    }
}
