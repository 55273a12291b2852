//! config/provider_config.rs
//! Configuración del proveedor de mensajería (WhatsApp Cloud API).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base del Graph API, sin slash final.
    pub api_base: String,
    /// ID del número emisor en el proveedor.
    pub phone_number_id: String,
    /// Token Bearer.
    pub access_token: String,
    /// Timeout por llamada, en segundos.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_base: "https://graph.facebook.com/v21.0".to_string(),
            phone_number_id: String::new(),
            access_token: String::new(),
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    /// Lee la configuración del entorno. Los campos faltantes quedan
    /// vacíos; el cliente fallará por llamada (no al arrancar) para que
    /// el resto del servicio siga operable.
    pub fn from_env() -> Self {
        let defaults = ProviderConfig::default();
        ProviderConfig {
            api_base: std::env::var("WHATSAPP_API_BASE").unwrap_or(defaults.api_base),
            phone_number_id: std::env::var("PHONE_NUMBER_ID").unwrap_or_default(),
            access_token: std::env::var("WHATSAPP_ACCESS_TOKEN")
                .or_else(|_| std::env::var("ACCESS_TOKEN"))
                .unwrap_or_default(),
            timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// URL del endpoint de envío de mensajes.
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }
}
