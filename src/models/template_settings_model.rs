use serde::{Deserialize, Serialize};

/// Configuración guardada para una plantilla.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSettingsRecord {
    pub template_name: String,
    pub header_image_id: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveTemplateSettingsRequest {
    pub header_image_id: String,
}
