use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Request para arrancar un envío masivo
#[derive(Debug, Clone, Deserialize)]
pub struct StartDispatchRequest {
    pub template_name: String,

    /// Tope opcional de destinatarios; <= 0 o ausente significa sin tope.
    pub limit: Option<i64>,

    /// Ritmo de envío; si falta se usa el default de configuración.
    pub messages_per_minute: Option<u32>,

    /// ID de imagen de cabecera; si falta se usa el default guardado
    /// para la plantilla (template_settings).
    pub header_image_id: Option<String>,

    /// Código de idioma de la plantilla ("es", "en", ...).
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartDispatchResponse {
    pub success: bool,
    pub template_name: String,
    pub selected: usize,
    pub total_eligible: usize,
    pub message: String,
}

/// Respuesta de GET /api/bulk-send/status
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatusResponse {
    pub is_running: bool,
    pub template_name: Option<String>,
    pub current_progress: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub total_count: u64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub logs: Vec<String>,
}

/// Respuesta de GET /api/bulk-send/preview
#[derive(Debug, Clone, Serialize)]
pub struct DispatchPreviewStats {
    pub total_recipients: usize,
    pub already_sent: usize,
    pub will_send: usize,
}

/// Cantidad máxima de líneas que retiene el log rodante de una corrida.
pub const RUN_LOG_CAPACITY: usize = 200;

/// Estado en memoria de la corrida activa (o la última terminada).
/// Solo el DispatcherService lo muta; el resto lo lee vía status().
#[derive(Debug, Default)]
pub struct DispatchRun {
    pub template_name: Option<String>,
    pub stop_requested: bool,
    pub current: u64,
    pub success: u64,
    pub failed: u64,
    pub total: u64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub log: VecDeque<String>,
}

impl DispatchRun {
    /// Reinicia el estado para una corrida nueva.
    pub fn reset(&mut self, template_name: &str, total: u64, started_at: String) {
        self.template_name = Some(template_name.to_string());
        self.stop_requested = false;
        self.current = 0;
        self.success = 0;
        self.failed = 0;
        self.total = total;
        self.started_at = Some(started_at);
        self.finished_at = None;
        self.log.clear();
    }

    /// Agrega una línea al log rodante, descartando las más viejas.
    pub fn push_log(&mut self, line: String) {
        if self.log.len() >= RUN_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }
}
