use serde::{Deserialize, Serialize};

/// Estados posibles de una entrada del ledger.
/// La precedencia es read > delivered > sent; "failed" nunca pisa un
/// estado exitoso ya registrado.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_DELIVERED: &str = "delivered";
pub const STATUS_READ: &str = "read";
pub const STATUS_FAILED: &str = "failed";

/// Rango numérico de un estado para aplicar la regla de precedencia.
pub fn status_rank(status: &str) -> i32 {
    match status {
        STATUS_PENDING => 0,
        STATUS_FAILED => 1,
        STATUS_SENT => 2,
        STATUS_DELIVERED => 3,
        STATUS_READ => 4,
        _ => -1,
    }
}

/// ¿Cuenta este estado como entrega exitosa (a efectos de dedup)?
pub fn is_successful_status(status: &str) -> bool {
    matches!(status, STATUS_SENT | STATUS_DELIVERED | STATUS_READ)
}

/// Una fila del ledger de entregas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: String,
    pub phone: String,
    pub template_name: String,
    pub status: String,
    pub message_id: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<String>,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
    pub failed_at: Option<String>,
    pub created_at: String,
}

/// Resultado de un intento de envío contra el proveedor.
/// Los errores del proveedor se pliegan aquí; nunca se propagan
/// como Err dentro del loop de envío.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok(message_id: Option<String>) -> Self {
        SendOutcome {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        SendOutcome {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Conteo de mensajes por estado (GET /api/stats).
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageStats {
    pub total: i64,
    pub sent: i64,
    pub delivered: i64,
    pub read: i64,
    pub failed: i64,
    pub pending: i64,
}

/// Una entrada del historial de envíos, con el nombre del contacto resuelto.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchLogEntry {
    pub phone: String,
    pub name: String,
    pub template_name: String,
    pub status: String,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchLogsResponse {
    pub success: bool,
    pub logs: Vec<DispatchLogEntry>,
    pub total: i64,
    pub showing: usize,
}

/// Estado por contacto de una plantilla (enviada o no).
#[derive(Debug, Clone, Serialize)]
pub struct ContactTemplateStatus {
    pub phone: String,
    pub name: String,
    pub country: String,
    pub tags: Vec<String>,
    pub sent: bool,
    pub status: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateStatusStats {
    pub total_contacts: usize,
    pub sent: usize,
    pub not_sent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateStatusResponse {
    pub success: bool,
    pub template_name: String,
    pub stats: TemplateStatusStats,
    pub contacts: Vec<ContactTemplateStatus>,
}
