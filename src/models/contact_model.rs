use serde::{Deserialize, Serialize};

/// Un contacto (destinatario). La clave natural es el teléfono.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub phone: String,
    pub name: String,
    pub country: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Request para crear un contacto
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequest {
    pub phone: String,
    pub name: String,
    pub country: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListContactsResponse {
    pub total: usize,
    pub contacts: Vec<ContactRecord>,
}
