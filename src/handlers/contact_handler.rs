//! handlers/contact_handler.rs
//! CRUD mínimo de contactos (la fuente de destinatarios).

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::contact_model::{CreateContactRequest, ListContactsResponse};
use crate::services::contact_service::ContactService;

/// POST /api/contacts
pub async fn create_contact_endpoint(
    body: web::Json<CreateContactRequest>,
    contacts: web::Data<ContactService>,
) -> HttpResponse {
    let req = body.into_inner();

    if req.phone.trim().is_empty() || req.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "phone y name son requeridos"
        }));
    }

    match contacts.create_contact(req).await {
        Ok(contact) => HttpResponse::Ok().json(json!({
            "success": true,
            "contact": contact
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/contacts
pub async fn list_contacts_endpoint(contacts: web::Data<ContactService>) -> HttpResponse {
    match contacts.list_active_contacts().await {
        Ok(list) => HttpResponse::Ok().json(ListContactsResponse {
            total: list.len(),
            contacts: list,
        }),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/contacts/{phone}
pub async fn get_contact_endpoint(
    path: web::Path<String>,
    contacts: web::Data<ContactService>,
) -> HttpResponse {
    let phone = path.into_inner();

    match contacts.get_contact(&phone).await {
        Ok(Some(contact)) => HttpResponse::Ok().json(contact),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Contacto no encontrado"
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// DELETE /api/contacts/{phone} — baja lógica
pub async fn delete_contact_endpoint(
    path: web::Path<String>,
    contacts: web::Data<ContactService>,
) -> HttpResponse {
    let phone = path.into_inner();

    match contacts.deactivate_contact(&phone).await {
        Ok(true) => HttpResponse::Ok().json(json!({ "success": true })),
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Contacto no encontrado"
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}
