//! handlers/dispatch_handler.rs
//! Control surface del envío masivo. Los handlers son finos: validan,
//! llaman al servicio y traducen el resultado a HTTP. Nunca tocan el
//! ledger ni el estado de la corrida directamente.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::models::dispatch_model::StartDispatchRequest;
use crate::models::message_model::DispatchLogsResponse;
use crate::models::template_settings_model::SaveTemplateSettingsRequest;
use crate::services::contact_service::ContactService;
use crate::services::dispatcher_service::{DispatcherService, StartDispatchError};
use crate::services::ledger_service::LedgerService;
use crate::services::template_settings_service::TemplateSettingsService;

#[derive(Deserialize)]
pub struct TemplateQuery {
    pub template_name: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/bulk-send
pub async fn start_dispatch_endpoint(
    body: web::Json<StartDispatchRequest>,
    dispatcher: web::Data<DispatcherService>,
) -> HttpResponse {
    match dispatcher.start(body.into_inner()).await {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e @ StartDispatchError::MissingTemplate)
        | Err(e @ StartDispatchError::NoEligibleRecipients) => {
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": e.to_string()
            }))
        }
        Err(e @ StartDispatchError::Busy) => HttpResponse::Conflict().json(json!({
            "success": false,
            "error": e.to_string()
        })),
        Err(StartDispatchError::Internal(e)) => {
            log::error!("(start_dispatch) Error interno: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal server error",
                "details": format!("{:?}", e)
            }))
        }
    }
}

/// POST /api/bulk-send/stop
pub async fn stop_dispatch_endpoint(dispatcher: web::Data<DispatcherService>) -> HttpResponse {
    let was_running = dispatcher.stop();
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": if was_running {
            "Detención solicitada; la corrida parará en la próxima iteración"
        } else {
            "No hay corrida activa"
        }
    }))
}

/// GET /api/bulk-send/status
pub async fn dispatch_status_endpoint(dispatcher: web::Data<DispatcherService>) -> HttpResponse {
    HttpResponse::Ok().json(dispatcher.status())
}

/// GET /api/bulk-send/preview?template_name=...&limit=...
pub async fn dispatch_preview_endpoint(
    query: web::Query<TemplateQuery>,
    dispatcher: web::Data<DispatcherService>,
) -> HttpResponse {
    let Some(template_name) = query.template_name.as_deref().filter(|t| !t.trim().is_empty())
    else {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "template_name es requerido"
        }));
    };

    match dispatcher.preview(template_name, query.limit).await {
        Ok(stats) => HttpResponse::Ok().json(json!({
            "success": true,
            "stats": stats
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/bulk-send/logs?template_name=...&limit=...
pub async fn dispatch_logs_endpoint(
    query: web::Query<TemplateQuery>,
    ledger: web::Data<LedgerService>,
) -> HttpResponse {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(100);

    match ledger
        .recent_messages(query.template_name.as_deref(), limit)
        .await
    {
        Ok((logs, total)) => {
            let showing = logs.len();
            HttpResponse::Ok().json(DispatchLogsResponse {
                success: true,
                logs,
                total,
                showing,
            })
        }
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/bulk-send/template-status?template_name=...
pub async fn template_status_endpoint(
    query: web::Query<TemplateQuery>,
    ledger: web::Data<LedgerService>,
    contacts: web::Data<ContactService>,
) -> HttpResponse {
    let Some(template_name) = query.template_name.as_deref().filter(|t| !t.trim().is_empty())
    else {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "template_name es requerido"
        }));
    };

    let all_contacts = match contacts.list_active_contacts().await {
        Ok(c) => c,
        Err(e) => {
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("{:?}", e)
            }))
        }
    };

    match ledger.template_status(template_name, &all_contacts).await {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/stats?template_name=...
pub async fn stats_endpoint(
    query: web::Query<TemplateQuery>,
    ledger: web::Data<LedgerService>,
) -> HttpResponse {
    match ledger.message_stats(query.template_name.as_deref()).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            log::error!("(stats) Error: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("{:?}", e)
            }))
        }
    }
}

/// GET /api/template-settings/{template_name}
pub async fn get_template_settings_endpoint(
    path: web::Path<String>,
    settings: web::Data<TemplateSettingsService>,
) -> HttpResponse {
    let template_name = path.into_inner();

    match settings.get_settings(&template_name).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "No hay configuración para esa plantilla"
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}

/// POST /api/template-settings/{template_name}
pub async fn save_template_settings_endpoint(
    path: web::Path<String>,
    body: web::Json<SaveTemplateSettingsRequest>,
    settings: web::Data<TemplateSettingsService>,
) -> HttpResponse {
    let template_name = path.into_inner();

    match settings
        .save_header_image_id(&template_name, &body.header_image_id)
        .await
    {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:?}", e)
        })),
    }
}
