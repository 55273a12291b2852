//! app.rs
use crate::handlers::{contact_handler, dispatch_handler, webhook_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/bulk-send")
                    .route("", web::post().to(dispatch_handler::start_dispatch_endpoint))
                    .route(
                        "/stop",
                        web::post().to(dispatch_handler::stop_dispatch_endpoint),
                    )
                    .route(
                        "/status",
                        web::get().to(dispatch_handler::dispatch_status_endpoint),
                    )
                    .route(
                        "/preview",
                        web::get().to(dispatch_handler::dispatch_preview_endpoint),
                    )
                    .route(
                        "/logs",
                        web::get().to(dispatch_handler::dispatch_logs_endpoint),
                    )
                    .route(
                        "/template-status",
                        web::get().to(dispatch_handler::template_status_endpoint),
                    ),
            )
            .service(
                web::scope("/contacts")
                    .route("", web::post().to(contact_handler::create_contact_endpoint))
                    .route("", web::get().to(contact_handler::list_contacts_endpoint))
                    .route(
                        "/{phone}",
                        web::get().to(contact_handler::get_contact_endpoint),
                    )
                    .route(
                        "/{phone}",
                        web::delete().to(contact_handler::delete_contact_endpoint),
                    ),
            )
            .service(
                web::scope("/template-settings")
                    .route(
                        "/{template_name}",
                        web::get().to(dispatch_handler::get_template_settings_endpoint),
                    )
                    .route(
                        "/{template_name}",
                        web::post().to(dispatch_handler::save_template_settings_endpoint),
                    ),
            )
            .route(
                "/webhook-logs",
                web::get().to(webhook_handler::webhook_logs_endpoint),
            )
            .route("/stats", web::get().to(dispatch_handler::stats_endpoint)),
    )
    .route(
        "/webhook",
        web::get().to(webhook_handler::verify_webhook_endpoint),
    )
    .route(
        "/webhook",
        web::post().to(webhook_handler::receive_webhook_endpoint),
    )
    .route("/health", web::get().to(webhook_handler::health_endpoint));
}
