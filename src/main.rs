use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::{Pool, Sqlite};

use crate::config::dispatch_config::DispatchConfig;
use crate::config::provider_config::ProviderConfig;
use crate::logger::init_logger;
use crate::services::contact_service::ContactService;
use crate::services::dispatcher_service::DispatcherService;
use crate::services::eligibility_service::EligibilityService;
use crate::services::ledger_service::LedgerService;
use crate::services::provider_service::{TemplateSender, WhatsAppClient};
use crate::services::template_settings_service::TemplateSettingsService;
use crate::services::webhook_service::WebhookService;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database() -> Pool<Sqlite> {
    // 1) Crear carpeta "data"
    std::fs::create_dir_all("data").expect("No se pudo crear directorio 'data'");

    // 2) Ruta final: ./data/dispatch.db
    let db_path = std::env::current_dir()
        .expect("No se pudo obtener el current_dir")
        .join("data")
        .join("dispatch.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

    log::info!("Conectando a SQLite en {}", db_url);

    // 3) Conectarnos con SQLx
    let db_pool = Pool::<Sqlite>::connect(&db_url)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.");

    db_pool
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    // Conectarnos a la DB
    let db_pool = setup_database().await;

    // ContactService corre las migraciones (tabla contacts + ledger + logs)
    let contact_service = ContactService::new(db_pool.clone());
    if let Err(e) = contact_service.run_migrations().await {
        panic!("Fallo en migraciones: {:?}", e);
    }

    let ledger_service = LedgerService::new(db_pool.clone());
    let eligibility_service = EligibilityService::new(ledger_service.clone());
    let settings_service = TemplateSettingsService::new(db_pool.clone());

    // Cliente del proveedor (WhatsApp Cloud API)
    let provider_config = ProviderConfig::from_env();
    if provider_config.access_token.is_empty() {
        log::warn!("WHATSAPP_ACCESS_TOKEN no configurado; los envíos van a fallar");
    }
    let whatsapp_client =
        WhatsAppClient::new(provider_config).expect("No se pudo inicializar WhatsAppClient");
    let sender: Arc<dyn TemplateSender> = Arc::new(whatsapp_client);

    let dispatch_config = DispatchConfig::from_env();

    let dispatcher_service = DispatcherService::new(
        contact_service.clone(),
        ledger_service.clone(),
        eligibility_service,
        settings_service.clone(),
        sender,
        dispatch_config.clone(),
    );

    let webhook_service = WebhookService::new(db_pool.clone(), ledger_service.clone());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5022);

    // Levantar servidor
    log::info!("Levantando servidor en 0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(contact_service.clone()))
            .app_data(web::Data::new(ledger_service.clone()))
            .app_data(web::Data::new(settings_service.clone()))
            .app_data(web::Data::new(dispatcher_service.clone()))
            .app_data(web::Data::new(webhook_service.clone()))
            .app_data(web::Data::new(dispatch_config.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
