//! tests/support.rs
//! Helpers compartidos: pool SQLite en memoria, seed de contactos y un
//! proveedor stub para manejar el dispatcher sin red.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::dispatch_config::DispatchConfig;
use crate::models::contact_model::CreateContactRequest;
use crate::models::message_model::SendOutcome;
use crate::services::contact_service::ContactService;
use crate::services::dispatcher_service::DispatcherService;
use crate::services::eligibility_service::EligibilityService;
use crate::services::ledger_service::LedgerService;
use crate::services::provider_service::{TemplateSender, TemplateSpec};
use crate::services::template_settings_service::TemplateSettingsService;

/// Pool en memoria con una sola conexión (cada conexión :memory: de
/// SQLite es una base distinta) y migraciones corridas.
///
/// El latido: con el reloj de tokio pausado, cada park del runtime salta
/// el reloj virtual directo al próximo timer pendiente. Sin otros timers,
/// ese próximo timer es el acquire timeout del pool (30s), que dispara
/// antes de que el hilo real de SQLite alcance a responder y tira "pool
/// timed out". Un timer corto siempre presente hace que los parks avancen
/// de a pasos chicos, dándole tiempo de pared real al hilo de SQLite; la
/// tarea muere sola cuando el runtime del test se apaga.
pub async fn test_pool() -> Pool<Sqlite> {
    tokio::spawn(async {
        loop {
            tokio::time::sleep(Duration::from_micros(500)).await;
        }
    });

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo crear el pool en memoria");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Fallo al correr migraciones en tests");

    pool
}

/// Da de alta `count` contactos con teléfonos ascendentes, para que el
/// orden de entrada sea estable y verificable.
pub async fn seed_contacts(contacts: &ContactService, count: usize) -> Vec<String> {
    let mut phones = Vec::with_capacity(count);
    for i in 1..=count {
        let phone = format!("+5215550{:04}", i);
        contacts
            .create_contact(CreateContactRequest {
                phone: phone.clone(),
                name: format!("Contacto {}", i),
                country: None,
                tags: None,
            })
            .await
            .expect("No se pudo crear contacto de prueba");
        phones.push(phone);
    }
    phones
}

/// Proveedor stub: registra llamadas, puede fallar teléfonos puntuales y
/// puede pedir stop() tras N envíos (para probar la cancelación).
pub struct StubSender {
    calls: Mutex<Vec<String>>,
    fail_phones: Mutex<HashSet<String>>,
    stop_after: Option<usize>,
    dispatcher: OnceLock<DispatcherService>,
}

impl StubSender {
    pub fn new() -> Arc<Self> {
        Arc::new(StubSender {
            calls: Mutex::new(Vec::new()),
            fail_phones: Mutex::new(HashSet::new()),
            stop_after: None,
            dispatcher: OnceLock::new(),
        })
    }

    pub fn with_stop_after(n: usize) -> Arc<Self> {
        Arc::new(StubSender {
            calls: Mutex::new(Vec::new()),
            fail_phones: Mutex::new(HashSet::new()),
            stop_after: Some(n),
            dispatcher: OnceLock::new(),
        })
    }

    pub fn fail_phone(&self, phone: &str) {
        self.fail_phones.lock().unwrap().insert(phone.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_phones.lock().unwrap().clear();
    }

    pub fn attach_dispatcher(&self, dispatcher: DispatcherService) {
        let _ = self.dispatcher.set(dispatcher);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateSender for StubSender {
    async fn send_template(&self, phone: &str, _template: &TemplateSpec) -> SendOutcome {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(phone.to_string());
            calls.len()
        };

        if self.stop_after == Some(call_number) {
            if let Some(dispatcher) = self.dispatcher.get() {
                dispatcher.stop();
            }
        }

        if self.fail_phones.lock().unwrap().contains(phone) {
            SendOutcome::failed("Fallo simulado del proveedor")
        } else {
            SendOutcome::ok(Some(format!("wamid.test.{}", call_number)))
        }
    }
}

/// Proveedor que nunca responde: sirve para dejar una corrida "viva"
/// mientras se prueba el guard de busy.
pub struct BlockingSender;

#[async_trait]
impl TemplateSender for BlockingSender {
    async fn send_template(&self, _phone: &str, _template: &TemplateSpec) -> SendOutcome {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Construye el dispatcher completo sobre el pool dado.
pub fn build_dispatcher(
    pool: &Pool<Sqlite>,
    sender: Arc<dyn TemplateSender>,
) -> (DispatcherService, ContactService, LedgerService) {
    let contacts = ContactService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone());
    let eligibility = EligibilityService::new(ledger.clone());
    let settings = TemplateSettingsService::new(pool.clone());

    let dispatcher = DispatcherService::new(
        contacts.clone(),
        ledger.clone(),
        eligibility,
        settings,
        sender,
        DispatchConfig::default(),
    );

    (dispatcher, contacts, ledger)
}

/// Espera a que la corrida activa termine.
pub async fn wait_until_idle(dispatcher: &DispatcherService) {
    for _ in 0..10_000 {
        if !dispatcher.status().is_running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("El dispatcher no terminó a tiempo");
}
