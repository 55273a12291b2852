//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod contact_service;
pub mod dispatcher_service;
pub mod eligibility_service;
pub mod ledger_service;
pub mod pacer;
pub mod provider_service;
pub mod template_settings_service;
pub mod webhook_service;
