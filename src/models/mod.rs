//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod contact_model;
pub mod dispatch_model;
pub mod message_model;
pub mod template_settings_model;
pub mod webhook_model;
