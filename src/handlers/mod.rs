//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (dispatch, webhook, contactos).

pub mod contact_handler;
pub mod dispatch_handler;
pub mod webhook_handler;
