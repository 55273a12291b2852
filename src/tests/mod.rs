//! tests/mod.rs
//! Pruebas del motor de envío masivo.

mod dispatcher_tests;
mod support;
mod webhook_tests;
