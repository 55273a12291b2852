//! config/mod.rs

pub mod dispatch_config;
pub mod provider_config;
