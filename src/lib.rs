//! Parts Triage: routes inbound IT parts requests to vendor lookups.

pub mod config;
pub mod credentials;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod vendors;
