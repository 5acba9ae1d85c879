//! Portcullis HTTP server: configuration, error mapping, and the router
//! in front of the decision engine and the tenant store.

pub mod api;
pub mod app;
pub mod config;
