pub mod app;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod server;
pub mod types;
