//! HTTP surface: player page, stats, listener stream and producer uplink

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
