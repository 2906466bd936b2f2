//! HTTP API
//!
//! JSON endpoints for games, rounds, plays and verification, plus Prometheus
//! metrics.

pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{create_app, ApiConfig, ApiServer};
