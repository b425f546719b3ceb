//! # LinkMind API
//!
//! Axum HTTP surface. The bookmark CRUD collaborator pushes lifecycle
//! events here; the UI reads per-bookmark reminder status; operators can
//! trigger a dispatch pass by hand.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
