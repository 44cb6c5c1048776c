//! Job buckets: per-bucket, per-action access control for a collaborative
//! job tracker, served over HTTP and persisted in SQLite.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
