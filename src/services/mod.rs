//! Bucket engine: registry, permission gate, settings validation,
//! identity resolution, persistence, and the service that ties them together.

pub mod bucket_service;
pub mod bucket_store;
pub mod gate;
pub mod identity;
pub mod registry;
pub mod settings;
