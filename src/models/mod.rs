//! Core data models for the job bucket service.
//!
//! Buckets own their job associations, permission grants and routing
//! settings. Principals are resolved characters that grants are made to.

pub mod action;
pub mod bucket;
pub mod permissions;
pub mod principal;
