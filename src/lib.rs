//! Storage gateway presenting a flat B2 bucket as a hierarchical file tree.
//!
//! The service layer translates delimiter-scoped prefix listings into
//! one-level directory views, emulates folders with placeholder objects,
//! and ingests remote URLs through a scratch-area transfer pipeline.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod models;
pub mod retry;
pub mod routes;
pub mod services;
