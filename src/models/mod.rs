//! Core data models for the storage gateway.
//!
//! `b2` holds the typed wire schemas for the backing store's API; `entry`
//! holds the one-level directory views the gateway derives from flat keys
//! and serializes back to callers via `serde`.

pub mod b2;
pub mod entry;
