//! url-shortener - URL shortening backend
//!
//! Short ids are generated collision-safe on top of the backend's
//! insert-if-absent primitive, deletion is authorized by an HMAC tag over
//! the id, and every redirect appends to a per-entry visitor log.
//!
//! # Architecture
//! - `storage`: `Storage` trait, entry/visitor models, Redis and in-memory backends
//! - `store`: `EntryStore`, id generator, deletion-tag signer, visit recorder
//! - `api`: HTTP handlers (actix-web)
//! - `config`: configuration snapshot (TOML + environment)
//! - `system`: logging, server mode, shutdown

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod storage;
pub mod store;
pub mod system;
pub mod utils;
