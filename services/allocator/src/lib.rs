//! Faculty–student mentorship allocator.
//!
//! The crate ships an `allocator` binary serving the HTTP API, and exposes the
//! engine, stores and router as a library for embedding and integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod model;
pub mod state;
pub mod store;
