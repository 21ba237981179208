//! Mirrors a photo-stream database into a live, queryable album catalog.
//!
//! The engine polls the source store through a [`change::ChangeDetector`],
//! runs [`sync::SyncOrchestrator`] passes that ingest rows with bounded
//! concurrency, and merges each finished album into a [`catalog::Catalog`].

pub mod catalog;
pub mod change;
pub mod cmd;
pub mod config;
pub mod decode;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod media;
pub mod notify;
pub mod source;
pub mod sync;
pub mod timestamp;
pub mod types;

pub use error::{Error, Result};
