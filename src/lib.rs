//! In-memory, multi-type keyed store emulating the command semantics of a
//! Redis-style server, for use as an in-process test double.
//!
//! A [`Registry`] owns one [`Keyspace`] per logical database. [`Client`]
//! handles bound to the same database index share that keyspace, and a
//! [`Pipeline`] buffers commands for atomic replay with optimistic WATCH
//! checks.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod reply;
pub mod store;

pub use client::Client;
pub use config::Config;
pub use error::StoreError;
pub use pipeline::{Pipeline, PipelineState};
pub use registry::Registry;
pub use reply::Reply;
pub use store::sort::{SortOptions, SortResult};
pub use store::string::SetOptions;
pub use store::value::{ToBytes, Value, ValueKind};
pub use store::zset::Aggregate;
pub use store::list::InsertPosition;
pub use store::{Keyspace, SharedKeyspace};
