//! In-memory native document store for docbridge.
//!
//! This crate provides [`MemoryStore`], a thread-safe implementation of the
//! [`NativeStore`](docbridge_core::native::NativeStore) contract backed by
//! async-aware locks. It behaves like a Firestore-style store: key-addressed
//! multi-gets, atomic batches, immutable query builders, count aggregation and
//! callback-scoped transactions.
//!
//! It also records call statistics and supports injected failures
//! ([`FailPoint`]), so it doubles as a test harness for the adapter.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = DocStoreDb::new(MemoryStore::builder().build().await?);
//!
//!     db.save_batch("users", vec![doc! { "id": "u1", "name": "Alice" }], SaveOptions::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

mod evaluator;
pub mod query;
pub mod store;
pub mod transaction;

pub use query::MemoryQuery;
pub use store::{FailPoint, MemoryStore, MemoryStoreBuilder, MemoryStoreStats};
pub use transaction::MemoryTransaction;
