//! Main docbridge crate: a backend-agnostic database interface on top of
//! Firestore-style document stores.
//!
//! This crate is the entry point for users of docbridge. It re-exports the core
//! types from the sub-crates and the bundled native store implementations.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DbResult<()> {
//!     let db = DocStoreDb::builder(MemoryStore::builder().build().await?)
//!         .batch_size(500)
//!         .build();
//!
//!     db.save_batch(
//!         "users",
//!         vec![doc! { "id": "u1", "name": "Alice", "age": 30 }],
//!         SaveOptions::default(),
//!     )
//!     .await?;
//!
//!     let adults = db
//!         .run_query(
//!             &DbQuery::create("users").filter("age", FilterOp::Gte, 18).order("age", false),
//!             DbOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{adults:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Transactions
//!
//! Native document stores only run transactions as a callback. docbridge turns that
//! into a handle with explicit `commit` and `rollback`:
//!
//! ```ignore
//! let tx = db.begin_transaction(TransactionOptions::default()).await?;
//!
//! let rows = tx.get_by_ids("accounts", &["a".to_string()]).await?;
//! tx.save_batch("accounts", updated(rows), None).await?;
//!
//! tx.commit().await?;
//! ```
//!
//! Or scoped, committing on `Ok` and rolling back on `Err`:
//!
//! ```ignore
//! db.run_in_transaction(
//!     |tx| Box::pin(async move { tx.delete_by_ids("accounts", &ids).await.map(|_| ()) }),
//!     TransactionOptions::default(),
//! )
//! .await?;
//! ```
//!
//! # Native stores
//!
//! - [`memory`] - In-memory store for development and testing

pub mod prelude;

pub use docbridge_core::{
    chunk, common, config, db, error, id, native, query, row, table, transaction, translate,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory native store.
pub mod memory {
    pub use docbridge_memory::{
        FailPoint, MemoryQuery, MemoryStore, MemoryStoreBuilder, MemoryStoreStats,
        MemoryTransaction,
    };
}
