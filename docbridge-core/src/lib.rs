//! A compatibility adapter exposing a backend-agnostic database interface on top of a
//! Firestore-style document store.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Common interface** ([`common`]) - The [`CommonDb`](common::CommonDb) and
//!   [`DbTransaction`](common::DbTransaction) traits application code talks to
//! - **Native contract** ([`native`]) - Traits a document store client implements
//! - **Adapter** ([`db`]) - [`DocStoreDb`](db::DocStoreDb), the interface implemented on a native store
//! - **Transactions** ([`transaction`]) - Imperative transactions over callback-scoped native ones
//! - **Queries** ([`query`], [`translate`]) - Abstract query model and its native translation
//! - **Rows and ids** ([`row`], [`id`]) - Row/document mapping and document key escaping
//! - **Batching** ([`chunk`]) - Size-capped sequential batch application
//! - **Typed tables** ([`table`]) - Struct-level access to one table
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryStore};
//! use bson::doc;
//!
//! let db = DocStoreDb::new(MemoryStore::builder().build().await?);
//!
//! db.save_batch("users", vec![doc! { "id": "a/b", "name": "Alice" }], SaveOptions::default()).await?;
//!
//! let rows = db.get_by_ids("users", &["a/b".to_string()], DbOptions::default()).await?;
//! assert_eq!(rows[0].get_str("id")?, "a/b");
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod chunk;
pub mod common;
pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod native;
pub mod query;
pub mod row;
pub mod table;
pub mod transaction;
pub mod translate;
