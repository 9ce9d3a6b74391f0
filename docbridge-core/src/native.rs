//! Contract consumed from the native document store client.
//!
//! This module defines the traits a document store client must implement for the
//! adapter to run on top of it. The adapter never talks to a concrete store; it only
//! uses the handful of primitives described here.
//!
//! # Overview
//!
//! - [`NativeStore`]: key-addressed reads, atomic batch writes, query execution,
//!   streaming, count aggregation and callback-scoped transactions
//! - [`NativeQuery`]: the store's own immutable query builder
//! - [`NativeTransaction`]: the handle passed to a transaction callback
//! - [`NativeStoreBuilder`]: factory trait for creating store instances
//!
//! Native keys handed to these traits are already escaped (see [`crate::id`]);
//! documents are row bodies without the `id` field.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

use crate::{error::DbResult, query::FilterOp};

/// Filter operators of the native query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

impl From<FilterOp> for NativeOp {
    fn from(op: FilterOp) -> Self {
        match op {
            FilterOp::Eq => NativeOp::Eq,
            FilterOp::Ne => NativeOp::Ne,
            FilterOp::Lt => NativeOp::Lt,
            FilterOp::Lte => NativeOp::Lte,
            FilterOp::Gt => NativeOp::Gt,
            FilterOp::Gte => NativeOp::Gte,
            FilterOp::In => NativeOp::In,
            FilterOp::NotIn => NativeOp::NotIn,
            FilterOp::ArrayContains => NativeOp::ArrayContains,
            FilterOp::ArrayContainsAny => NativeOp::ArrayContainsAny,
        }
    }
}

/// Sort direction for native query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// A document as returned by the native store.
///
/// `data` is `None` when a key-addressed read found no document.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSnapshot {
    pub key: String,
    pub data: Option<Document>,
}

/// One write staged on a native batch or transaction.
///
/// `key` is the escaped native document key and `data` the row body.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    /// Create the document or replace it entirely.
    Upsert { collection: String, key: String, data: Document },
    /// Create the document; fail if it already exists.
    Insert { collection: String, key: String, data: Document },
    /// Update fields of an existing document; fail if it does not exist.
    Update { collection: String, key: String, data: Document },
    /// Delete the document; deleting a missing document is not an error.
    Delete { collection: String, key: String },
    /// Merge-write that atomically adds `delta` to a numeric field,
    /// creating the document or field when absent.
    Increment { collection: String, key: String, field: String, delta: i64 },
}

impl BatchOperation {
    /// Returns the collection this operation targets.
    pub fn collection(&self) -> &str {
        match self {
            BatchOperation::Upsert { collection, .. }
            | BatchOperation::Insert { collection, .. }
            | BatchOperation::Update { collection, .. }
            | BatchOperation::Delete { collection, .. }
            | BatchOperation::Increment { collection, .. } => collection,
        }
    }

    /// Returns the native key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            BatchOperation::Upsert { key, .. }
            | BatchOperation::Insert { key, .. }
            | BatchOperation::Update { key, .. }
            | BatchOperation::Delete { key, .. }
            | BatchOperation::Increment { key, .. } => key,
        }
    }
}

/// Options forwarded to the native transaction primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Open a read-only transaction; staging writes on it fails.
    pub read_only: bool,
}

/// The store's immutable query builder.
///
/// Every builder call returns a new query; the adapter folds filters and orders
/// onto an empty query obtained from [`NativeStore::collection`].
pub trait NativeQuery: Send + Sync + Clone + Debug + 'static {
    /// Returns the collection this query runs against.
    fn collection_name(&self) -> &str;

    /// Adds a `field <op> value` predicate.
    fn where_field(self, field: &str, op: NativeOp, value: Bson) -> Self;

    /// Adds a sort order.
    fn order_by(self, field: &str, direction: SortDirection) -> Self;

    /// Caps the number of returned documents; `None` removes any cap.
    fn limit(self, limit: Option<usize>) -> Self;

    /// Restricts returned document bodies to the given fields.
    fn select(self, fields: &[String]) -> Self;
}

/// Handle given to a native transaction callback.
///
/// Writes are staged and only applied when the callback returns `Ok` and the
/// store commits the transaction.
#[async_trait]
pub trait NativeTransaction: Send + Sync + Debug + 'static {
    /// Reads documents by key inside the transaction.
    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>>;

    /// Stages one write on the transaction.
    async fn stage(&self, operation: BatchOperation) -> DbResult<()>;
}

/// Body of a native transaction.
///
/// The store calls it exactly once with the transaction handle and commits when
/// the returned future resolves to `Ok`. Any `Err` aborts the transaction and is
/// returned from [`NativeStore::run_transaction`] unchanged.
pub type TransactionBody<T> = Box<dyn FnOnce(Arc<T>) -> BoxFuture<'static, DbResult<()>> + Send>;

/// Abstract interface for native document store clients.
///
/// # Thread Safety
///
/// Implementations are shared between the adapter and the transaction bridge's
/// driver task, so they must be `Send + Sync + 'static`.
///
/// # Error Handling
///
/// Store-side failures are returned as [`DbError`](crate::error::DbError) values
/// and propagated by the adapter unchanged.
#[async_trait]
pub trait NativeStore: Send + Sync + Debug + 'static {
    /// Query builder type of this store.
    type Query: NativeQuery;

    /// Transaction handle type of this store.
    type Transaction: NativeTransaction;

    /// Returns an empty query over `collection`.
    fn collection(&self, collection: &str) -> Self::Query;

    /// Reads documents by key in one round trip.
    ///
    /// Returns one snapshot per requested key; missing documents come back with
    /// `data == None`. Order is not guaranteed.
    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>>;

    /// Applies all operations as one atomic batch: all succeed or none do.
    ///
    /// Stores cap the number of operations per batch; callers chunk accordingly.
    async fn commit_batch(&self, operations: Vec<BatchOperation>) -> DbResult<()>;

    /// Executes a query and returns every matching document.
    async fn run_query(&self, query: Self::Query) -> DbResult<Vec<NativeSnapshot>>;

    /// Executes a query and yields matching documents as they arrive.
    ///
    /// A failure mid-stream is yielded as an `Err` item.
    fn stream_query(&self, query: Self::Query) -> BoxStream<'static, DbResult<NativeSnapshot>>;

    /// Counts matching documents server-side.
    ///
    /// Returns `Ok(None)` when the store has no count aggregate.
    async fn count(&self, query: Self::Query) -> DbResult<Option<u64>>;

    /// Runs `body` as one transaction attempt and commits it when the body succeeds.
    async fn run_transaction(
        &self,
        options: TransactionOptions,
        body: TransactionBody<Self::Transaction>,
    ) -> DbResult<()>;
}

#[async_trait]
pub trait NativeStoreBuilder {
    type Store: NativeStore;

    async fn build(self) -> DbResult<Self::Store>;
}
