//! The common database interface implemented by the adapter.
//!
//! Application code talks to [`CommonDb`] and [`DbTransaction`] only, so it does not
//! depend on which document store sits underneath.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

use crate::{error::DbResult, native::TransactionOptions, query::DbQuery, row::Row};

/// How `save_batch` treats rows that already exist (or do not).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMethod {
    /// Create rows; fail if one already exists.
    Insert,
    /// Update existing rows; fail if one does not exist.
    Update,
    /// Create or replace rows.
    #[default]
    Upsert,
}

/// Options shared by read and delete operations.
#[derive(Debug)]
pub struct DbOptions<'a, T> {
    /// Run the operation inside this transaction instead of directly on the store.
    pub tx: Option<&'a T>,
}

impl<'a, T> DbOptions<'a, T> {
    pub fn in_transaction(tx: &'a T) -> Self {
        Self { tx: Some(tx) }
    }
}

impl<T> Default for DbOptions<'_, T> {
    fn default() -> Self {
        Self { tx: None }
    }
}

impl<T> Clone for DbOptions<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DbOptions<'_, T> {}

/// Options of `save_batch`.
#[derive(Debug)]
pub struct SaveOptions<'a, T> {
    /// Write mode; `None` means [`SaveMethod::Upsert`].
    pub save_method: Option<SaveMethod>,
    /// Stage the writes on this transaction instead of committing them in batches.
    pub tx: Option<&'a T>,
}

impl<'a, T> SaveOptions<'a, T> {
    pub fn with_method(save_method: SaveMethod) -> Self {
        Self { save_method: Some(save_method), tx: None }
    }

    pub fn in_transaction(tx: &'a T) -> Self {
        Self { save_method: None, tx: Some(tx) }
    }
}

impl<T> Default for SaveOptions<'_, T> {
    fn default() -> Self {
        Self { save_method: None, tx: None }
    }
}

impl<T> Clone for SaveOptions<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SaveOptions<'_, T> {}

/// Capabilities an implementation of [`CommonDb`] supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSupport {
    pub queries: bool,
    pub db_query_filter: bool,
    pub db_query_filter_in: bool,
    pub db_query_order: bool,
    pub db_query_select_fields: bool,
    pub insert_save_method: bool,
    pub update_save_method: bool,
    pub patch_by_query: bool,
    pub increment: bool,
    pub create_table: bool,
    pub table_schemas: bool,
    pub stream_query: bool,
    pub buffer_values: bool,
    pub null_values: bool,
    pub transactions: bool,
}

impl DbSupport {
    /// Every capability enabled.
    pub const FULL: DbSupport = DbSupport {
        queries: true,
        db_query_filter: true,
        db_query_filter_in: true,
        db_query_order: true,
        db_query_select_fields: true,
        insert_save_method: true,
        update_save_method: true,
        patch_by_query: true,
        increment: true,
        create_table: true,
        table_schemas: true,
        stream_query: true,
        buffer_values: true,
        null_values: true,
        transactions: true,
    };
}

/// Backend-agnostic data access operations.
///
/// All operations take the table name as the collection selector. Failures from
/// the underlying store are propagated unchanged and never retried.
#[async_trait]
pub trait CommonDb: Send + Sync + Debug {
    /// Transaction handle type returned by [`CommonDb::begin_transaction`].
    type Transaction: DbTransaction;

    /// Reports which parts of the interface are supported.
    fn support(&self) -> DbSupport;

    /// Liveness check.
    async fn ping(&self) -> DbResult<()>;

    /// Lists tables, where the store can enumerate them.
    async fn get_tables(&self) -> DbResult<Vec<String>>;

    /// Loads rows by id. Missing rows are omitted; order is not guaranteed.
    async fn get_by_ids(
        &self,
        table: &str,
        ids: &[String],
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<Vec<Row>>;

    /// Runs a query and returns all matching rows.
    async fn run_query(
        &self,
        query: &DbQuery,
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<Vec<Row>>;

    /// Counts the rows matching a query.
    async fn run_query_count(&self, query: &DbQuery) -> DbResult<u64>;

    /// Runs a query and yields rows as the store produces them.
    ///
    /// Store errors are yielded as `Err` items; the stream is single-pass.
    fn stream_query(&self, query: &DbQuery) -> BoxStream<'static, DbResult<Row>>;

    /// Writes rows. Every row must carry an id.
    async fn save_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        options: SaveOptions<'_, Self::Transaction>,
    ) -> DbResult<()>;

    /// Deletes the rows matching a query and returns how many ids were targeted.
    async fn delete_by_query(
        &self,
        query: &DbQuery,
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<usize>;

    /// Deletes rows by id and returns how many ids were targeted.
    async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[String],
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<usize>;

    /// Atomically adds a delta to a numeric field of each row.
    async fn increment_batch(
        &self,
        table: &str,
        field: &str,
        increments: HashMap<String, i64>,
    ) -> DbResult<HashMap<String, i64>>;

    /// Opens a transaction with an imperative commit/rollback lifecycle.
    async fn begin_transaction(&self, options: TransactionOptions) -> DbResult<Self::Transaction>;
}

/// An open transaction.
///
/// Once committed or rolled back the handle is finished and every further call
/// fails with [`DbError::TransactionFinished`](crate::error::DbError::TransactionFinished).
#[async_trait]
pub trait DbTransaction: Send + Sync + Debug {
    /// Commits staged writes and waits for the store's verdict.
    async fn commit(&self) -> DbResult<()>;

    /// Discards staged writes.
    async fn rollback(&self) -> DbResult<()>;

    /// Loads rows by id inside the transaction.
    async fn get_by_ids(&self, table: &str, ids: &[String]) -> DbResult<Vec<Row>>;

    /// Stages row writes on the transaction.
    async fn save_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        save_method: Option<SaveMethod>,
    ) -> DbResult<()>;

    /// Stages row deletes on the transaction.
    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> DbResult<usize>;
}
