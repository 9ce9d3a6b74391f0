//! The adapter: the common database interface on top of a native document store.
//!
//! [`DocStoreDb`] composes the identifier codec, the row codec, the query translator,
//! the batch chunker and the transaction bridge into an implementation of
//! [`CommonDb`] for any [`NativeStore`].
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryStore};
//! use bson::doc;
//!
//! let db = DocStoreDb::builder(MemoryStore::builder().build().await?)
//!     .batch_size(500)
//!     .build();
//!
//! db.save_batch("users", vec![doc! { "id": "u1", "name": "Alice" }], SaveOptions::default()).await?;
//! let rows = db.run_query(&DbQuery::create("users").filter_eq("name", "Alice"), DbOptions::default()).await?;
//! ```
//!
//! # Batching
//!
//! Outside a transaction, writes and deletes are committed in chunks of at most
//! `batch_size` operations. Each chunk is atomic; the call as a whole is not, and
//! a failure leaves earlier chunks applied. Inside a transaction, operations are
//! staged on the native transaction without chunking.

use async_trait::async_trait;
use futures::{
    StreamExt, TryStreamExt,
    future::{BoxFuture, ready},
    stream::{self, BoxStream},
};
use std::{collections::HashMap, sync::Arc};

use crate::{
    chunk::chunked_apply,
    common::{CommonDb, DbOptions, DbSupport, DbTransaction, SaveMethod, SaveOptions},
    config::DocStoreDbConfig,
    error::{DbError, DbResult},
    id::encode_id,
    native::{
        BatchOperation, NativeOp, NativeQuery, NativeSnapshot, NativeStore, TransactionOptions,
    },
    query::{DbQuery, FilterOp},
    row::{Row, RowCodec},
    transaction::DocStoreTransaction,
    translate::translate_query,
};

#[derive(Debug)]
struct DocStoreDbInner<N> {
    native: Arc<N>,
    config: DocStoreDbConfig,
    codec: RowCodec,
}

/// A [`CommonDb`] backed by a native document store.
///
/// Cloning is cheap; clones share the same native store and configuration.
#[derive(Debug)]
pub struct DocStoreDb<N: NativeStore> {
    inner: Arc<DocStoreDbInner<N>>,
}

impl<N: NativeStore> Clone for DocStoreDb<N> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<N: NativeStore> DocStoreDb<N> {
    /// Creates an adapter with the default configuration.
    pub fn new(native: N) -> Self {
        Self::builder(native).build()
    }

    /// Creates a builder for an adapter over `native`.
    pub fn builder(native: N) -> DocStoreDbBuilder<N> {
        DocStoreDbBuilder::new(native)
    }

    /// Returns the native store client.
    pub fn native(&self) -> &N {
        &self.inner.native
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &DocStoreDbConfig {
        &self.inner.config
    }

    pub(crate) fn native_arc(&self) -> Arc<N> {
        self.inner.native.clone()
    }

    /// Runs `f` inside a transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it returns
    /// `Err`. Returning [`DbError::Rollback`] rolls back without an error; any other
    /// error is returned after the rollback.
    ///
    /// ```ignore
    /// db.run_in_transaction(
    ///     |tx| Box::pin(async move {
    ///         tx.save_batch("users", rows, None).await
    ///     }),
    ///     TransactionOptions::default(),
    /// ).await?;
    /// ```
    pub async fn run_in_transaction<F>(&self, f: F, options: TransactionOptions) -> DbResult<()>
    where
        F: for<'t> FnOnce(&'t DocStoreTransaction<N>) -> BoxFuture<'t, DbResult<()>> + Send,
    {
        let tx = self.begin_transaction(options).await?;

        match f(&tx).await {
            // The body may have finished the transaction itself.
            Ok(()) => {
                if tx.is_finished().await {
                    Ok(())
                } else {
                    tx.commit().await
                }
            }
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) | Err(DbError::TransactionFinished) => {}
                    Err(rollback_err) => tracing::warn!(
                        target: "docbridge::transaction",
                        transaction = %tx.id(),
                        error = %rollback_err,
                        "Rollback after failed transaction body did not complete"
                    ),
                }

                if err.is_rollback() { Ok(()) } else { Err(err) }
            }
        }
    }

    fn native_query(&self, query: &DbQuery) -> DbResult<N::Query> {
        translate_query(
            query,
            self.inner.native.collection(&query.table),
            &self.inner.config.operators,
        )
    }

    fn decode_all(&self, snapshots: Vec<NativeSnapshot>) -> Vec<Row> {
        snapshots
            .into_iter()
            .filter_map(|snapshot| self.inner.codec.decode(snapshot))
            .collect()
    }

    async fn commit_chunked(&self, operations: Vec<BatchOperation>) -> DbResult<()> {
        let native = &self.inner.native;

        chunked_apply(operations, self.inner.config.batch_size, |chunk| native.commit_batch(chunk))
            .await?;

        Ok(())
    }

    fn delete_operations(
        operation: &'static str,
        table: &str,
        ids: &[String],
    ) -> DbResult<Vec<BatchOperation>> {
        ids.iter()
            .map(|id| {
                if id.is_empty() {
                    return Err(DbError::precondition(operation, table, "empty id provided"));
                }

                Ok(BatchOperation::Delete {
                    collection: table.to_string(),
                    key: encode_id(id),
                })
            })
            .collect()
    }
}

/// Restricts a decoded row to the query's projection.
///
/// The row decoder always injects `id`, so a projection leaving `id` out has to
/// remove it again.
fn project(query: &DbQuery, row: Row) -> Row {
    match &query.selected_field_names {
        Some(fields) => row
            .into_iter()
            .filter(|(k, _)| fields.contains(k))
            .collect(),
        None => row,
    }
}

#[async_trait]
impl<N: NativeStore> CommonDb for DocStoreDb<N> {
    type Transaction = DocStoreTransaction<N>;

    fn support(&self) -> DbSupport {
        DbSupport {
            patch_by_query: false,
            table_schemas: false,
            ..DbSupport::FULL
        }
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }

    async fn get_tables(&self) -> DbResult<Vec<String>> {
        Ok(vec![])
    }

    async fn get_by_ids(
        &self,
        table: &str,
        ids: &[String],
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<Vec<Row>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let keys = ids.iter().map(|id| encode_id(id)).collect::<Vec<_>>();
        let snapshots = match options.tx {
            Some(tx) => tx.read_keys(table, keys).await?,
            None => self.inner.native.get_all(table, keys).await?,
        };

        Ok(self.decode_all(snapshots))
    }

    async fn run_query(
        &self,
        query: &DbQuery,
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<Vec<Row>> {
        let rows = match query.filter_ids() {
            Some(ids) => {
                tracing::debug!(
                    target: "docbridge::db",
                    table = %query.table,
                    ids = ids.len(),
                    "Resolving id-filtered query by key"
                );
                self.get_by_ids(&query.table, &ids, options).await?
            }
            None => self.decode_all(
                self.inner
                    .native
                    .run_query(self.native_query(query)?)
                    .await?,
            ),
        };

        Ok(rows.into_iter().map(|row| project(query, row)).collect())
    }

    async fn run_query_count(&self, query: &DbQuery) -> DbResult<u64> {
        if let Some(ids) = query.filter_ids() {
            return Ok(self
                .get_by_ids(&query.table, &ids, DbOptions::default())
                .await?
                .len() as u64);
        }

        let native_query = self.native_query(query)?;

        match self.inner.native.count(native_query.clone()).await? {
            Some(count) => Ok(count),
            None => Ok(self
                .inner
                .native
                .run_query(native_query.select(&[]))
                .await?
                .into_iter()
                .filter(|snapshot| snapshot.data.is_some())
                .count() as u64),
        }
    }

    fn stream_query(&self, query: &DbQuery) -> BoxStream<'static, DbResult<Row>> {
        let query = query.clone();

        if let Some(ids) = query.filter_ids() {
            let db = self.clone();

            return stream::once(async move {
                let rows = db
                    .get_by_ids(&query.table, &ids, DbOptions::default())
                    .await?;

                Ok::<_, DbError>(stream::iter(
                    rows.into_iter()
                        .map(move |row| Ok::<_, DbError>(project(&query, row))),
                ))
            })
            .try_flatten()
            .boxed();
        }

        let native_query = match self.native_query(&query) {
            Ok(native_query) => native_query,
            Err(err) => return stream::once(ready(Err(err))).boxed(),
        };
        let codec = self.inner.codec;

        self.inner
            .native
            .stream_query(native_query)
            .try_filter_map(move |snapshot| {
                ready(Ok(codec
                    .decode(snapshot)
                    .map(|row| project(&query, row))))
            })
            .boxed()
    }

    async fn save_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        options: SaveOptions<'_, Self::Transaction>,
    ) -> DbResult<()> {
        let method = options.save_method.unwrap_or_default();
        let codec = &self.inner.codec;

        // Every row is checked before anything is sent.
        let operations = rows
            .into_iter()
            .map(|row| {
                let (key, data) = codec.encode("saveBatch", table, row)?;
                let collection = table.to_string();

                Ok(match method {
                    SaveMethod::Insert => BatchOperation::Insert { collection, key, data },
                    SaveMethod::Update => BatchOperation::Update { collection, key, data },
                    SaveMethod::Upsert => BatchOperation::Upsert { collection, key, data },
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        match options.tx {
            Some(tx) => tx.stage_all(operations).await,
            None => self.commit_chunked(operations).await,
        }
    }

    async fn delete_by_query(
        &self,
        query: &DbQuery,
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<usize> {
        let ids = match query.filter_ids() {
            Some(ids) => ids,
            None => {
                let ids_query = query.clone().select(Vec::<String>::new());

                self.decode_all(
                    self.inner
                        .native
                        .run_query(self.native_query(&ids_query)?)
                        .await?,
                )
                .iter()
                .filter_map(RowCodec::row_id)
                .collect()
            }
        };

        self.delete_by_ids(&query.table, &ids, options).await
    }

    async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[String],
        options: DbOptions<'_, Self::Transaction>,
    ) -> DbResult<usize> {
        let operations = Self::delete_operations("deleteByIds", table, ids)?;

        match options.tx {
            Some(tx) => tx.stage_all(operations).await?,
            None => self.commit_chunked(operations).await?,
        }

        Ok(ids.len())
    }

    /// Always returns an empty map: post-increment values are not read back.
    async fn increment_batch(
        &self,
        table: &str,
        field: &str,
        increments: HashMap<String, i64>,
    ) -> DbResult<HashMap<String, i64>> {
        let operations = increments
            .into_iter()
            .map(|(id, delta)| {
                if id.is_empty() {
                    return Err(DbError::precondition("incrementBatch", table, "empty id provided"));
                }

                Ok(BatchOperation::Increment {
                    collection: table.to_string(),
                    key: encode_id(&id),
                    field: field.to_string(),
                    delta,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        self.commit_chunked(operations).await?;

        Ok(HashMap::new())
    }

    async fn begin_transaction(&self, options: TransactionOptions) -> DbResult<Self::Transaction> {
        DocStoreTransaction::begin(self.clone(), options).await
    }
}

/// Builder for [`DocStoreDb`].
pub struct DocStoreDbBuilder<N: NativeStore> {
    native: N,
    config: DocStoreDbConfig,
}

impl<N: NativeStore> DocStoreDbBuilder<N> {
    /// Creates a builder with the default configuration.
    pub fn new(native: N) -> Self {
        Self {
            native,
            config: DocStoreDbConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: DocStoreDbConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum operations per native atomic batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Strips explicit `null` values before writing.
    pub fn strip_null_values(mut self, strip: bool) -> Self {
        self.config.strip_null_values = strip;
        self
    }

    /// Overrides the native operator used for an abstract one.
    pub fn operator(mut self, from: FilterOp, to: NativeOp) -> Self {
        self.config.operators = self.config.operators.with(from, to);
        self
    }

    pub fn build(self) -> DocStoreDb<N> {
        let mut config = self.config;
        config.batch_size = config.batch_size.max(1);

        DocStoreDb {
            inner: Arc::new(DocStoreDbInner {
                native: Arc::new(self.native),
                codec: RowCodec::new(config.strip_null_values),
                config,
            }),
        }
    }
}
