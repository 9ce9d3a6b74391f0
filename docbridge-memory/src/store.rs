//! In-memory native document store.
//!
//! Documents are kept as BSON documents keyed by native key, per collection,
//! behind async-aware locks. Besides serving as a lightweight store, it records
//! call statistics and can inject failures, which makes it the harness for
//! exercising the adapter's batching and transaction behavior.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use mea::{mutex::Mutex, rwlock::RwLock};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use docbridge_core::{
    error::{DbError, DbResult},
    native::{
        BatchOperation, NativeQuery, NativeSnapshot, NativeStore, NativeStoreBuilder,
        TransactionBody, TransactionOptions,
    },
};

use crate::{query::MemoryQuery, transaction::MemoryTransaction};

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Counters of the calls a [`MemoryStore`] has served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Key-addressed multi-get calls, including those made in transactions.
    pub get_all_calls: usize,
    /// Size of every successfully committed batch, in commit order.
    pub batch_commits: Vec<usize>,
    /// Query executions, streamed or not.
    pub queries: usize,
    /// Count aggregations served.
    pub counts: usize,
    /// Transactions started.
    pub transactions: usize,
}

/// A failure to inject into a later call. Each fail point fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Fail the n-th upcoming `commit_batch` call (0 is the next one).
    BatchCommit(usize),
    /// Cut the next streamed query off with an error after `after` documents.
    Stream { after: usize },
    /// Fail the next transaction at commit time, as contention would.
    TransactionCommit,
}

#[derive(Debug)]
struct MemoryStoreInner {
    collections: RwLock<StoreMap>,
    stats: Mutex<MemoryStoreStats>,
    faults: Mutex<Vec<FailPoint>>,
    supports_count: bool,
}

/// Thread-safe in-memory implementation of [`NativeStore`].
///
/// `MemoryStore` is cloneable; clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::MemoryStore;
/// use docbridge_core::native::{BatchOperation, NativeStore};
/// use bson::doc;
///
/// let store = MemoryStore::new();
/// store.commit_batch(vec![BatchOperation::Upsert {
///     collection: "users".into(),
///     key: "u1".into(),
///     data: doc! { "name": "Alice" },
/// }]).await?;
///
/// let found = store.get_all("users", vec!["u1".into()]).await?;
/// assert!(found[0].data.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with count aggregation enabled.
    pub fn new() -> Self {
        Self::with_count_support(true)
    }

    fn with_count_support(supports_count: bool) -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                collections: RwLock::new(StoreMap::new()),
                stats: Mutex::new(MemoryStoreStats::default()),
                faults: Mutex::new(vec![]),
                supports_count,
            }),
        }
    }

    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// Returns a snapshot of the call counters.
    pub async fn stats(&self) -> MemoryStoreStats {
        self.inner.stats.lock().await.clone()
    }

    /// Arms a fail point.
    pub async fn fail_on(&self, point: FailPoint) {
        self.inner.faults.lock().await.push(point);
    }

    /// Returns the number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns a stored document by native key.
    pub async fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
    }

    pub(crate) async fn read_keys(&self, collection: &str, keys: Vec<String>) -> Vec<NativeSnapshot> {
        self.inner.stats.lock().await.get_all_calls += 1;

        let collections = self.inner.collections.read().await;
        let documents = collections.get(collection);

        keys.into_iter()
            .map(|key| NativeSnapshot {
                data: documents.and_then(|c| c.get(&key)).cloned(),
                key,
            })
            .collect()
    }

    /// Applies all operations or none of them.
    pub(crate) async fn apply_atomically(&self, operations: Vec<BatchOperation>) -> DbResult<()> {
        let mut collections = self.inner.collections.write().await;
        let mut staged = collections.clone();

        for operation in operations {
            apply_operation(&mut staged, operation)?;
        }

        *collections = staged;

        Ok(())
    }

    /// Consumes the first armed fail point accepted by `fire`.
    ///
    /// `fire` may update the fail point in place (to count down) and returns
    /// `Some` when it should fire now.
    async fn take_fault<T>(&self, mut fire: impl FnMut(&mut FailPoint) -> Option<T>) -> Option<T> {
        let mut faults = self.inner.faults.lock().await;
        let (index, value) = faults
            .iter_mut()
            .enumerate()
            .find_map(|(i, f)| fire(f).map(|v| (i, v)))?;

        faults.remove(index);

        Some(value)
    }
}

fn apply_operation(collections: &mut StoreMap, operation: BatchOperation) -> DbResult<()> {
    match operation {
        BatchOperation::Upsert { collection, key, data } => {
            collections.entry(collection).or_default().insert(key, data);
        }
        BatchOperation::Insert { collection, key, data } => {
            let documents = collections.entry(collection.clone()).or_default();

            if documents.contains_key(&key) {
                return Err(DbError::DocumentAlreadyExists(key, collection));
            }

            documents.insert(key, data);
        }
        BatchOperation::Update { collection, key, data } => {
            let Some(document) = collections
                .get_mut(&collection)
                .and_then(|c| c.get_mut(&key))
            else {
                return Err(DbError::DocumentNotFound(key, collection));
            };

            for (field, value) in data {
                document.insert(field, value);
            }
        }
        BatchOperation::Delete { collection, key } => {
            if let Some(documents) = collections.get_mut(&collection) {
                documents.remove(&key);
            }
        }
        BatchOperation::Increment { collection, key, field, delta } => {
            let document = collections
                .entry(collection)
                .or_default()
                .entry(key.clone())
                .or_default();

            let overflow = || DbError::Backend(format!("increment of {field} on {key} overflows"));

            let incremented = match document.get(&field) {
                Some(Bson::Int32(n)) => {
                    let sum = i64::from(*n).checked_add(delta).ok_or_else(overflow)?;
                    i32::try_from(sum).map_or(Bson::Int64(sum), Bson::Int32)
                }
                Some(Bson::Int64(n)) => Bson::Int64(n.checked_add(delta).ok_or_else(overflow)?),
                Some(Bson::Double(n)) => Bson::Double(n + delta as f64),
                // Non-numeric or missing fields are replaced by the delta.
                _ => Bson::Int64(delta),
            };

            document.insert(field, incremented);
        }
    }

    Ok(())
}

#[async_trait]
impl NativeStore for MemoryStore {
    type Query = MemoryQuery;
    type Transaction = MemoryTransaction;

    fn collection(&self, collection: &str) -> Self::Query {
        MemoryQuery::new(collection)
    }

    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>> {
        Ok(self.read_keys(collection, keys).await)
    }

    async fn commit_batch(&self, operations: Vec<BatchOperation>) -> DbResult<()> {
        let size = operations.len();

        let fault = self
            .take_fault(|point| match point {
                FailPoint::BatchCommit(0) => Some(()),
                FailPoint::BatchCommit(n) => {
                    *n -= 1;
                    None
                }
                _ => None,
            })
            .await;

        if fault.is_some() {
            return Err(DbError::Backend(format!("injected failure committing {size} operations")));
        }

        self.apply_atomically(operations).await?;
        self.inner.stats.lock().await.batch_commits.push(size);

        tracing::trace!(target: "docbridge::memory", size, "Committed batch");

        Ok(())
    }

    async fn run_query(&self, query: Self::Query) -> DbResult<Vec<NativeSnapshot>> {
        self.inner.stats.lock().await.queries += 1;

        let collections = self.inner.collections.read().await;

        Ok(match collections.get(query.collection_name()) {
            Some(documents) => query.execute(documents.iter()),
            None => vec![],
        })
    }

    fn stream_query(&self, query: Self::Query) -> BoxStream<'static, DbResult<NativeSnapshot>> {
        let store = self.clone();

        stream::once(async move {
            let snapshots = store.run_query(query).await?;
            let cut_off = store
                .take_fault(|point| match point {
                    FailPoint::Stream { after } => Some(*after),
                    _ => None,
                })
                .await;

            let mut items = snapshots.into_iter().map(Ok).collect::<Vec<DbResult<_>>>();

            if let Some(after) = cut_off {
                items.truncate(after);
                items.push(Err(DbError::Backend("stream interrupted".into())));
            }

            Ok::<_, DbError>(stream::iter(items))
        })
        .try_flatten()
        .boxed()
    }

    async fn count(&self, query: Self::Query) -> DbResult<Option<u64>> {
        if !self.inner.supports_count {
            return Ok(None);
        }

        self.inner.stats.lock().await.counts += 1;

        let collections = self.inner.collections.read().await;

        Ok(Some(match collections.get(query.collection_name()) {
            Some(documents) => query.execute(documents.iter()).len() as u64,
            None => 0,
        }))
    }

    async fn run_transaction(
        &self,
        options: TransactionOptions,
        body: TransactionBody<Self::Transaction>,
    ) -> DbResult<()> {
        self.inner.stats.lock().await.transactions += 1;

        let tx = Arc::new(MemoryTransaction::new(self.clone(), options.read_only));

        body(tx.clone()).await?;

        let contended = self
            .take_fault(|point| matches!(point, FailPoint::TransactionCommit).then_some(()))
            .await;

        if contended.is_some() {
            return Err(DbError::Backend("transaction aborted due to contention".into()));
        }

        let staged = tx.take_staged().await;
        let size = staged.len();

        self.apply_atomically(staged).await?;

        tracing::trace!(target: "docbridge::memory", size, "Committed transaction");

        Ok(())
    }
}

/// Builder for [`MemoryStore`] instances.
///
/// ```ignore
/// let store = MemoryStore::builder().supports_count(false).build().await?;
/// ```
#[derive(Debug)]
pub struct MemoryStoreBuilder {
    supports_count: bool,
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self { supports_count: true }
    }
}

impl MemoryStoreBuilder {
    /// Enables or disables the count aggregate. Without it, `count` returns `None`.
    pub fn supports_count(mut self, supports_count: bool) -> Self {
        self.supports_count = supports_count;
        self
    }
}

#[async_trait]
impl NativeStoreBuilder for MemoryStoreBuilder {
    type Store = MemoryStore;

    async fn build(self) -> DbResult<Self::Store> {
        Ok(MemoryStore::with_count_support(self.supports_count))
    }
}
