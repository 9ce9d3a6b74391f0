use async_trait::async_trait;
use bson::doc;
use futures::stream::BoxStream;
use std::sync::Arc;

use docbridge::{
    memory::{FailPoint, MemoryQuery, MemoryStore, MemoryTransaction},
    native::{BatchOperation, NativeSnapshot, NativeTransaction, TransactionBody},
    prelude::*,
};

async fn db() -> DocStoreDb<MemoryStore> {
    DocStoreDb::new(MemoryStore::builder().build().await.unwrap())
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

async fn seed(db: &DocStoreDb<MemoryStore>) {
    db.save_batch(
        "accounts",
        vec![
            doc! { "id": "a", "balance": 100 },
            doc! { "id": "b", "balance": 0 },
        ],
        SaveOptions::default(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn commit_applies_staged_writes() {
    let db = db().await;
    seed(&db).await;

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

    tx.save_batch(
        "accounts",
        vec![doc! { "id": "a", "balance": 50 }, doc! { "id": "c", "balance": 50 }],
        None,
    )
    .await
    .unwrap();
    tx.delete_by_ids("accounts", &ids(&["b"])).await.unwrap();

    // Nothing is visible before commit, inside or outside the transaction.
    let pending = db
        .get_by_ids("accounts", &ids(&["a", "b", "c"]), DbOptions::default())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(tx.get_by_ids("accounts", &ids(&["c"])).await.unwrap().len(), 0);

    tx.commit().await.unwrap();

    assert!(tx.is_finished().await);
    assert_eq!(db.native().document("accounts", "a").await, Some(doc! { "balance": 50 }));
    assert_eq!(db.native().document("accounts", "b").await, None);
    assert_eq!(db.native().document("accounts", "c").await, Some(doc! { "balance": 50 }));
    assert_eq!(db.native().stats().await.batch_commits.len(), 1);
}

#[tokio::test]
async fn rollback_discards_staged_writes() {
    let db = db().await;
    seed(&db).await;

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    tx.save_batch(
        "accounts",
        vec![doc! { "id": "a", "balance": 0 }, doc! { "id": "new", "balance": 5 }],
        None,
    )
    .await
    .unwrap();

    tx.rollback().await.unwrap();

    assert_eq!(db.native().document("accounts", "a").await, Some(doc! { "balance": 100 }));
    assert!(db
        .get_by_ids("accounts", &ids(&["new"]), DbOptions::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn finished_transaction_rejects_further_use() {
    let db = db().await;
    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

    tx.commit().await.unwrap();

    assert!(matches!(tx.commit().await, Err(DbError::TransactionFinished)));
    assert!(matches!(tx.rollback().await, Err(DbError::TransactionFinished)));
    assert!(matches!(
        tx.get_by_ids("accounts", &ids(&["a"])).await,
        Err(DbError::TransactionFinished),
    ));
    assert!(matches!(
        tx.save_batch("accounts", vec![doc! { "id": "x" }], None).await,
        Err(DbError::TransactionFinished),
    ));

    let rolled_back = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    rolled_back.rollback().await.unwrap();

    assert!(matches!(
        rolled_back.delete_by_ids("accounts", &ids(&["a"])).await,
        Err(DbError::TransactionFinished),
    ));
}

#[tokio::test]
async fn transaction_reads_through_the_native_handle() {
    let db = db().await;
    seed(&db).await;

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    let reads_before = db.native().stats().await.get_all_calls;

    let rows = db
        .get_by_ids("accounts", &ids(&["a"]), DbOptions::in_transaction(&tx))
        .await
        .unwrap();

    assert_eq!(rows, vec![doc! { "id": "a", "balance": 100 }]);
    assert_eq!(db.native().stats().await.get_all_calls, reads_before + 1);

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn commit_reports_native_commit_failure() {
    let db = db().await;
    seed(&db).await;
    db.native().fail_on(FailPoint::TransactionCommit).await;

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    tx.save_batch("accounts", vec![doc! { "id": "a", "balance": 1 }], None)
        .await
        .unwrap();

    assert!(matches!(tx.commit().await, Err(DbError::Backend(_))));
    assert!(tx.is_finished().await);
    assert_eq!(db.native().document("accounts", "a").await, Some(doc! { "balance": 100 }));
}

#[tokio::test]
async fn read_only_transaction_rejects_writes() {
    let db = db().await;

    let tx = db
        .begin_transaction(TransactionOptions { read_only: true })
        .await
        .unwrap();

    assert!(matches!(
        tx.save_batch("accounts", vec![doc! { "id": "a" }], None).await,
        Err(DbError::Backend(_)),
    ));

    tx.commit().await.unwrap();
    assert_eq!(db.native().len("accounts").await, 0);
}

#[tokio::test]
async fn invalid_rows_are_rejected_before_staging() {
    let db = db().await;
    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

    let err = tx
        .save_batch(
            "accounts",
            vec![doc! { "id": "ok", "balance": 1 }, doc! { "balance": 2 }],
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Precondition { operation: "saveBatch", .. }));

    tx.commit().await.unwrap();
    assert_eq!(db.native().len("accounts").await, 0);
}

#[tokio::test]
async fn dropped_handle_rolls_back() {
    let db = db().await;
    seed(&db).await;

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    tx.save_batch("accounts", vec![doc! { "id": "a", "balance": 0 }], None)
        .await
        .unwrap();
    drop(tx);

    // A fresh transaction still works and sees the untouched balance.
    let next = db.begin_transaction(TransactionOptions::default()).await.unwrap();
    let rows = next.get_by_ids("accounts", &ids(&["a"])).await.unwrap();
    next.commit().await.unwrap();

    assert_eq!(rows, vec![doc! { "id": "a", "balance": 100 }]);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(db.native().document("accounts", "a").await, Some(doc! { "balance": 100 }));
}

#[tokio::test]
async fn run_in_transaction_commits_on_success() {
    let db = db().await;
    seed(&db).await;

    db.run_in_transaction(
        |tx| {
            Box::pin(async move {
                let mut rows = tx.get_by_ids("accounts", &ids(&["a", "b"])).await?;

                for row in rows.iter_mut() {
                    let balance = row.get_i32("balance").unwrap_or_default();
                    row.insert("balance", balance + 10);
                }

                tx.save_batch("accounts", rows, Some(SaveMethod::Update)).await
            })
        },
        TransactionOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(db.native().document("accounts", "a").await, Some(doc! { "balance": 110 }));
    assert_eq!(db.native().document("accounts", "b").await, Some(doc! { "balance": 10 }));
}

#[tokio::test]
async fn run_in_transaction_rolls_back_on_error() {
    let db = db().await;
    seed(&db).await;

    let graceful = db
        .run_in_transaction(
            |tx| {
                Box::pin(async move {
                    tx.delete_by_ids("accounts", &ids(&["a"])).await?;
                    Err::<(), _>(DbError::Rollback)
                })
            },
            TransactionOptions::default(),
        )
        .await;

    assert!(graceful.is_ok());

    let failed = db
        .run_in_transaction(
            |tx| {
                Box::pin(async move {
                    tx.delete_by_ids("accounts", &ids(&["a"])).await?;
                    Err::<(), _>(DbError::Unknown("insufficient funds".into()))
                })
            },
            TransactionOptions::default(),
        )
        .await;

    assert!(matches!(failed, Err(DbError::Unknown(_))));
    assert_eq!(db.native().len("accounts").await, 2);
}

#[tokio::test]
async fn run_in_transaction_accepts_an_explicit_rollback() {
    let db = db().await;
    seed(&db).await;

    db.run_in_transaction(
        |tx| {
            Box::pin(async move {
                tx.delete_by_ids("accounts", &ids(&["a"])).await?;
                tx.rollback().await
            })
        },
        TransactionOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(db.native().len("accounts").await, 2);
    assert_eq!(db.native().stats().await.transactions, 1);
}

/// Memory store whose transactions yield to the scheduler before staging a write.
#[derive(Debug, Clone, Default)]
struct YieldingStore(MemoryStore);

#[derive(Debug)]
struct YieldingTransaction(Arc<MemoryTransaction>);

#[async_trait]
impl NativeTransaction for YieldingTransaction {
    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>> {
        tokio::task::yield_now().await;
        self.0.get_all(collection, keys).await
    }

    async fn stage(&self, operation: BatchOperation) -> DbResult<()> {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.0.stage(operation).await
    }
}

#[async_trait]
impl NativeStore for YieldingStore {
    type Query = MemoryQuery;
    type Transaction = YieldingTransaction;

    fn collection(&self, collection: &str) -> MemoryQuery {
        self.0.collection(collection)
    }

    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>> {
        self.0.get_all(collection, keys).await
    }

    async fn commit_batch(&self, operations: Vec<BatchOperation>) -> DbResult<()> {
        self.0.commit_batch(operations).await
    }

    async fn run_query(&self, query: MemoryQuery) -> DbResult<Vec<NativeSnapshot>> {
        self.0.run_query(query).await
    }

    fn stream_query(&self, query: MemoryQuery) -> BoxStream<'static, DbResult<NativeSnapshot>> {
        self.0.stream_query(query)
    }

    async fn count(&self, query: MemoryQuery) -> DbResult<Option<u64>> {
        self.0.count(query).await
    }

    async fn run_transaction(
        &self,
        options: TransactionOptions,
        body: TransactionBody<YieldingTransaction>,
    ) -> DbResult<()> {
        self.0
            .run_transaction(
                options,
                Box::new(move |tx: Arc<MemoryTransaction>| {
                    body(Arc::new(YieldingTransaction(tx)))
                }),
            )
            .await
    }
}

#[tokio::test]
async fn commit_waits_for_in_flight_staging() {
    let db = DocStoreDb::new(YieldingStore::default());
    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

    let (saved, committed) = tokio::join!(
        tx.save_batch("accounts", vec![doc! { "id": "a", "balance": 1 }], None),
        tx.commit(),
    );

    saved.unwrap();
    committed.unwrap();
    assert_eq!(db.native().0.document("accounts", "a").await, Some(doc! { "balance": 1 }));
}

#[tokio::test]
async fn rollback_waits_for_in_flight_reads() {
    let db = DocStoreDb::new(YieldingStore::default());
    db.save_batch("accounts", vec![doc! { "id": "a", "balance": 7 }], SaveOptions::default())
        .await
        .unwrap();

    let tx = db.begin_transaction(TransactionOptions::default()).await.unwrap();

    let wanted = ids(&["a"]);
    let (rows, rolled_back) = tokio::join!(tx.get_by_ids("accounts", &wanted), tx.rollback());

    assert_eq!(rows.unwrap(), vec![doc! { "id": "a", "balance": 7 }]);
    rolled_back.unwrap();
    assert!(matches!(
        tx.save_batch("accounts", vec![doc! { "id": "b" }], None).await,
        Err(DbError::TransactionFinished),
    ));
}
