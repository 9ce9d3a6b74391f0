//! Imperative transactions on top of a callback-scoped native transaction.
//!
//! Native stores only offer "run this body inside a transaction". The bridge starts
//! that primitive on a driver task with a body that hands the native transaction
//! handle back to the caller and then parks on a pending signal. The returned
//! [`DocStoreTransaction`] owns the signal's sender:
//!
//! - `commit` resolves the body with `Ok`, so the store commits, and waits for the
//!   driver to report the store's verdict
//! - `rollback` resolves the body with [`DbError::Rollback`], which the driver
//!   treats as a graceful abort
//! - dropping the handle without finishing it closes the signal, which rolls back
//!
//! The driver never retries the body: the adapter's body is stateful, so a second
//! attempt would observe a finished signal.

use async_trait::async_trait;
use futures::FutureExt;
use mea::mutex::Mutex;
use std::{fmt, mem, sync::Arc};
use tokio::{sync::oneshot, task::JoinHandle};
use uuid::Uuid;

use crate::{
    common::{CommonDb, DbOptions, DbTransaction, SaveMethod, SaveOptions},
    db::DocStoreDb,
    error::{DbError, DbResult},
    native::{
        BatchOperation, NativeSnapshot, NativeStore, NativeTransaction, TransactionBody,
        TransactionOptions,
    },
    row::Row,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Commit,
    Rollback,
}

enum BridgeState {
    Pending {
        signal: oneshot::Sender<Signal>,
        completed: JoinHandle<DbResult<()>>,
    },
    Finished,
}

/// An open transaction on a [`DocStoreDb`].
///
/// Reads and staged writes go through the native transaction handle; the
/// transaction finishes exactly once, on the first `commit` or `rollback`.
pub struct DocStoreTransaction<N: NativeStore> {
    id: Uuid,
    db: DocStoreDb<N>,
    tx: Arc<N::Transaction>,
    state: Mutex<BridgeState>,
}

impl<N: NativeStore> fmt::Debug for DocStoreTransaction<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStoreTransaction")
            .field("id", &self.id)
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

impl<N: NativeStore> DocStoreTransaction<N> {
    /// Starts the native transaction and waits until its body holds the handle.
    pub(crate) async fn begin(db: DocStoreDb<N>, options: TransactionOptions) -> DbResult<Self> {
        let id = Uuid::new_v4();
        let (handle_tx, handle_rx) = oneshot::channel::<Arc<N::Transaction>>();
        let (signal_tx, signal_rx) = oneshot::channel::<Signal>();

        let body: TransactionBody<N::Transaction> = Box::new(move |tx: Arc<N::Transaction>| {
            async move {
                if handle_tx.send(tx).is_err() {
                    return Err(DbError::Rollback);
                }

                match signal_rx.await {
                    Ok(Signal::Commit) => Ok(()),
                    Ok(Signal::Rollback) => Err(DbError::Rollback),
                    Err(_) => {
                        tracing::warn!(
                            target: "docbridge::transaction",
                            transaction = %id,
                            "Transaction handle dropped before commit, rolling back"
                        );
                        Err(DbError::Rollback)
                    }
                }
            }
            .boxed()
        });

        let native = db.native_arc();
        let completed = tokio::spawn(async move {
            match native.run_transaction(options, body).await {
                Err(err) if err.is_rollback() => Ok(()),
                outcome => outcome,
            }
        });

        let tx = match handle_rx.await {
            Ok(tx) => tx,
            // The store settled without ever running the body.
            Err(_) => {
                return Err(match completed.await {
                    Ok(Err(err)) => err,
                    Ok(Ok(())) => DbError::Transaction(
                        "native transaction ended before its body ran".into(),
                    ),
                    Err(err) => DbError::Transaction(err.to_string()),
                });
            }
        };

        tracing::debug!(
            target: "docbridge::transaction",
            transaction = %id,
            read_only = options.read_only,
            "Transaction started"
        );

        Ok(Self {
            id,
            db,
            tx,
            state: Mutex::new(BridgeState::Pending {
                signal: signal_tx,
                completed,
            }),
        })
    }

    /// Identifier of this transaction, used in log records.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` once the transaction was committed or rolled back.
    pub async fn is_finished(&self) -> bool {
        matches!(*self.state.lock().await, BridgeState::Finished)
    }

    /// Reads native keys through the transaction.
    ///
    /// The state lock is held for the whole read so a concurrent `commit` or
    /// `rollback` waits for it.
    pub(crate) async fn read_keys(
        &self,
        collection: &str,
        keys: Vec<String>,
    ) -> DbResult<Vec<NativeSnapshot>> {
        let state = self.state.lock().await;

        if matches!(*state, BridgeState::Finished) {
            return Err(DbError::TransactionFinished);
        }

        self.tx.get_all(collection, keys).await
    }

    /// Stages operations on the native transaction.
    ///
    /// Holds the state lock until every operation is staged, so the native
    /// commit never runs ahead of a write that was already accepted.
    pub(crate) async fn stage_all(&self, operations: Vec<BatchOperation>) -> DbResult<()> {
        let state = self.state.lock().await;

        if matches!(*state, BridgeState::Finished) {
            return Err(DbError::TransactionFinished);
        }

        for operation in operations {
            self.tx.stage(operation).await?;
        }

        Ok(())
    }

    async fn finish(&self, signal: Signal) -> DbResult<()> {
        let state = mem::replace(&mut *self.state.lock().await, BridgeState::Finished);

        let BridgeState::Pending { signal: pending, completed } = state else {
            return Err(DbError::TransactionFinished);
        };

        // A closed receiver means the body already returned; `completed` has the outcome.
        let _ = pending.send(signal);

        let outcome = completed
            .await
            .map_err(|err| DbError::Transaction(err.to_string()))?;

        match &outcome {
            Ok(()) => tracing::debug!(
                target: "docbridge::transaction",
                transaction = %self.id,
                ?signal,
                "Transaction finished"
            ),
            Err(err) => tracing::warn!(
                target: "docbridge::transaction",
                transaction = %self.id,
                ?signal,
                error = %err,
                "Transaction failed"
            ),
        }

        outcome
    }
}

#[async_trait]
impl<N: NativeStore> DbTransaction for DocStoreTransaction<N> {
    async fn commit(&self) -> DbResult<()> {
        self.finish(Signal::Commit).await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.finish(Signal::Rollback).await
    }

    async fn get_by_ids(&self, table: &str, ids: &[String]) -> DbResult<Vec<Row>> {
        self.db
            .get_by_ids(table, ids, DbOptions::in_transaction(self))
            .await
    }

    async fn save_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        save_method: Option<SaveMethod>,
    ) -> DbResult<()> {
        self.db
            .save_batch(
                table,
                rows,
                SaveOptions {
                    save_method,
                    tx: Some(self),
                },
            )
            .await
    }

    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> DbResult<usize> {
        self.db
            .delete_by_ids(table, ids, DbOptions::in_transaction(self))
            .await
    }
}
