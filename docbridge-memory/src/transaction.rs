//! Transactions of the in-memory store.

use async_trait::async_trait;
use mea::mutex::Mutex;
use std::mem;

use docbridge_core::{
    error::{DbError, DbResult},
    native::{BatchOperation, NativeSnapshot, NativeTransaction},
};

use crate::store::MemoryStore;

/// Handle passed to the body of [`MemoryStore`] transactions.
///
/// Reads see committed state only. Staged writes are applied atomically after
/// the body returns `Ok`.
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    read_only: bool,
    staged: Mutex<Vec<BatchOperation>>,
}

impl MemoryTransaction {
    pub(crate) fn new(store: MemoryStore, read_only: bool) -> Self {
        Self {
            store,
            read_only,
            staged: Mutex::new(vec![]),
        }
    }

    pub(crate) async fn take_staged(&self) -> Vec<BatchOperation> {
        mem::take(&mut *self.staged.lock().await)
    }
}

#[async_trait]
impl NativeTransaction for MemoryTransaction {
    async fn get_all(&self, collection: &str, keys: Vec<String>) -> DbResult<Vec<NativeSnapshot>> {
        Ok(self.store.read_keys(collection, keys).await)
    }

    async fn stage(&self, operation: BatchOperation) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::Backend(format!(
                "cannot write {} in a read-only transaction",
                operation.key(),
            )));
        }

        self.staged.lock().await.push(operation);

        Ok(())
    }
}
