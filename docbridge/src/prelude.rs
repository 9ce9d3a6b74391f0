//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```

pub use docbridge_core::{
    common::{CommonDb, DbOptions, DbSupport, DbTransaction, SaveMethod, SaveOptions},
    config::DocStoreDbConfig,
    db::{DocStoreDb, DocStoreDbBuilder},
    error::{DbError, DbResult},
    native::{NativeStore, NativeStoreBuilder, TransactionOptions},
    query::{DbQuery, DbQueryFilter, DbQueryOrder, FilterOp},
    row::{ObjectWithId, ObjectWithIdExt, Row},
    table::TypedTable,
    transaction::DocStoreTransaction,
};
