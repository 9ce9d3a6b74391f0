//! Error types and result types for common database operations.
//!
//! This module provides the error taxonomy shared by the adapter facade, the
//! transaction bridge and native store implementations.
//! Use [`DbResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document store
/// through the common database interface.
///
/// Precondition violations are raised before any call reaches the native store,
/// so a caller can always tell them apart from store-side failures.
#[derive(Error, Debug)]
pub enum DbError {
    /// Serialization/deserialization error when converting between row formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A caller-supplied argument violates the operation's contract.
    /// Nothing was sent to the native store.
    #[error("{operation} on table {table}: {message}")]
    Precondition {
        /// The facade operation that rejected the input (e.g. `saveBatch`).
        operation: &'static str,
        /// The table the operation targeted.
        table: String,
        /// What was wrong with the input.
        message: String,
    },
    /// A document with the given ID already exists in the table.
    /// The first argument is the document ID, the second is the table name.
    #[error("Document {0} already exists in table {1}")]
    DocumentAlreadyExists(String, String),
    /// The document to update was not found in the table.
    /// The first argument is the document ID, the second is the table name.
    #[error("Document not found {0} in table {1}")]
    DocumentNotFound(String, String),
    /// The query cannot be translated into a native query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying native store.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Sentinel raised to abandon a transaction on purpose.
    ///
    /// Transaction drivers treat it as a graceful rollback and never surface it.
    #[error("rollback")]
    Rollback,
    /// The transaction was already committed or rolled back.
    #[error("Transaction already finished")]
    TransactionFinished,
    /// The transaction bridge itself failed (e.g. its driver task died).
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// Returns `true` for the caller-initiated rollback sentinel.
    pub fn is_rollback(&self) -> bool {
        matches!(self, DbError::Rollback)
    }

    pub(crate) fn precondition(
        operation: &'static str,
        table: &str,
        message: impl Into<String>,
    ) -> Self {
        DbError::Precondition {
            operation,
            table: table.to_string(),
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for common database operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<BsonError> for DbError {
    fn from(err: BsonError) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DbError {
    fn from(err: SerdeJsonError) -> Self {
        DbError::Serialization(err.to_string())
    }
}
