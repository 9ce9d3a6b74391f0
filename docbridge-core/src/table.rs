//! Typed access to one table.
//!
//! [`TypedTable`] wraps any [`CommonDb`] and converts rows to and from an
//! [`ObjectWithId`] type, so callers work with their own structs instead of raw
//! BSON documents.
//!
//! # Example
//!
//! ```ignore
//! let users = TypedTable::<_, User>::new(&db);
//! users.save_batch(vec![User { id: "u1".into(), name: "Alice".into() }], None).await?;
//! let found = users.get_by_ids(&["u1".to_string()]).await?;
//! ```

use std::marker::PhantomData;

use crate::{
    common::{CommonDb, DbOptions, SaveMethod, SaveOptions},
    error::DbResult,
    query::DbQuery,
    row::{ObjectWithId, ObjectWithIdExt},
};

#[derive(Debug)]
pub struct TypedTable<'a, D: CommonDb, R: ObjectWithId> {
    db: &'a D,
    _marker: PhantomData<R>,
}

impl<'a, D: CommonDb, R: ObjectWithId> TypedTable<'a, D, R> {
    pub fn new(db: &'a D) -> Self {
        Self { db, _marker: PhantomData }
    }

    /// Returns the table name of `R`.
    pub fn name(&self) -> &'static str {
        R::table_name()
    }

    /// Returns an empty query over this table.
    pub fn query(&self) -> DbQuery {
        DbQuery::create(R::table_name())
    }

    /// Loads objects by id; missing ids are omitted.
    pub async fn get_by_ids(&self, ids: &[String]) -> DbResult<Vec<R>> {
        self.db
            .get_by_ids(R::table_name(), ids, DbOptions::default())
            .await?
            .into_iter()
            .map(R::from_row)
            .collect()
    }

    /// Runs a query over this table.
    ///
    /// Projections must keep every field `R` requires, or deserialization fails.
    pub async fn run_query(&self, query: &DbQuery) -> DbResult<Vec<R>> {
        self.db
            .run_query(query, DbOptions::default())
            .await?
            .into_iter()
            .map(R::from_row)
            .collect()
    }

    /// Writes objects with the given method (upsert when `None`).
    pub async fn save_batch(&self, objects: Vec<R>, save_method: Option<SaveMethod>) -> DbResult<()> {
        let rows = objects
            .iter()
            .map(R::to_row)
            .collect::<DbResult<Vec<_>>>()?;

        self.db
            .save_batch(
                R::table_name(),
                rows,
                SaveOptions { save_method, tx: None },
            )
            .await
    }

    pub async fn delete_by_ids(&self, ids: &[String]) -> DbResult<usize> {
        self.db
            .delete_by_ids(R::table_name(), ids, DbOptions::default())
            .await
    }
}
