//! Abstract, backend-agnostic query descriptor.
//!
//! A [`DbQuery`] names a table and carries an ordered list of filters, an
//! ordered list of sort orders, a row limit and an optional field projection.
//! It is built by the caller and only ever read by the adapter.
//!
//! # Query Building
//!
//! ```ignore
//! use docbridge::query::{DbQuery, FilterOp};
//!
//! let query = DbQuery::create("users")
//!     .filter_eq("status", "active")
//!     .filter("age", FilterOp::Gte, 18)
//!     .order("created", true)
//!     .limit(10)
//!     .select(["name", "age"]);
//! ```
//!
//! Filters and orders are applied to the native query in the order they were
//! added, which matters for stores that restrict how inequality and equality
//! predicates combine.

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::{id::ids_from_bson, row::ID_FIELD};

/// Filter operators understood by the common database interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    /// Equal to.
    #[serde(rename = "==")]
    Eq,
    /// Not equal to.
    #[serde(rename = "!=")]
    Ne,
    /// Less than.
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal to.
    #[serde(rename = "<=")]
    Lte,
    /// Greater than.
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal to.
    #[serde(rename = ">=")]
    Gte,
    /// Field value is one of the given values.
    #[serde(rename = "in")]
    In,
    /// Field value is none of the given values.
    #[serde(rename = "not-in")]
    NotIn,
    /// Array field contains the given value.
    #[serde(rename = "array-contains")]
    ArrayContains,
    /// Array field contains any of the given values.
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

/// One `{field, operator, value}` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct DbQueryFilter {
    pub name: String,
    pub op: FilterOp,
    pub val: Bson,
}

/// One sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct DbQueryOrder {
    pub name: String,
    pub descending: bool,
}

/// An immutable query descriptor handed to the adapter.
///
/// `limit == 0` means "no limit". `selected_field_names == None` means "all
/// fields".
#[derive(Debug, Clone, PartialEq)]
pub struct DbQuery {
    pub table: String,
    pub filters: Vec<DbQueryFilter>,
    pub orders: Vec<DbQueryOrder>,
    pub limit: usize,
    pub selected_field_names: Option<Vec<String>>,
}

impl DbQuery {
    /// Creates an unfiltered, unordered, unlimited query over `table`.
    pub fn create(table: impl Into<String>) -> Self {
        DbQuery {
            table: table.into(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: 0,
            selected_field_names: None,
        }
    }

    /// Appends a filter predicate.
    pub fn filter(mut self, name: impl Into<String>, op: FilterOp, val: impl Into<Bson>) -> Self {
        self.filters.push(DbQueryFilter {
            name: name.into(),
            op,
            val: val.into(),
        });
        self
    }

    /// Appends an equality predicate.
    pub fn filter_eq(self, name: impl Into<String>, val: impl Into<Bson>) -> Self {
        self.filter(name, FilterOp::Eq, val)
    }

    /// Appends an `in` predicate over the given values.
    pub fn filter_in<V: Into<Bson>>(
        self,
        name: impl Into<String>,
        vals: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(
            name,
            FilterOp::In,
            Bson::Array(vals.into_iter().map(Into::into).collect()),
        )
    }

    /// Appends a sort order.
    pub fn order(mut self, name: impl Into<String>, descending: bool) -> Self {
        self.orders.push(DbQueryOrder {
            name: name.into(),
            descending,
        });
        self
    }

    /// Sets the maximum number of rows to return (`0` for no limit).
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts result rows to the given fields.
    ///
    /// An empty list selects no body fields at all, which is how the adapter
    /// fetches ids only.
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.selected_field_names = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the first filter targeting the row id, if any.
    pub fn id_filter(&self) -> Option<&DbQueryFilter> {
        self.filters.iter().find(|f| f.name == ID_FIELD)
    }

    /// Returns the ids named by the id filter, or `None` when there is no id filter.
    pub fn filter_ids(&self) -> Option<Vec<String>> {
        self.id_filter().map(|f| ids_from_bson(&f.val))
    }

    /// Returns `true` when a projection is set and it leaves out the row id.
    pub fn projection_excludes_id(&self) -> bool {
        self.selected_field_names
            .as_ref()
            .is_some_and(|fields| !fields.iter().any(|f| f == ID_FIELD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_insertion_order() {
        let q = DbQuery::create("t")
            .filter("b", FilterOp::Gt, 1)
            .filter_eq("a", "x")
            .order("b", false)
            .order("a", true)
            .limit(5);

        assert_eq!(q.table, "t");
        assert_eq!(
            q.filters.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"],
        );
        assert_eq!(q.orders[1], DbQueryOrder { name: "a".into(), descending: true });
        assert_eq!(q.limit, 5);
        assert!(q.selected_field_names.is_none());
    }

    #[test]
    fn id_filter_values() {
        let single = DbQuery::create("t").filter_eq("id", "x");
        assert_eq!(single.filter_ids(), Some(vec!["x".to_string()]));

        let many = DbQuery::create("t").filter_in("id", ["a", "b"]);
        assert_eq!(many.filter_ids(), Some(vec!["a".to_string(), "b".to_string()]));

        assert_eq!(DbQuery::create("t").filter_eq("k", 1).filter_ids(), None);
    }

    #[test]
    fn projection_id_detection() {
        assert!(!DbQuery::create("t").projection_excludes_id());
        assert!(DbQuery::create("t").select(["k1"]).projection_excludes_id());
        assert!(DbQuery::create("t").select(Vec::<String>::new()).projection_excludes_id());
        assert!(!DbQuery::create("t").select(["k1", "id"]).projection_excludes_id());
    }
}
