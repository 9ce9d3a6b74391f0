//! Translation of [`DbQuery`] into the native query builder.
//!
//! Filters are folded left to right onto an empty native query with
//! [`NativeQuery::where_field`], then orders with [`NativeQuery::order_by`], then
//! the limit, then the projection.
//!
//! Queries filtering on `id` are not translated: native stores match on field
//! values, not on document keys, so the adapter resolves them with a multi-get.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    error::{DbError, DbResult},
    native::{NativeOp, NativeQuery, SortDirection},
    query::{DbQuery, FilterOp},
    row::ID_FIELD,
};

/// Remap table from abstract to native filter operators.
///
/// Empty by default: the abstract vocabulary matches the native one
/// operator for operator, so unmapped operators pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorMap(HashMap<FilterOp, NativeOp>);

impl OperatorMap {
    /// Creates an empty (pass-through) map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the native operator used for `from`.
    pub fn with(mut self, from: FilterOp, to: NativeOp) -> Self {
        self.0.insert(from, to);
        self
    }

    /// Returns the native operator for `op`.
    pub fn resolve(&self, op: FilterOp) -> NativeOp {
        self.0.get(&op).copied().unwrap_or_else(|| op.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Translates `query` onto `empty`, an empty native query over the query's table.
///
/// A `limit` of `0` removes any cap instead of asking for zero rows. The `id`
/// field is dropped from the projection because the id lives in the document key.
///
/// # Errors
///
/// Returns [`DbError::InvalidQuery`] when the query filters on `id`.
pub fn translate_query<Q: NativeQuery>(
    query: &DbQuery,
    empty: Q,
    operators: &OperatorMap,
) -> DbResult<Q> {
    if query.id_filter().is_some() {
        return Err(DbError::InvalidQuery(format!(
            "query on {} filters by id and must be resolved by key",
            query.table,
        )));
    }

    let q = query.filters.iter().fold(empty, |q, f| {
        q.where_field(&f.name, operators.resolve(f.op), f.val.clone())
    });

    let q = query.orders.iter().fold(q, |q, o| {
        q.order_by(
            &o.name,
            if o.descending {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        )
    });

    let q = q.limit(match query.limit {
        0 => None,
        n => Some(n),
    });

    Ok(match &query.selected_field_names {
        Some(fields) => q.select(
            &fields
                .iter()
                .filter(|f| *f != ID_FIELD)
                .cloned()
                .collect::<Vec<_>>(),
        ),
        None => q,
    })
}

#[cfg(test)]
mod tests {
    use bson::Bson;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Where(String, NativeOp, Bson),
        Order(String, SortDirection),
        Limit(Option<usize>),
        Select(Vec<String>),
    }

    /// Native query that just records the builder calls made on it.
    #[derive(Debug, Clone, Default)]
    struct RecordingQuery(Vec<Call>);

    impl NativeQuery for RecordingQuery {
        fn collection_name(&self) -> &str {
            "t"
        }

        fn where_field(mut self, field: &str, op: NativeOp, value: Bson) -> Self {
            self.0.push(Call::Where(field.into(), op, value));
            self
        }

        fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
            self.0.push(Call::Order(field.into(), direction));
            self
        }

        fn limit(mut self, limit: Option<usize>) -> Self {
            self.0.push(Call::Limit(limit));
            self
        }

        fn select(mut self, fields: &[String]) -> Self {
            self.0.push(Call::Select(fields.to_vec()));
            self
        }
    }

    #[test]
    fn folds_in_order() {
        let query = DbQuery::create("t")
            .filter("k2", FilterOp::Gt, 1)
            .filter_eq("k1", "v")
            .order("k2", true)
            .order("k1", false)
            .limit(3)
            .select(["k1", "id"]);

        let q = translate_query(&query, RecordingQuery::default(), &OperatorMap::new()).unwrap();

        assert_eq!(
            q.0,
            vec![
                Call::Where("k2".into(), NativeOp::Gt, Bson::Int32(1)),
                Call::Where("k1".into(), NativeOp::Eq, Bson::String("v".into())),
                Call::Order("k2".into(), SortDirection::Desc),
                Call::Order("k1".into(), SortDirection::Asc),
                Call::Limit(Some(3)),
                Call::Select(vec!["k1".into()]),
            ],
        );
    }

    #[test]
    fn zero_limit_means_no_limit() {
        let q = translate_query(&DbQuery::create("t"), RecordingQuery::default(), &OperatorMap::new())
            .unwrap();

        assert_eq!(q.0, vec![Call::Limit(None)]);
    }

    #[test]
    fn operator_map_overrides_pass_through() {
        let operators = OperatorMap::new().with(FilterOp::In, NativeOp::ArrayContains);
        let query = DbQuery::create("t")
            .filter("tags", FilterOp::In, "a")
            .filter("k", FilterOp::Lte, 2);

        let q = translate_query(&query, RecordingQuery::default(), &operators).unwrap();

        assert_eq!(q.0[0], Call::Where("tags".into(), NativeOp::ArrayContains, "a".into()));
        assert_eq!(q.0[1], Call::Where("k".into(), NativeOp::Lte, Bson::Int32(2)));
    }

    #[test]
    fn id_filters_are_not_translated() {
        let query = DbQuery::create("t").filter_eq("id", "x");

        assert!(matches!(
            translate_query(&query, RecordingQuery::default(), &OperatorMap::new()),
            Err(DbError::InvalidQuery(_)),
        ));
    }
}
