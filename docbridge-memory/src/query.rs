//! The in-memory store's query builder.

use bson::{Bson, Document};
use std::cmp::Ordering;

use docbridge_core::native::{NativeOp, NativeQuery, NativeSnapshot, SortDirection};

use crate::evaluator::{Comparable, lookup, matches};

#[derive(Debug, Clone, PartialEq)]
struct MemoryFilter {
    field: String,
    op: NativeOp,
    value: Bson,
}

/// Immutable query over one collection of a [`MemoryStore`](crate::MemoryStore).
///
/// Like the native store it stands in for, ordering on a field excludes documents
/// that do not have that field.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    collection: String,
    filters: Vec<MemoryFilter>,
    orders: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    select: Option<Vec<String>>,
}

impl MemoryQuery {
    pub(crate) fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filters: vec![],
            orders: vec![],
            limit: None,
            select: None,
        }
    }

    /// Runs the query over the documents of its collection.
    pub(crate) fn execute<'a>(
        &self,
        documents: impl Iterator<Item = (&'a String, &'a Document)>,
    ) -> Vec<NativeSnapshot> {
        let mut found = documents
            .filter(|(_, doc)| {
                self.filters
                    .iter()
                    .all(|f| matches(doc, &f.field, f.op, &f.value))
            })
            .filter(|(_, doc)| self.orders.iter().all(|(field, _)| lookup(doc, field).is_some()))
            .collect::<Vec<_>>();

        found.sort_by(|(_, a), (_, b)| {
            self.orders
                .iter()
                .map(|(field, direction)| {
                    let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
                    let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

                    match direction {
                        SortDirection::Asc => left.sort_cmp(&right),
                        SortDirection::Desc => right.sort_cmp(&left),
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        found
            .into_iter()
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(key, doc)| NativeSnapshot {
                key: key.clone(),
                data: Some(self.project(doc)),
            })
            .collect()
    }

    fn project(&self, document: &Document) -> Document {
        match &self.select {
            Some(fields) => document
                .iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => document.clone(),
        }
    }
}

impl NativeQuery for MemoryQuery {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn where_field(mut self, field: &str, op: NativeOp, value: Bson) -> Self {
        self.filters.push(MemoryFilter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.orders.push((field.to_string(), direction));
        self
    }

    fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn select(mut self, fields: &[String]) -> Self {
        self.select = Some(fields.to_vec());
        self
    }
}
