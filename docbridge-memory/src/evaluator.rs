//! Predicate evaluation and ordering for in-memory documents.
//!
//! Comparisons follow the native store's semantics: values of different types
//! never match range or equality predicates, and a document missing the filtered
//! field matches no predicate at all (not even `!=` or `not-in`).

use bson::{Bson, DateTime, Document};
use std::{cmp::Ordering, collections::HashMap};

use docbridge_core::native::NativeOp;

/// Comparable view of a BSON value.
///
/// All numeric types are widened to `f64` so `Int32(1)`, `Int64(1)` and
/// `Double(1.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Other,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
            Comparable::Other => 7,
        }
    }

    /// Total order used by `order_by`: by type first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.sort_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank())),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = document.get(segments.next()?)?;

    segments.try_fold(first, |value, segment| match value {
        Bson::Document(doc) => doc.get(segment),
        _ => None,
    })
}

/// Returns `true` when `document` satisfies `field <op> value`.
pub(crate) fn matches(document: &Document, field: &str, op: NativeOp, value: &Bson) -> bool {
    let Some(field_value) = lookup(document, field) else {
        return false;
    };

    let left = Comparable::from(field_value);
    let right = Comparable::from(value);

    match op {
        NativeOp::Eq => left == right,
        NativeOp::Ne => left != right,
        NativeOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
        NativeOp::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
        NativeOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
        NativeOp::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
        NativeOp::In => match right {
            Comparable::Array(candidates) => candidates.iter().any(|c| *c == left),
            _ => false,
        },
        NativeOp::NotIn => match right {
            Comparable::Array(candidates) => !candidates.iter().any(|c| *c == left),
            _ => false,
        },
        NativeOp::ArrayContains => match left {
            Comparable::Array(items) => items.iter().any(|item| *item == right),
            _ => false,
        },
        NativeOp::ArrayContainsAny => match (left, right) {
            (Comparable::Array(items), Comparable::Array(candidates)) => {
                items.iter().any(|item| candidates.iter().any(|c| c == item))
            }
            _ => false,
        },
    }
}
