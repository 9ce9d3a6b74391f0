//! Rows and their mapping to native documents.
//!
//! A [`Row`] is a BSON document with a required `id` field. Native stores keep the
//! id out-of-band as the document key, so the [`RowCodec`] moves it between the
//! row and the key in both directions.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{DbError, DbResult},
    id::{decode_id, encode_id, id_from_bson},
    native::NativeSnapshot,
};

/// Name of the synthetic id field every row carries.
pub const ID_FIELD: &str = "id";

/// One logical record: field name to value, including `id`.
pub type Row = Document;

/// Maps rows to native `(key, body)` pairs and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCodec {
    strip_null_values: bool,
}

impl RowCodec {
    /// Creates a codec. `Undefined` values are always stripped before writing;
    /// `strip_null_values` additionally strips explicit `Null`s.
    pub fn new(strip_null_values: bool) -> Self {
        Self { strip_null_values }
    }

    /// Reads the id of a row, or `None` when it is absent, empty or not id-like.
    pub fn row_id(row: &Row) -> Option<String> {
        row.get(ID_FIELD)
            .and_then(id_from_bson)
            .filter(|id| !id.is_empty())
    }

    /// Splits a row into its escaped native key and the body to store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Precondition`] when the row has no usable id. Ids are
    /// never generated.
    pub fn encode(
        &self,
        operation: &'static str,
        table: &str,
        row: Row,
    ) -> DbResult<(String, Document)> {
        let id = Self::row_id(&row).ok_or_else(|| {
            DbError::precondition(
                operation,
                table,
                "id auto-generation is not supported, but a row without id was provided",
            )
        })?;

        let body = row
            .into_iter()
            .filter(|(k, v)| k != ID_FIELD && !self.strips(v))
            .collect::<Document>();

        Ok((encode_id(&id), body))
    }

    /// Rebuilds a row from a native snapshot, or `None` when the document does not exist.
    ///
    /// The id always comes from the native key, even if the body has an `id` field.
    pub fn decode(&self, snapshot: NativeSnapshot) -> Option<Row> {
        let data = snapshot.data?;
        let mut row = Row::new();
        row.insert(ID_FIELD, decode_id(&snapshot.key));

        for (k, v) in data {
            if k != ID_FIELD {
                row.insert(k, v);
            }
        }

        Some(row)
    }

    fn strips(&self, value: &Bson) -> bool {
        match value {
            Bson::Undefined => true,
            Bson::Null => self.strip_null_values,
            _ => false,
        }
    }
}

/// Trait for typed rows stored through the common database interface.
///
/// # Example
///
/// ```ignore
/// use docbridge::row::ObjectWithId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: String,
///     pub name: String,
/// }
///
/// impl ObjectWithId for User {
///     fn id(&self) -> &str { &self.id }
///     fn table_name() -> &'static str { "users" }
/// }
/// ```
pub trait ObjectWithId: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the row id.
    fn id(&self) -> &str;

    /// Returns the table rows of this type are stored in.
    fn table_name() -> &'static str;
}

/// Conversion helpers automatically implemented for every [`ObjectWithId`].
pub trait ObjectWithIdExt: ObjectWithId {
    /// Converts this value into a row.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value is not a map.
    fn to_row(&self) -> DbResult<Row>;

    /// Creates a value from a row.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn from_row(row: Row) -> DbResult<Self>;
}

impl<R: ObjectWithId> ObjectWithIdExt for R {
    fn to_row(&self) -> DbResult<Row> {
        match serialize_to_bson(self)? {
            Bson::Document(mut row) => {
                row.insert(ID_FIELD, self.id());
                Ok(row)
            }
            other => Err(DbError::Serialization(format!(
                "expected {} to serialize to a document, got {:?}",
                R::table_name(),
                other.element_type(),
            ))),
        }
    }

    fn from_row(row: Row) -> DbResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(row))?)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;

    use super::*;

    #[test]
    fn encode_moves_id_to_key_and_strips_undefined() {
        let codec = RowCodec::default();
        let (key, body) = codec
            .encode("saveBatch", "t", doc! { "id": "a/b", "k1": "v", "k2": Bson::Undefined, "k3": Bson::Null })
            .unwrap();

        assert_eq!(key, "a_SLASH_b");
        assert_eq!(body, doc! { "k1": "v", "k3": Bson::Null });
    }

    #[test]
    fn encode_can_strip_nulls() {
        let (_, body) = RowCodec::new(true)
            .encode("saveBatch", "t", doc! { "id": "x", "k1": Bson::Null, "k2": 1 })
            .unwrap();

        assert_eq!(body, doc! { "k2": 1 });
    }

    #[test]
    fn encode_rejects_missing_or_empty_id() {
        let codec = RowCodec::default();

        for row in [doc! { "k": 1 }, doc! { "id": "" }, doc! { "id": Bson::Null }] {
            match codec.encode("saveBatch", "t", row) {
                Err(DbError::Precondition { operation, table, .. }) => {
                    assert_eq!(operation, "saveBatch");
                    assert_eq!(table, "t");
                }
                other => panic!("expected precondition error, got {other:?}"),
            }
        }
    }

    #[test]
    fn encode_coerces_numeric_ids() {
        let (key, _) = RowCodec::default()
            .encode("saveBatch", "t", doc! { "id": 12_i64 })
            .unwrap();

        assert_eq!(key, "12");
    }

    #[test]
    fn decode_injects_id_from_key() {
        let codec = RowCodec::default();

        let row = codec
            .decode(NativeSnapshot {
                key: "a_SLASH_b".into(),
                data: Some(doc! { "id": "stale", "k1": "v" }),
            })
            .unwrap();
        assert_eq!(row, doc! { "id": "a/b", "k1": "v" });

        assert!(codec
            .decode(NativeSnapshot { key: "missing".into(), data: None })
            .is_none());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        k1: String,
        k2: Option<i32>,
    }

    impl ObjectWithId for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn table_name() -> &'static str {
            "items"
        }
    }

    #[test]
    fn typed_rows_convert_both_ways() {
        let item = Item { id: "i1".into(), k1: "v".into(), k2: Some(3) };
        let row = item.to_row().unwrap();

        assert_eq!(row.get_str(ID_FIELD).unwrap(), "i1");
        assert_eq!(Item::from_row(row).unwrap(), item);
    }
}
