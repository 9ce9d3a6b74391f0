//! Escaping of row identifiers into native document keys.
//!
//! Native document keys are path segments, so the path separator (`/`) cannot
//! appear inside a key. Every separator is replaced with a sentinel token on
//! the way in and restored on the way out.
//!
//! An id that already contains the sentinel token does not round-trip: it is
//! decoded with separators in place of the token.

use bson::Bson;

/// Character forbidden inside native document keys.
pub const PATH_SEPARATOR: &str = "/";

/// Token substituted for [`PATH_SEPARATOR`] inside native keys.
pub const SEPARATOR_TOKEN: &str = "_SLASH_";

/// Converts a row id into a native document key.
pub fn encode_id(id: &str) -> String {
    id.replace(PATH_SEPARATOR, SEPARATOR_TOKEN)
}

/// Converts a native document key back into the row id it was encoded from.
pub fn decode_id(key: &str) -> String {
    key.replace(SEPARATOR_TOKEN, PATH_SEPARATOR)
}

/// Reads an id out of a BSON value.
///
/// Strings are taken as-is, integers (and integral doubles) are coerced to
/// their decimal form. Anything else has no id representation.
pub fn id_from_bson(value: &Bson) -> Option<String> {
    match value {
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        // Display prints integral doubles without exponent or fraction; adding
        // zero folds -0.0 into 0.0.
        Bson::Double(n) if n.fract() == 0.0 && n.is_finite() => Some(format!("{}", n + 0.0)),
        _ => None,
    }
}

/// Reads one or many ids out of an id filter value.
///
/// Both a single value and an array of values are accepted; array entries
/// without an id representation are skipped.
pub fn ids_from_bson(value: &Bson) -> Vec<String> {
    match value {
        Bson::Array(values) => values.iter().filter_map(id_from_bson).collect(),
        single => id_from_bson(single).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_round_trip() {
        for id in ["plain", "a/b", "/leading", "trailing/", "a//b", "", "ü/ñ"] {
            let key = encode_id(id);
            assert!(!key.contains(PATH_SEPARATOR), "{key} still has a separator");
            assert_eq!(decode_id(&key), id);
        }
    }

    #[test]
    fn sentinel_in_id_is_a_known_collision() {
        assert_eq!(decode_id(&encode_id("a_SLASH_b")), "a/b");
    }

    #[test]
    fn numeric_ids_are_coerced() {
        assert_eq!(id_from_bson(&Bson::Int32(42)).as_deref(), Some("42"));
        assert_eq!(id_from_bson(&Bson::Int64(-7)).as_deref(), Some("-7"));
        assert_eq!(id_from_bson(&Bson::Double(3.0)).as_deref(), Some("3"));
        assert_eq!(id_from_bson(&Bson::Double(-0.0)).as_deref(), Some("0"));
        assert_eq!(
            id_from_bson(&Bson::Double(1e20)).as_deref(),
            Some("100000000000000000000"),
        );
        assert_eq!(
            id_from_bson(&Bson::Double(1e21)).as_deref(),
            Some("1000000000000000000000"),
        );
        assert_eq!(id_from_bson(&Bson::Double(3.5)), None);
        assert_eq!(id_from_bson(&Bson::Double(f64::INFINITY)), None);
        assert_eq!(id_from_bson(&Bson::Null), None);
    }

    #[test]
    fn filter_values_accept_single_or_many() {
        assert_eq!(ids_from_bson(&Bson::String("x".into())), vec!["x"]);
        assert_eq!(
            ids_from_bson(&Bson::Array(vec!["a".into(), 1.into(), Bson::Null])),
            vec!["a", "1"],
        );
    }
}
