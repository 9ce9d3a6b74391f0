//! Adapter configuration.

use serde::{Deserialize, Serialize};

use crate::{chunk::DEFAULT_BATCH_SIZE, translate::OperatorMap};

/// Settings of a [`DocStoreDb`](crate::db::DocStoreDb).
///
/// Deserializes from partial input; missing keys take their defaults.
///
/// ```ignore
/// let config: DocStoreDbConfig = serde_json::from_str(r#"{ "batch_size": 200 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocStoreDbConfig {
    /// Maximum operations per native atomic batch.
    pub batch_size: usize,
    /// Strip explicit `null` values before writing, not just `undefined` ones.
    pub strip_null_values: bool,
    /// Abstract-to-native operator overrides.
    pub operators: OperatorMap,
}

impl Default for DocStoreDbConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            strip_null_values: false,
            operators: OperatorMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_input_keeps_defaults() {
        let config: DocStoreDbConfig = serde_json::from_str(r#"{ "batch_size": 200 }"#).unwrap();

        assert_eq!(config.batch_size, 200);
        assert!(!config.strip_null_values);
        assert!(config.operators.is_empty());
        assert_eq!(serde_json::from_str::<DocStoreDbConfig>("{}").unwrap(), DocStoreDbConfig::default());
    }
}
