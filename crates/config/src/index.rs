//! Target index naming

use serde::Deserialize;

/// `[index]` section
///
/// Records go to `name` when set, otherwise to `<prefix>-<suffix>` where the
/// suffix is the current UTC date formatted with `suffix_pattern`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Fixed index name
    pub name: Option<String>,

    /// Default: "logs"
    pub prefix: String,

    /// strftime pattern
    /// Default: "%Y.%m.%d"
    pub suffix_pattern: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: None,
            prefix: "logs".to_string(),
            suffix_pattern: "%Y.%m.%d".to_string(),
        }
    }
}
