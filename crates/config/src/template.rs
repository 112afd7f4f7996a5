//! Index template bootstrap configuration

use serde::Deserialize;

/// Which template API to use
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateApi {
    /// `_template/{name}`
    #[default]
    Legacy,
    /// `_index_template/{name}`
    Composable,
}

/// `[template]` section
///
/// ```toml
/// [template]
/// enabled = true
/// kind = "composable"
/// name = "template_logs"
/// body_file = "template.json"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateSection {
    /// Create the template on every successful connect
    pub enabled: bool,

    pub kind: TemplateApi,

    /// Template name
    /// Default: "template_" + index prefix
    pub name: Option<String>,

    /// JSON file with the full template body (absent = built-in mapping)
    pub body_file: Option<String>,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: TemplateApi::Legacy,
            name: None,
            body_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: TemplateSection = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.kind, TemplateApi::Legacy);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_composable() {
        let config: TemplateSection = toml::from_str(
            r#"
kind = "composable"
name = "audit"
body_file = "audit-template.json"
"#,
        )
        .unwrap();
        assert_eq!(config.kind, TemplateApi::Composable);
        assert_eq!(config.name.as_deref(), Some("audit"));
        assert_eq!(config.body_file.as_deref(), Some("audit-template.json"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(toml::from_str::<TemplateSection>(r#"kind = "v9""#).is_err());
    }
}
