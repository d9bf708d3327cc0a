use serde::{Deserialize, Serialize};

/// Represents the `tether.json` project configuration file.
///
/// Every field is optional; command-line arguments take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
    /// Template file rendered when no template argument is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// JSON file holding the initial model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// JSON file holding the mutation script applied after binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<String>,
    /// Log filter used when `RUST_LOG` is unset, e.g. `"debug"` or `"tether=trace"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    /// Builtin filters to enable. All of them when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,
}

impl TetherConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether the builtin filter `name` should be registered.
    pub fn filter_enabled(&self, name: &str) -> bool {
        match &self.filters {
            Some(enabled) => enabled.iter().any(|f| f == name),
            None => true,
        }
    }
}
