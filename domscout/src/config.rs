use serde::{Deserialize, Serialize};

use crate::visibility::VisibilityPolicy;

pub const DEFAULT_TOOL_NAME: &str = "domscout";

/// Engine settings. Every field has a default, so a partial config file is
/// valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix of the termination sentinel, `"<tool_name>-finished"`.
    pub tool_name: String,
    pub visibility: VisibilityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            visibility: VisibilityPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn finished_sentinel(&self) -> String {
        crate::sink::finished_sentinel(&self.tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"visibility":"positive-origin"}"#)
            .expect("config should parse");
        assert_eq!(config.tool_name, DEFAULT_TOOL_NAME);
        assert_eq!(config.visibility, VisibilityPolicy::PositiveOrigin);
        assert_eq!(config.finished_sentinel(), "domscout-finished");
    }
}
