use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Connection-level settings consumed by the query builder
///
/// The transport layer owns host lists, credentials and timeouts; this
/// struct only carries the cross-cutting options the builder and grammar
/// read through [`Connection::get_config`](crate::Connection::get_config).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Prefix applied to every index and type name before wrapping
    pub table_prefix: String,
    /// Highlight markup configuration
    pub highlight: HighlightConfig,
    /// Retry budget forwarded to the engine on conflicting updates
    pub update_retry: Option<u32>,
    /// Default query-log flag for new builders
    pub log_enabled: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            highlight: HighlightConfig::default(),
            update_retry: None,
            log_enabled: true,
        }
    }
}

/// Highlight markup configuration
///
/// Each entry is a full tag pair, e.g. `"<em></em>"`; the builder splits
/// pairs into `pre_tags` / `post_tags` when a highlight is requested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub tags: Vec<String>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            tags: vec!["<em></em>".to_string()],
        }
    }
}

impl ConnectionConfig {
    /// Set the index prefix
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set the highlight tag pairs
    pub fn with_highlight_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the update retry budget
    pub fn with_update_retry(mut self, retries: u32) -> Self {
        self.update_retry = Some(retries);
        self
    }

    /// Set the default query-log flag
    pub fn with_log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    /// Look up a setting by its wire name, as exposed to the builder
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "prefix" => Some(Value::String(self.table_prefix.clone())),
            "highlight" => Some(json!({ "tags": self.highlight.tags })),
            "update_retry" => self.update_retry.map(|n| json!(n)),
            "log_enabled" => Some(Value::Bool(self.log_enabled)),
            _ => None,
        }
    }
}
