//! Highlight spec construction
//!
//! The connection's highlight config carries full tag pairs
//! (`"<em></em>"`); each pair splits into a pre tag and a post tag, and
//! pairs that do not parse are skipped. Empty members of the resulting
//! spec are dropped.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

fn tag_pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(<.*?>)(</.*>)").expect("static pattern"))
}

/// Build a highlight spec from the configured tag pairs, the requested
/// fields and any extra options (options override the built members)
pub(crate) fn build_spec(config: Option<&Value>, fields: Value, options: Value) -> Value {
    let mut pre_tags = Vec::new();
    let mut post_tags = Vec::new();

    let tags = config
        .and_then(|c| c.get("tags"))
        .and_then(Value::as_array);
    if let Some(tags) = tags {
        for tag in tags {
            let Some(tag) = tag.as_str() else { continue };
            if let Some(caps) = tag_pair_pattern().captures(tag) {
                pre_tags.push(Value::String(caps[1].to_string()));
                post_tags.push(Value::String(caps[2].to_string()));
            }
        }
    }

    let mut spec = Map::new();
    spec.insert("pre_tags".to_string(), Value::Array(pre_tags));
    spec.insert("post_tags".to_string(), Value::Array(post_tags));
    spec.insert("fields".to_string(), fields);
    if let Value::Object(options) = options {
        for (key, value) in options {
            spec.insert(key, value);
        }
    }
    spec.retain(|_, value| match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    });
    Value::Object(spec)
}
