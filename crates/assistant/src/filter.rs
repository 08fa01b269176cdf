//! Inbound message filters.

use regex_lite::Regex;
use serde_json::Value;

use assistants_core::error::ValidationError;

/// Decides which inbound payloads an assistant handles.
#[derive(Debug, Clone)]
pub enum MessageFilter {
    /// Text payloads that fully match.
    Pattern(Regex),
    /// Mapping payloads containing this structure.
    Structure(Value),
}

impl MessageFilter {
    /// A string compiles to a regex; a mapping becomes a structural filter.
    pub fn compile(filter: &Value) -> Result<Self, ValidationError> {
        match filter {
            Value::String(pattern) => Regex::new(&format!("^(?:{pattern})$"))
                .map(Self::Pattern)
                .map_err(|e| ValidationError::InvalidField {
                    kind: "Stream".into(),
                    field: "filter".into(),
                    reason: e.to_string(),
                }),
            Value::Object(_) => Ok(Self::Structure(filter.clone())),
            other => Err(ValidationError::InvalidField {
                kind: "Stream".into(),
                field: "filter".into(),
                reason: format!("expected a string or mapping, got {other}"),
            }),
        }
    }

    pub fn matches(&self, payload: &Value) -> bool {
        match (self, payload) {
            (Self::Pattern(regex), Value::String(text)) => regex.is_match(text),
            (Self::Structure(pattern), Value::Object(_)) => contains(payload, pattern),
            _ => false,
        }
    }
}

/// Every key of a `pattern` mapping is present in `value` with a matching
/// value; non-mapping patterns compare by equality.
fn contains(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(value), Value::Object(pattern)) => pattern
            .iter()
            .all(|(key, expected)| value.get(key).is_some_and(|actual| contains(actual, expected))),
        _ => value == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pattern_requires_full_match() {
        let filter = MessageFilter::compile(&json!("hello.*")).unwrap();
        assert!(filter.matches(&json!("hello world")));
        assert!(!filter.matches(&json!("say hello")));
        assert!(!filter.matches(&json!({"message": "hello"})));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let filter = MessageFilter::compile(&json!("a|b")).unwrap();
        assert!(filter.matches(&json!("a")));
        assert!(!filter.matches(&json!("ab")));
    }

    #[test]
    fn structure_matches_key_subsets() {
        let filter = MessageFilter::compile(&json!({"type": "ask", "meta": {"lang": "en"}})).unwrap();
        assert!(filter.matches(&json!({"type": "ask", "meta": {"lang": "en", "v": 2}, "message": "q"})));
        assert!(!filter.matches(&json!({"type": "ask", "meta": {"lang": "fr"}})));
        assert!(!filter.matches(&json!({"type": "ask"})));
        assert!(!filter.matches(&json!("ask")));
    }

    #[test]
    fn invalid_filters_are_rejected() {
        assert!(MessageFilter::compile(&json!("(")).is_err());
        assert!(MessageFilter::compile(&json!(3)).is_err());
    }
}
