use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable snapshot of an executed request's response.
///
/// Built once per request cycle and then only read: the post-response script
/// and the validation engine both see the same data. Header names are
/// lower-cased at capture time so lookups are case-insensitive everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, or `Value::String` with the raw text when the body
    /// is not valid JSON.
    pub body: Value,
    pub elapsed_ms: u64,
    pub size_bytes: u64,
}

impl CapturedResponse {
    /// Parse a raw body into the stored representation.
    pub fn parse_body(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_falls_back_to_raw_text() {
        assert_eq!(
            CapturedResponse::parse_body("{\"ok\":true}"),
            serde_json::json!({"ok": true})
        );
        assert_eq!(
            CapturedResponse::parse_body("<html></html>"),
            Value::String("<html></html>".into())
        );
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let response = CapturedResponse {
            status_code: 200,
            status_text: "OK".into(),
            headers,
            body: Value::Null,
            elapsed_ms: 1,
            size_bytes: 0,
        };
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("X-Missing"), None);
    }
}
