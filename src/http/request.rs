use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::environment::interpolate;
use crate::validation::ValidationRule;

use super::method::HttpMethod;

/// A saved request: transport fields plus the attached lifecycle scripts and
/// validation rules. This is the unit a collection file stores and the
/// runner executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDefinition {
    #[serde(default)]
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Script run before the request is sent; may mutate variables consumed
    /// by placeholder substitution.
    #[serde(default)]
    pub pre_request_script: Option<String>,
    /// Script run after the response is captured.
    #[serde(default)]
    pub post_response_script: Option<String>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
}

impl RequestDefinition {
    /// Display label for reports and history.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.method, self.url)
        } else {
            self.name.clone()
        }
    }

    /// Substitute `{{var}}` placeholders in every transport field.
    pub fn resolve(&self, variables: &HashMap<String, String>) -> ResolvedRequest {
        let params = self
            .params
            .iter()
            .map(|(k, v)| (interpolate(k, variables), interpolate(v, variables)))
            .collect();
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (interpolate(k, variables), interpolate(v, variables)))
            .collect();

        ResolvedRequest {
            method: self.method,
            url: interpolate(&self.url, variables),
            params,
            headers,
            body: self.body.as_ref().map(|b| interpolate(b, variables)),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// A request with all placeholders substituted, ready to send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> RequestDefinition {
        RequestDefinition {
            name: String::new(),
            method: HttpMethod::Post,
            url: "https://{{host}}/users".into(),
            params: HashMap::from([("page".to_string(), "{{page}}".to_string())]),
            headers: HashMap::from([(
                "Authorization".to_string(),
                "Bearer {{token}}".to_string(),
            )]),
            body: Some("{\"name\":\"{{name}}\"}".into()),
            timeout_ms: None,
            pre_request_script: None,
            post_response_script: None,
            rules: Vec::new(),
        }
    }

    #[test]
    fn resolve_substitutes_every_field() {
        let vars = HashMap::from([
            ("host".to_string(), "api.example.com".to_string()),
            ("page".to_string(), "2".to_string()),
            ("token".to_string(), "abc123".to_string()),
            ("name".to_string(), "dana".to_string()),
        ]);

        let resolved = definition().resolve(&vars);
        assert_eq!(resolved.url, "https://api.example.com/users");
        assert_eq!(resolved.params.get("page").unwrap(), "2");
        assert_eq!(resolved.headers.get("Authorization").unwrap(), "Bearer abc123");
        assert_eq!(resolved.body.as_deref(), Some("{\"name\":\"dana\"}"));
    }

    #[test]
    fn resolve_leaves_unknown_placeholders() {
        let resolved = definition().resolve(&HashMap::new());
        assert_eq!(resolved.url, "https://{{host}}/users");
    }

    #[test]
    fn label_falls_back_to_method_and_url() {
        let mut def = definition();
        assert_eq!(def.label(), "POST https://{{host}}/users");
        def.name = "Create user".into();
        assert_eq!(def.label(), "Create user");
    }
}
