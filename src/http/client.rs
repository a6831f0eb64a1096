use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::request::ResolvedRequest;
use super::response::CapturedResponse;

/// Send a resolved request and capture the response snapshot.
///
/// Transport failures (bad URL, connection refused, timeout) are errors;
/// any HTTP status is a success at this layer. Interpreting the status is
/// the validation engine's job.
pub async fn send(request: &ResolvedRequest) -> Result<CapturedResponse> {
    let mut url = reqwest::Url::parse(&request.url)
        .with_context(|| format!("Invalid URL `{}`", request.url))?;

    if !request.params.is_empty() {
        let mut query_pairs = url.query_pairs_mut();
        for (key, value) in &request.params {
            if !key.is_empty() {
                query_pairs.append_pair(key, value);
            }
        }
    }

    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(10));
    if let Some(ms) = request.timeout_ms {
        if ms > 0 {
            builder = builder.timeout(Duration::from_millis(ms));
        }
    }
    let client = builder.build().context("Failed to build HTTP client")?;

    let mut req_builder = client
        .request(request.method.into(), url)
        .headers(build_headers(&request.headers)?);

    if let Some(body) = &request.body {
        if request.method.allows_body() && !body.trim().is_empty() {
            req_builder = req_builder.body(body.clone());
        }
    }

    debug!(method = %request.method, url = %request.url, "sending request");

    let started = Instant::now();
    let response = req_builder
        .send()
        .await
        .map_err(|err| anyhow!("Request failed: {err}"))?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        headers.insert(
            name.as_str().to_ascii_lowercase(),
            value.to_str().unwrap_or_default().to_string(),
        );
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| anyhow!("Failed to read response body: {err}"))?;
    let raw_body = String::from_utf8_lossy(&bytes).into_owned();

    debug!(status = status.as_u16(), elapsed_ms, "response captured");

    Ok(CapturedResponse {
        status_code: status.as_u16(),
        status_text,
        headers,
        body: CapturedResponse::parse_body(&raw_body),
        elapsed_ms,
        size_bytes: bytes.len() as u64,
    })
}

fn build_headers(input: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| anyhow!("Invalid header name `{key}`: {err}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| anyhow!("Invalid header value for `{key}`: {err}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_headers_rejects_bad_names() {
        let input = HashMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(build_headers(&input).is_err());
    }

    #[test]
    fn build_headers_skips_empty_keys() {
        let input = HashMap::from([
            (String::new(), "ignored".to_string()),
            ("accept".to_string(), "application/json".to_string()),
        ]);
        let headers = build_headers(&input).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept").unwrap(), "application/json");
    }
}
