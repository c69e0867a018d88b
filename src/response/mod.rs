//! Read-once response guarding.
//!
//! A live HTTP response owns a body stream that can be consumed exactly
//! once. Several layers (caching, logging, error handling) all want to look
//! at "the response", so [`guard`] drains the stream a single time and hands
//! back a [`SafeResponse`] whose decoded payload can be replayed to any
//! number of consumers.
//!
//! The single-read invariant is enforced by ownership: [`HttpResponse::into_body`]
//! consumes the response, so once it has passed through [`guard`] there is no
//! raw body left to read twice.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Minimal capability a response-like object must expose to be guarded.
///
/// Implemented by [`crate::client::ClientResponse`] for real network traffic
/// and by test doubles in unit tests.
#[allow(async_fn_in_trait)]
pub trait HttpResponse: Send + Sized {
    /// HTTP status code
    fn status(&self) -> u16;

    /// Response headers, lowercased names
    fn headers(&self) -> HashMap<String, String>;

    /// Drain the body. Consumes the response: the stream is gone afterwards.
    async fn into_body(self) -> Result<Bytes, FetchError>;
}

/// The decoded, replayable payload of a response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseRecord {
    /// Body declared and decoded as JSON
    Json(serde_json::Value),
    /// Anything else, decoded as UTF-8 text (lossy)
    Text(String),
}

/// A reconstructed response whose body accessors can be called repeatedly.
///
/// This is the only object that should be passed onward after [`guard`] has
/// run; the original response no longer exists.
#[derive(Debug, Clone)]
pub struct SafeResponse {
    status: u16,
    headers: HashMap<String, String>,
    record: ResponseRecord,
}

impl SafeResponse {
    /// Build a synthetic response, used when decoding fails or in tests
    pub fn synthetic(status: u16, record: ResponseRecord) -> Self {
        Self { status, headers: HashMap::new(), record }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Retained response headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The decoded payload
    pub fn record(&self) -> &ResponseRecord {
        &self.record
    }

    /// The payload as JSON. Text payloads are wrapped in a JSON string.
    pub fn json(&self) -> serde_json::Value {
        match &self.record {
            ResponseRecord::Json(value) => value.clone(),
            ResponseRecord::Text(text) => serde_json::Value::String(text.clone()),
        }
    }

    /// Deserialize the JSON payload into a typed value
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        match &self.record {
            ResponseRecord::Json(value) => {
                serde_json::from_value(value.clone()).map_err(FetchError::from)
            }
            ResponseRecord::Text(_) => Err(FetchError::MalformedResponse),
        }
    }

    /// The payload as text. JSON payloads are re-serialized.
    pub fn text(&self) -> String {
        match &self.record {
            ResponseRecord::Json(value) => value.to_string(),
            ResponseRecord::Text(text) => text.clone(),
        }
    }

    /// Convert a non-2xx status into the matching [`FetchError`]
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            return Ok(self);
        }
        match FetchError::from_status(self.status, self.text()) {
            Some(err) => Err(err),
            // 3xx/4xx other than 429 are not transport failures; callers
            // inspect the status themselves
            None => Ok(self),
        }
    }
}

/// Parse a `Retry-After` header value given in whole seconds
fn parse_retry_after(headers: &HashMap<String, String>) -> Option<std::time::Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(std::time::Duration::from_secs)
}

/// Wrap a raw response, reading its body exactly once.
///
/// A 429 fails immediately with [`FetchError::RateLimited`] without touching
/// the body, so the caller's retry layer backs off instead of parsing a body
/// that may be absent. Any other status has its body drained and decoded per
/// `Content-Type`; a malformed body degrades to a synthetic status-500
/// error payload rather than a thrown parse error.
pub async fn guard<R: HttpResponse>(response: R) -> Result<SafeResponse, FetchError> {
    let status = response.status();
    let headers = response.headers();

    if status == 429 {
        let retry_after = parse_retry_after(&headers);
        warn!(?retry_after, "upstream rate limited, body left unread");
        return Err(FetchError::RateLimited { retry_after });
    }

    let is_json = headers
        .get("content-type")
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    // The one and only body read.
    let body = response.into_body().await?;

    let record = if is_json {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => ResponseRecord::Json(value),
            Err(e) => {
                warn!(error = %e, status, "malformed JSON body, degrading to error payload");
                return Ok(SafeResponse {
                    status: 500,
                    headers,
                    record: ResponseRecord::Json(json!({"error": "Failed to process response"})),
                });
            }
        }
    } else {
        ResponseRecord::Text(String::from_utf8_lossy(&body).into_owned())
    };

    debug!(status, bytes = body.len(), "response guarded");
    Ok(SafeResponse { status, headers, record })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResponse {
        status: u16,
        content_type: Option<&'static str>,
        body: &'static [u8],
    }

    impl HttpResponse for FakeResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn headers(&self) -> HashMap<String, String> {
            let mut headers = HashMap::new();
            if let Some(ct) = self.content_type {
                headers.insert("content-type".to_string(), ct.to_string());
            }
            headers
        }

        async fn into_body(self) -> Result<Bytes, FetchError> {
            Ok(Bytes::from_static(self.body))
        }
    }

    #[tokio::test]
    async fn test_json_body_decoded_once_replayed_many() {
        let raw = FakeResponse {
            status: 200,
            content_type: Some("application/json"),
            body: br#"{"answer": 42}"#,
        };

        let safe = guard(raw).await.unwrap();
        assert!(safe.is_success());

        // The guarded result can be read repeatedly.
        assert_eq!(safe.json()["answer"], 42);
        assert_eq!(safe.json()["answer"], 42);
        assert!(safe.text().contains("42"));
    }

    #[tokio::test]
    async fn test_text_body() {
        let raw = FakeResponse {
            status: 200,
            content_type: Some("text/plain"),
            body: b"hello",
        };

        let safe = guard(raw).await.unwrap();
        assert_eq!(safe.text(), "hello");
        assert_eq!(safe.json(), serde_json::Value::String("hello".to_string()));
    }

    #[tokio::test]
    async fn test_missing_content_type_treated_as_text() {
        let raw = FakeResponse { status: 200, content_type: None, body: b"raw" };
        let safe = guard(raw).await.unwrap();
        assert_eq!(safe.record(), &ResponseRecord::Text("raw".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_json_degrades_to_error_payload() {
        let raw = FakeResponse {
            status: 200,
            content_type: Some("application/json"),
            body: b"{not json",
        };

        let safe = guard(raw).await.unwrap();
        assert_eq!(safe.status(), 500);
        assert_eq!(safe.json()["error"], "Failed to process response");
    }

    #[tokio::test]
    async fn test_rate_limit_fails_without_body_read() {
        let raw = FakeResponse {
            status: 429,
            content_type: Some("application/json"),
            body: b"ignored",
        };

        let result = guard(raw).await;
        assert!(matches!(result, Err(FetchError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_retry_after_header_parsed() {
        struct RateLimited;

        impl HttpResponse for RateLimited {
            fn status(&self) -> u16 {
                429
            }

            fn headers(&self) -> HashMap<String, String> {
                let mut headers = HashMap::new();
                headers.insert("retry-after".to_string(), "30".to_string());
                headers
            }

            async fn into_body(self) -> Result<Bytes, FetchError> {
                panic!("body must not be read on 429");
            }
        }

        match guard(RateLimited).await {
            Err(FetchError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_for_status() {
        let raw = FakeResponse {
            status: 503,
            content_type: Some("text/plain"),
            body: b"overloaded",
        };

        let safe = guard(raw).await.unwrap();
        let err = safe.error_for_status().unwrap_err();
        assert!(matches!(err, FetchError::ServerError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_typed_json_access() {
        #[derive(serde::Deserialize)]
        struct Payload {
            answer: u32,
        }

        let raw = FakeResponse {
            status: 200,
            content_type: Some("application/json; charset=utf-8"),
            body: br#"{"answer": 7}"#,
        };

        let safe = guard(raw).await.unwrap();
        let payload: Payload = safe.json_as().unwrap();
        assert_eq!(payload.answer, 7);
    }
}
