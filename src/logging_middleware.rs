// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode.
//! Credential-bearing JSON fields are masked before anything is logged.

use axum::body::to_bytes;
use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use serde_json::Value;
use tracing::debug;

const REDACTED_FIELDS: [&str; 5] = ["password", "accessToken", "refreshToken", "code", "token"];
const REDACTED: &str = "[REDACTED]";

/// Mask every credential field, at any depth
fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Loggable form of a body; non-JSON bodies are summarized by size only
fn printable_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            redact(&mut json);
            serde_json::to_string_pretty(&json).unwrap_or_default()
        }
        Err(_) => format!("<{} bytes>", bytes.len()),
    }
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();

    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Query strings carry OAuth codes and verification tokens
    if !bytes.is_empty() {
        debug!(
            method = %parts.method,
            path = %parts.uri.path(),
            request_body = %printable_body(&bytes),
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        debug!(
            status = %parts.status,
            response_body = %printable_body(&bytes),
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_nested_credentials() {
        let mut body = json!({
            "user": {"id": "u1", "email": "a@x.com"},
            "accessToken": "aaa.bbb.ccc",
            "refreshToken": "secret-refresh",
            "items": [{"password": "hunter22"}]
        });
        redact(&mut body);

        assert_eq!(body["accessToken"], REDACTED);
        assert_eq!(body["refreshToken"], REDACTED);
        assert_eq!(body["items"][0]["password"], REDACTED);
        assert_eq!(body["user"]["id"], "u1");
    }

    #[test]
    fn test_printable_body_never_echoes_secrets() {
        let printed = printable_body(br#"{"email":"a@x.com","password":"pw12345678"}"#);
        assert!(!printed.contains("pw12345678"));
        assert!(printed.contains("a@x.com"));

        assert_eq!(printable_body(b"code=abc"), "<8 bytes>");
    }
}
