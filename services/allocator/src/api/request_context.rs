//! Request-scoped context extracted from HTTP requests.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use mentorship_id::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id we echo back.
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .unwrap_or_else(|| RequestId::new().to_string());

        Ok(Self { request_id })
    }
}

/// Pin one request id per request: a missing or unusable `x-request-id` is
/// replaced before handlers run, and the id is echoed on the response.
pub async fn propagate_request_id(
    ctx: RequestContext,
    mut request: Request,
    next: Next,
) -> Response {
    let value = HeaderValue::from_str(&ctx.request_id).ok();
    if let Some(value) = &value {
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, ()) = request.into_parts();
        let Ok(ctx) = RequestContext::from_request_parts(&mut parts, &()).await;
        ctx
    }

    #[tokio::test]
    async fn test_echoes_caller_request_id() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "req-abc")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.request_id, "req-abc");
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let request = Request::builder().body(()).unwrap();
        let ctx = extract(request).await;
        assert!(ctx.request_id.starts_with("req_"));
    }

    #[tokio::test]
    async fn test_ignores_oversized_request_id() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "x".repeat(MAX_REQUEST_ID_LEN + 1))
            .body(())
            .unwrap();
        assert!(extract(request).await.request_id.starts_with("req_"));
    }
}
