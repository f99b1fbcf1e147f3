use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound request id accepted as-is
const MAX_INBOUND_LEN: usize = 128;

/// Correlation id of one request, stored in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts an id forwarded by the fronting layer if it is printable
    /// ASCII of sane length
    fn from_inbound(value: &HeaderValue) -> Option<Self> {
        let text = value.to_str().ok()?.trim();
        let acceptable = !text.is_empty()
            && text.len() <= MAX_INBOUND_LEN
            && text.chars().all(|c| c.is_ascii_graphic());
        acceptable.then(|| Self(text.to_string()))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuses the caller's `x-request-id` or generates one, exposes it to
/// handlers and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(RequestId::from_inbound)
        .unwrap_or_else(RequestId::generate);

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Span for `TraceLayer` carrying the request id
pub fn make_span_with_request_id(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_id_accepted() {
        let value = HeaderValue::from_static("edge-7f3a");
        assert_eq!(
            RequestId::from_inbound(&value),
            Some(RequestId("edge-7f3a".to_string()))
        );
    }

    #[test]
    fn test_inbound_id_rejected_when_unusable() {
        assert_eq!(RequestId::from_inbound(&HeaderValue::from_static("")), None);
        assert_eq!(RequestId::from_inbound(&HeaderValue::from_static("has space")), None);

        let long = HeaderValue::from_str(&"a".repeat(MAX_INBOUND_LEN + 1)).unwrap();
        assert_eq!(RequestId::from_inbound(&long), None);
    }

    #[test]
    fn test_generated_ids_are_uuids() {
        let id = RequestId::generate();
        assert!(Uuid::parse_str(&id.0).is_ok());
        assert_ne!(id, RequestId::generate());
    }
}
