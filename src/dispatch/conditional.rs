//! Conditional request handling for cached and binary responses.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

use crate::cache::CachedBody;

/// Build the final response for a rendered body, answering conditional
/// requests with `304 Not Modified` and omitting the body for `HEAD`.
pub fn respond(
    request_headers: &HeaderMap,
    is_head: bool,
    content_type: &str,
    body: CachedBody,
) -> Response {
    let etag = body.etag();
    let last_modified = format_http_date(body.modified);
    // A content type committed with the cached entry wins over the
    // handler's default.
    let content_type = body
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| content_type.to_string());
    let content_type = content_type.as_str();

    if !is_modified(request_headers, &etag, body.modified) {
        return response_builder(&etag, &last_modified, content_type)
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .unwrap_or_else(|_| fallback_error())
    }

    let builder = response_builder(&etag, &last_modified, content_type)
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, body.body.len());

    let payload = if is_head {
        Body::empty()
    } else {
        Body::from(body.body)
    };
    builder.body(payload).unwrap_or_else(|_| fallback_error())
}

fn response_builder(
    etag: &str,
    last_modified: &str,
    content_type: &str,
) -> axum::http::response::Builder {
    Response::builder()
        .header(header::ETAG, etag)
        .header(header::LAST_MODIFIED, last_modified)
        .header(header::CONTENT_TYPE, content_type)
}

/// `false` when the client's validators still hold.
fn is_modified(request_headers: &HeaderMap, etag: &str, modified: OffsetDateTime) -> bool {
    if let Some(if_none_match) = header_str(request_headers, header::IF_NONE_MATCH) {
        return !if_none_match
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == etag || candidate == "*");
    }
    if let Some(if_modified_since) = header_str(request_headers, header::IF_MODIFIED_SINCE)
        && let Ok(since) = OffsetDateTime::parse(if_modified_since, &Rfc2822)
    {
        // HTTP dates have second precision.
        return modified.unix_timestamp() > since.unix_timestamp();
    }
    true
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn format_http_date(date: OffsetDateTime) -> String {
    date.to_offset(time::UtcOffset::UTC)
        .format(&Rfc2822)
        .unwrap_or_default()
}

fn fallback_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::empty())
        .expect("static error response")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use time::macros::datetime;

    use super::*;

    fn cached_body() -> CachedBody {
        CachedBody {
            headers: Vec::new(),
            body: Bytes::from_static(b"<html/>"),
            modified: datetime!(2026-01-07 10:00:00 UTC),
        }
    }

    #[test]
    fn plain_get_receives_the_body_and_validators() {
        let response = respond(&HeaderMap::new(), false, "text/html", cached_body());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::ETAG));
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    #[test]
    fn head_requests_carry_headers_but_no_body() {
        let response = respond(&HeaderMap::new(), true, "text/html", cached_body());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
            Some("7")
        );
    }

    #[test]
    fn matching_etag_yields_not_modified() {
        let body = cached_body();
        let etag = body.etag();
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, etag.parse().expect("etag header"));
        let response = respond(&headers, false, "text/html", body);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[test]
    fn fresh_if_modified_since_yields_not_modified() {
        let body = cached_body();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_MODIFIED_SINCE,
            "Wed, 07 Jan 2026 10:00:00 +0000".parse().expect("header"),
        );
        let response = respond(&headers, false, "text/html", body);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }
}
