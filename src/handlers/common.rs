use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderMap},
};

use crate::errors::ServiceError;
use crate::services::checkout::RequestOrigin;

/// Maps axum's JSON extractor rejection onto the JSON error body
pub fn map_json_rejection(rejection: JsonRejection) -> ServiceError {
    ServiceError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Public origin and client address as seen through a reverse proxy
pub fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let scheme = header_str(headers, "x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, header::HOST.as_str()));

    let client_ip = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string);

    RequestOrigin {
        base_url: host.map(|h| format!("{}://{}", scheme, h)),
        client_ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn origin_honours_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("loja.example.com"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));

        let origin = request_origin(&headers);
        assert_eq!(origin.base_url.as_deref(), Some("https://loja.example.com"));
        assert_eq!(origin.client_ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn origin_defaults_to_plain_http_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert("x-real-ip", HeaderValue::from_static("127.0.0.1"));

        let origin = request_origin(&headers);
        assert_eq!(origin.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(origin.client_ip.as_deref(), Some("127.0.0.1"));

        assert_eq!(request_origin(&HeaderMap::new()).base_url, None);
    }
}
