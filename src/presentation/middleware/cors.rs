//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsSettings;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Create CORS layer from settings
///
/// An empty or fully unparsable origin list, or a literal `*`, allows any
/// origin. Bearer tokens travel in headers, so credentials stay disabled.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(PREFLIGHT_MAX_AGE);

    match parse_origins(&settings.allowed_origins) {
        Some(origins) => base.allow_origin(AllowOrigin::list(origins)),
        None => base.allow_origin(Any),
    }
}

/// `None` means any origin.
fn parse_origins(configured: &[String]) -> Option<Vec<HeaderValue>> {
    if configured.iter().any(|o| o.trim() == "*") {
        return None;
    }

    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|o| match o.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    (!origins.is_empty()).then_some(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn owned(origins: &[&str]) -> Vec<String> {
        origins.iter().map(|o| o.to_string()).collect()
    }

    #[test_case(&[] ; "empty list")]
    #[test_case(&["*"] ; "wildcard")]
    #[test_case(&["https://lms.example.edu", "*"] ; "wildcard among others")]
    fn test_any_origin(origins: &[&str]) {
        assert!(parse_origins(&owned(origins)).is_none());
    }

    #[test]
    fn test_explicit_origins_are_kept() {
        let parsed = parse_origins(&owned(&["https://lms.example.edu", " http://localhost:3000 "]))
            .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], "http://localhost:3000");
    }

    #[test]
    fn test_invalid_origins_are_dropped() {
        let parsed = parse_origins(&owned(&["https://ok.example.edu", "bad\norigin"])).unwrap();
        assert_eq!(parsed, vec![HeaderValue::from_static("https://ok.example.edu")]);
    }
}
