use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS layer that admits only origins matching one of `patterns`
pub fn cors_layer(patterns: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origin_allowed(o, &patterns))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Match an `Origin` header against host patterns.
///
/// `localhost:3000` matches that exact host and port. `*.example.com` matches
/// any subdomain of example.com on any port, but not example.com itself.
pub fn origin_allowed(origin: &str, patterns: &[String]) -> bool {
    let authority = origin
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(origin)
        .trim_end_matches('/');
    let hostname = authority
        .rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
        .map(|(host, _)| host)
        .unwrap_or(authority);

    patterns.iter().any(|pattern| match pattern.strip_prefix("*.") {
        Some(suffix) => hostname
            .strip_suffix(suffix)
            .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
        None => pattern.eq_ignore_ascii_case(authority),
    })
}
