use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency for every HTTP request
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapse dynamic path segments so metric label cardinality stays
/// bounded. Session and question ids are Mongo ObjectIds (24 hex chars).
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_object_id_like(segment) || is_numeric_id(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<&str>>()
        .join("/")
}

fn is_object_id_like(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/quiz/sessions/64f0a2b1c3d4e5f601234567/answers"),
            "/api/v1/quiz/sessions/{id}/answers"
        );
        assert_eq!(
            normalize_path("/admin/sessions/123/force-stop"),
            "/admin/sessions/{id}/force-stop"
        );
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_is_object_id_like() {
        assert!(is_object_id_like("64f0a2b1c3d4e5f601234567"));
        assert!(!is_object_id_like("not-an-id"));
        assert!(!is_object_id_like("12345"));
    }
}
