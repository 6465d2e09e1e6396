use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Origins allowed to post leads from a browser.
#[derive(Debug, Clone)]
pub(crate) struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub(crate) fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn allow_any(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }

    /// Value for `access-control-allow-origin`, or `None` when the origin is refused.
    fn allow_origin(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.allow_any() {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            HeaderValue::from_str(origin).ok()
        } else {
            None
        }
    }
}

pub(crate) async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = request_origin(req.headers());
    let allow_origin = policy.allow_origin(origin.as_deref());

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(value) = allow_origin {
            let headers = resp.headers_mut();
            headers.insert("access-control-allow-origin", value);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_static("GET,POST,OPTIONS"),
            );
            headers.insert(
                "access-control-allow-headers",
                HeaderValue::from_static("content-type"),
            );
            headers.insert("access-control-max-age", HeaderValue::from_static("600"));
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(value) = allow_origin {
        resp.headers_mut()
            .insert("access-control-allow-origin", value);
    }
    resp
}

fn request_origin(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("origin")?.to_str().ok()?.trim();
    if raw.is_empty() || raw.len() > 256 {
        return None;
    }
    Some(raw.to_string())
}
