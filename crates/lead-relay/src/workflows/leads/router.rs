use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde_json::json;

use super::domain::{resolve_client_ip, LeadSubmission};
use super::partner::PartnerGateway;
use super::service::{LeadCaptureService, LeadServiceError};
use super::store::LeadStore;

pub const SUCCESS_MESSAGE: &str = "Lead saved successfully!";

/// Router exposing the lead submission endpoints.
pub fn lead_router<S, P>(service: Arc<LeadCaptureService<S, P>>) -> Router
where
    S: LeadStore + 'static,
    P: PartnerGateway + 'static,
{
    Router::new()
        .route("/submit", post(submit_handler::<S, P>))
        .route("/api/v1/leads", post(submit_handler::<S, P>))
        .with_state(service)
}

/// Lead body accepted as either JSON or an urlencoded form.
#[derive(Debug)]
pub struct LeadPayload(pub LeadSubmission);

#[async_trait]
impl<St> FromRequest<St> for LeadPayload
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(submission) = Json::<LeadSubmission>::from_request(req, state)
                .await
                .map_err(|rejection| bad_request(rejection.body_text()))?;
            Ok(Self(submission))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(submission) = Form::<LeadSubmission>::from_request(req, state)
                .await
                .map_err(|rejection| bad_request(rejection.body_text()))?;
            Ok(Self(submission))
        } else {
            Err(bad_request(
                "expected an application/json or application/x-www-form-urlencoded body"
                    .to_string(),
            ))
        }
    }
}

pub(crate) async fn submit_handler<S, P>(
    State(service): State<Arc<LeadCaptureService<S, P>>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    LeadPayload(submission): LeadPayload,
) -> Response
where
    S: LeadStore + 'static,
    P: PartnerGateway + 'static,
{
    let user_ip = resolve_client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    match service.capture(submission, user_ip).await {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": SUCCESS_MESSAGE,
                "status": receipt.status.label(),
                "accountId": receipt.account_id,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(LeadServiceError::Validation(error)) => {
            let missing: Vec<&str> = error
                .missing_fields()
                .iter()
                .map(|field| field.key())
                .collect();
            let payload = json!({
                "success": false,
                "error": error.to_string(),
                "missingFields": missing,
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        Err(LeadServiceError::PartnerRejected(reason)) => {
            let payload = json!({
                "success": false,
                "error": reason,
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "success": false,
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    let payload = json!({
        "success": false,
        "error": message,
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}
