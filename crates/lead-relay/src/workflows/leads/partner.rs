use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::Lead;
use crate::config::PartnerConfig;

/// Verdict returned by the partner for a forwarded lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerOutcome {
    Accepted { account_id: String },
    Rejected { reason: String },
}

/// The partner could not be reached or answered with something unusable.
#[derive(Debug, thiserror::Error)]
pub enum PartnerError {
    #[error("partner request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("partner responded with status {status}")]
    Upstream { status: u16 },
    #[error("partner response could not be decoded: {0}")]
    Decode(String),
}

/// Outbound hook to the third-party lead API.
#[async_trait]
pub trait PartnerGateway: Send + Sync {
    async fn submit(&self, lead: &Lead) -> Result<PartnerOutcome, PartnerError>;
}

/// `reqwest` client posting leads as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone)]
pub struct HttpPartnerClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPartnerClient {
    pub fn new(config: &PartnerConfig) -> Result<Self, PartnerError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PartnerGateway for HttpPartnerClient {
    async fn submit(&self, lead: &Lead) -> Result<PartnerOutcome, PartnerError> {
        let form = PartnerLeadForm::new(lead, self.api_key.as_deref());
        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        classify_response(status, &body)
    }
}

#[derive(Debug, Serialize)]
struct PartnerLeadForm<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arabic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trading_interest: Option<&'a str>,
    ip: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliate_token: Option<&'a str>,
}

impl<'a> PartnerLeadForm<'a> {
    fn new(lead: &'a Lead, api_key: Option<&'a str>) -> Self {
        Self {
            api_key,
            name: &lead.name,
            email: &lead.email,
            phone: &lead.phone,
            country: &lead.country,
            age: lead.age.as_deref(),
            arabic: lead.arabic.as_deref(),
            trading_interest: lead.trading_interest.as_deref(),
            ip: &lead.user_ip,
            affiliate_token: lead.affiliate_token.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartnerReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, rename = "accountId")]
    account_id_camel: Option<Value>,
    #[serde(default, rename = "account_id")]
    account_id_snake: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl PartnerReply {
    fn account_id(&self) -> Option<String> {
        [&self.account_id_camel, &self.account_id_snake, &self.id]
            .into_iter()
            .flatten()
            .find_map(scalar_text)
    }

    fn reason(&self) -> Option<String> {
        [&self.error, &self.message]
            .into_iter()
            .flatten()
            .find_map(scalar_text)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        _ => None,
    }
}

const DEFAULT_REJECTION: &str = "rejected by partner";
const MAX_RAW_REASON_LEN: usize = 200;

/// 4xx statuses that describe the call itself (credentials, routing, throttling)
/// rather than a verdict on the lead.
fn is_call_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::METHOD_NOT_ALLOWED
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
    )
}

fn raw_reason(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    let looks_like_markup = text.starts_with('<');
    (!text.is_empty() && !looks_like_markup && text.chars().count() <= MAX_RAW_REASON_LEN)
        .then(|| text.to_string())
}

pub(crate) fn classify_response(
    status: StatusCode,
    body: &[u8],
) -> Result<PartnerOutcome, PartnerError> {
    if status.is_client_error() && !is_call_failure(status) {
        let reason = serde_json::from_slice::<PartnerReply>(body)
            .ok()
            .and_then(|reply| reply.reason())
            .or_else(|| raw_reason(body))
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
        return Ok(PartnerOutcome::Rejected { reason });
    }

    if !status.is_success() {
        return Err(PartnerError::Upstream {
            status: status.as_u16(),
        });
    }

    let reply: PartnerReply =
        serde_json::from_slice(body).map_err(|err| PartnerError::Decode(err.to_string()))?;

    if reply.success == Some(false) {
        let reason = reply
            .reason()
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
        return Ok(PartnerOutcome::Rejected { reason });
    }

    match reply.account_id() {
        Some(account_id) => Ok(PartnerOutcome::Accepted { account_id }),
        None => Err(PartnerError::Decode(
            "response carried no account id".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_camel_case_account_id() {
        let outcome = classify_response(
            StatusCode::OK,
            br#"{"success":true,"accountId":"ACC-1001"}"#,
        )
        .expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Accepted {
                account_id: "ACC-1001".to_string()
            }
        );
    }

    #[test]
    fn accepts_numeric_id_without_success_flag() {
        let outcome =
            classify_response(StatusCode::CREATED, br#"{"id":55120}"#).expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Accepted {
                account_id: "55120".to_string()
            }
        );
    }

    #[test]
    fn success_false_is_a_rejection() {
        let outcome = classify_response(
            StatusCode::OK,
            br#"{"success":false,"error":"duplicate email"}"#,
        )
        .expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: "duplicate email".to_string()
            }
        );
    }

    #[test]
    fn client_errors_are_rejections_with_best_effort_reason() {
        let outcome = classify_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"message":"country not supported"}"#,
        )
        .expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: "country not supported".to_string()
            }
        );

        let outcome =
            classify_response(StatusCode::BAD_REQUEST, b"").expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: DEFAULT_REJECTION.to_string()
            }
        );
    }

    #[test]
    fn raw_client_error_bodies_are_kept_only_when_short_plain_text() {
        let outcome =
            classify_response(StatusCode::CONFLICT, b"lead already registered").expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: "lead already registered".to_string()
            }
        );

        let outcome = classify_response(
            StatusCode::BAD_REQUEST,
            b"<!DOCTYPE html><html><body>Bad Request</body></html>",
        )
        .expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: DEFAULT_REJECTION.to_string()
            }
        );

        let long_text = "x".repeat(MAX_RAW_REASON_LEN + 1);
        let outcome =
            classify_response(StatusCode::BAD_REQUEST, long_text.as_bytes()).expect("classified");
        assert_eq!(
            outcome,
            PartnerOutcome::Rejected {
                reason: DEFAULT_REJECTION.to_string()
            }
        );
    }

    #[test]
    fn auth_routing_and_throttling_statuses_are_failures() {
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, br#"{"error":"invalid api key"}"#),
            Err(PartnerError::Upstream { status: 401 })
        ));
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, b""),
            Err(PartnerError::Upstream { status: 403 })
        ));
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, b"<html>not found</html>"),
            Err(PartnerError::Upstream { status: 404 })
        ));
        assert!(matches!(
            classify_response(StatusCode::METHOD_NOT_ALLOWED, b""),
            Err(PartnerError::Upstream { status: 405 })
        ));
        assert!(matches!(
            classify_response(StatusCode::REQUEST_TIMEOUT, b""),
            Err(PartnerError::Upstream { status: 408 })
        ));
        assert!(matches!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, b"<html>slow down</html>"),
            Err(PartnerError::Upstream { status: 429 })
        ));
    }

    #[test]
    fn server_errors_and_garbage_are_failures() {
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, b"upstream down"),
            Err(PartnerError::Upstream { status: 502 })
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, b"<html>ok</html>"),
            Err(PartnerError::Decode(_))
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"success":true}"#),
            Err(PartnerError::Decode(_))
        ));
    }

    #[test]
    fn form_omits_absent_optionals() {
        let lead = Lead {
            name: "Omar Khalil".to_string(),
            email: "omar@example.com".to_string(),
            phone: "+201001234567".to_string(),
            country: "EG".to_string(),
            age: None,
            arabic: Some("yes".to_string()),
            trading_interest: None,
            affiliate_token: Some("aff 42&x".to_string()),
            user_ip: "198.51.100.3".to_string(),
        };

        let encoded = encode_form(&PartnerLeadForm::new(&lead, Some("k-1")));
        assert_eq!(
            encoded,
            "api_key=k-1&name=Omar+Khalil&email=omar%40example.com&phone=%2B201001234567&country=EG&arabic=yes&ip=198.51.100.3&affiliate_token=aff+42%26x"
        );
    }

    fn encode_form(form: &PartnerLeadForm<'_>) -> String {
        let request = reqwest::Client::new()
            .post("http://partner.invalid/leads")
            .form(form)
            .build()
            .expect("request builds");
        let body = request.body().and_then(|body| body.as_bytes()).expect("buffered body");
        String::from_utf8(body.to_vec()).expect("utf-8 body")
    }
}
