use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderMap;
use serde::{Deserialize, Deserializer};

/// Lead columns in spreadsheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Name,
    Email,
    Phone,
    Country,
    Age,
    Arabic,
    TradingInterest,
    AffiliateToken,
}

impl LeadField {
    /// Fields a submission must carry before it is forwarded or stored.
    pub const REQUIRED: [LeadField; 4] = [
        LeadField::Name,
        LeadField::Email,
        LeadField::Phone,
        LeadField::Country,
    ];

    /// Key used by the inbound JSON and form payloads.
    pub fn key(self) -> &'static str {
        match self {
            LeadField::Name => "name",
            LeadField::Email => "email",
            LeadField::Phone => "phone",
            LeadField::Country => "country",
            LeadField::Age => "age",
            LeadField::Arabic => "arabic",
            LeadField::TradingInterest => "tradingInterest",
            LeadField::AffiliateToken => "affiliateToken",
        }
    }

    /// Column header in the spreadsheet store.
    pub fn label(self) -> &'static str {
        match self {
            LeadField::Name => "Name",
            LeadField::Email => "Email",
            LeadField::Phone => "Phone",
            LeadField::Country => "Country",
            LeadField::Age => "Age",
            LeadField::Arabic => "Arabic",
            LeadField::TradingInterest => "Trading Interest",
            LeadField::AffiliateToken => "Affiliate Token",
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw lead form as posted by a landing page.
///
/// Every field is optional on the wire so that absent values surface through
/// [`LeadSubmission::validate`] rather than as decoder errors. Scalars may be sent
/// as strings, numbers or booleans; they are normalised to trimmed text and blank
/// values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    #[serde(default, deserialize_with = "loose_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub arabic: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub trading_interest: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub affiliate_token: Option<String>,
}

impl LeadSubmission {
    /// Checks required fields and binds the submission to the caller's address.
    pub fn validate(self, user_ip: impl Into<String>) -> Result<Lead, LeadValidationError> {
        let LeadSubmission {
            name,
            email,
            phone,
            country,
            age,
            arabic,
            trading_interest,
            affiliate_token,
        } = self;

        match (name, email, phone, country) {
            (Some(name), Some(email), Some(phone), Some(country)) => {
                if !looks_like_email(&email) {
                    return Err(LeadValidationError::InvalidEmail(email));
                }

                Ok(Lead {
                    name,
                    email,
                    phone,
                    country,
                    age,
                    arabic,
                    trading_interest,
                    affiliate_token,
                    user_ip: user_ip.into(),
                })
            }
            (name, email, phone, country) => {
                let missing = [
                    (LeadField::Name, name.is_none()),
                    (LeadField::Email, email.is_none()),
                    (LeadField::Phone, phone.is_none()),
                    (LeadField::Country, country.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                Err(LeadValidationError::MissingFields(missing))
            }
        }
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub age: Option<String>,
    pub arabic: Option<String>,
    pub trading_interest: Option<String>,
    pub affiliate_token: Option<String>,
    pub user_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadValidationError {
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<LeadField>),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
}

impl LeadValidationError {
    pub fn missing_fields(&self) -> &[LeadField] {
        match self {
            LeadValidationError::MissingFields(fields) => fields,
            LeadValidationError::InvalidEmail(_) => &[],
        }
    }
}

fn join_fields(fields: &[LeadField]) -> String {
    fields
        .iter()
        .map(|field| field.key())
        .collect::<Vec<_>>()
        .join(", ")
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Address recorded as `userIp`: the first `X-Forwarded-For` hop when it looks like
/// an address, otherwise the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    forwarded_for(headers)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(first.to_string())
    } else {
        None
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl LooseScalar {
    fn into_text(self) -> String {
        match self {
            LooseScalar::Text(text) => text,
            LooseScalar::Integer(value) => value.to_string(),
            LooseScalar::Float(value) => value.to_string(),
            LooseScalar::Flag(value) => value.to_string(),
        }
    }
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseScalar>::deserialize(deserializer)?;
    Ok(value
        .map(LooseScalar::into_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty()))
}
