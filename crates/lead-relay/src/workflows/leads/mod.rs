//! Lead intake: validation, the optional partner hop, and the spreadsheet store.

pub mod domain;
pub mod partner;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{resolve_client_ip, Lead, LeadField, LeadSubmission, LeadValidationError};
pub use partner::{HttpPartnerClient, PartnerError, PartnerGateway, PartnerOutcome};
pub use router::{lead_router, LeadPayload, SUCCESS_MESSAGE};
pub use service::{CaptureReceipt, LeadCaptureService, LeadServiceError};
pub use store::{CsvLeadStore, LeadRow, LeadStatus, LeadStore, StoreError, LEAD_HEADERS};
