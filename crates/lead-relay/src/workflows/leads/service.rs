use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::domain::{LeadSubmission, LeadValidationError};
use super::partner::{PartnerError, PartnerGateway, PartnerOutcome};
use super::store::{LeadRow, LeadStatus, LeadStore, StoreError};

/// Service composing validation, the optional partner hop, and the spreadsheet store.
pub struct LeadCaptureService<S, P> {
    store: Arc<S>,
    partner: Option<Arc<P>>,
}

/// What the caller learns about a successfully captured lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub status: LeadStatus,
    pub account_id: Option<String>,
}

impl<S, P> LeadCaptureService<S, P>
where
    S: LeadStore + 'static,
    P: PartnerGateway + 'static,
{
    pub fn new(store: Arc<S>, partner: Option<Arc<P>>) -> Self {
        Self { store, partner }
    }

    pub fn forwards_to_partner(&self) -> bool {
        self.partner.is_some()
    }

    /// Validate, forward and persist one submission.
    ///
    /// Invalid submissions are never stored. Partner rejections and failures are
    /// stored with their error text before the error is returned.
    pub async fn capture(
        &self,
        submission: LeadSubmission,
        user_ip: String,
    ) -> Result<CaptureReceipt, LeadServiceError> {
        let lead = submission.validate(user_ip)?;
        info!(user_ip = %lead.user_ip, country = %lead.country, "lead received");

        let submitted_at = Utc::now();
        let Some(partner) = &self.partner else {
            self.persist(LeadRow::new(&lead, LeadStatus::Saved, submitted_at))
                .await?;
            return Ok(CaptureReceipt {
                status: LeadStatus::Saved,
                account_id: None,
            });
        };

        match partner.submit(&lead).await {
            Ok(PartnerOutcome::Accepted { account_id }) => {
                info!(user_ip = %lead.user_ip, %account_id, "partner accepted lead");
                let row = LeadRow::new(&lead, LeadStatus::Accepted, submitted_at)
                    .with_account_id(account_id.clone());
                self.persist(row).await?;
                Ok(CaptureReceipt {
                    status: LeadStatus::Accepted,
                    account_id: Some(account_id),
                })
            }
            Ok(PartnerOutcome::Rejected { reason }) => {
                warn!(user_ip = %lead.user_ip, %reason, "partner rejected lead");
                let row =
                    LeadRow::new(&lead, LeadStatus::Rejected, submitted_at).with_error(&reason);
                self.persist(row).await?;
                Err(LeadServiceError::PartnerRejected(reason))
            }
            Err(err) => {
                error!(user_ip = %lead.user_ip, error = %err, "partner call failed");
                let row = LeadRow::new(&lead, LeadStatus::Failed, submitted_at)
                    .with_error(err.to_string());
                self.persist(row).await?;
                Err(LeadServiceError::PartnerFailure(err))
            }
        }
    }

    async fn persist(&self, row: LeadRow) -> Result<(), LeadServiceError> {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.append(row))
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        if let Err(err) = &result {
            error!(error = %err, "failed to persist lead");
        }
        Ok(result?)
    }
}

/// Error raised by the capture service.
#[derive(Debug, thiserror::Error)]
pub enum LeadServiceError {
    #[error(transparent)]
    Validation(#[from] LeadValidationError),
    #[error("partner rejected lead: {0}")]
    PartnerRejected(String),
    #[error(transparent)]
    PartnerFailure(PartnerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
