use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::leads::domain::{Lead, LeadSubmission};
use crate::workflows::leads::partner::{PartnerError, PartnerGateway, PartnerOutcome};
use crate::workflows::leads::store::{LeadRow, LeadStore, StoreError};
use crate::workflows::leads::LeadCaptureService;

pub(super) fn submission() -> LeadSubmission {
    LeadSubmission {
        name: Some("Karim Mansour".to_string()),
        email: Some("karim@example.com".to_string()),
        phone: Some("+97455501234".to_string()),
        country: Some("QA".to_string()),
        age: Some("37".to_string()),
        arabic: Some("yes".to_string()),
        trading_interest: Some("commodities".to_string()),
        affiliate_token: Some("aff-summer-25".to_string()),
    }
}

pub(super) fn missing_contact_submission() -> LeadSubmission {
    LeadSubmission {
        email: None,
        phone: None,
        ..submission()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    rows: Arc<Mutex<Vec<LeadRow>>>,
}

impl LeadStore for MemoryStore {
    fn append(&self, row: LeadRow) -> Result<(), StoreError> {
        self.rows.lock().expect("store mutex poisoned").push(row);
        Ok(())
    }

    fn rows(&self) -> Result<Vec<LeadRow>, StoreError> {
        Ok(self.rows.lock().expect("store mutex poisoned").clone())
    }
}

pub(super) struct UnavailableStore;

impl LeadStore for UnavailableStore {
    fn append(&self, _row: LeadRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn rows(&self) -> Result<Vec<LeadRow>, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

/// Canned partner answer replayed for every submission.
#[derive(Debug, Clone)]
pub(super) enum Script {
    Accept(&'static str),
    Reject(&'static str),
    Fail(u16),
}

#[derive(Clone)]
pub(super) struct ScriptedPartner {
    script: Script,
    received: Arc<Mutex<Vec<Lead>>>,
}

impl ScriptedPartner {
    pub(super) fn new(script: Script) -> Self {
        Self {
            script,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(super) fn received(&self) -> Vec<Lead> {
        self.received.lock().expect("partner mutex poisoned").clone()
    }
}

#[async_trait]
impl PartnerGateway for ScriptedPartner {
    async fn submit(&self, lead: &Lead) -> Result<PartnerOutcome, PartnerError> {
        self.received
            .lock()
            .expect("partner mutex poisoned")
            .push(lead.clone());
        match &self.script {
            Script::Accept(account_id) => Ok(PartnerOutcome::Accepted {
                account_id: account_id.to_string(),
            }),
            Script::Reject(reason) => Ok(PartnerOutcome::Rejected {
                reason: reason.to_string(),
            }),
            Script::Fail(status) => Err(PartnerError::Upstream { status: *status }),
        }
    }
}

pub(super) type TestService = LeadCaptureService<MemoryStore, ScriptedPartner>;

pub(super) fn build_service(
    script: Option<Script>,
) -> (Arc<TestService>, MemoryStore, Option<ScriptedPartner>) {
    let store = MemoryStore::default();
    let partner = script.map(ScriptedPartner::new);
    let service = LeadCaptureService::new(
        Arc::new(store.clone()),
        partner.clone().map(Arc::new),
    );
    (Arc::new(service), store, partner)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
