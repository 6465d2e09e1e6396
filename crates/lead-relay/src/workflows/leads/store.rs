use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::Lead;

/// Header row of the lead spreadsheet. Order matches [`LeadRow`]'s fields.
pub const LEAD_HEADERS: [&str; 13] = [
    "Name",
    "Email",
    "Phone",
    "Country",
    "Age",
    "Arabic",
    "Trading Interest",
    "userIp",
    "Affiliate Token",
    "Status",
    "Account ID",
    "Error",
    "Submitted At",
];

/// How the relay disposed of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Stored without a partner configured.
    Saved,
    Accepted,
    Rejected,
    /// The partner call itself failed.
    Failed,
}

impl LeadStatus {
    pub fn label(self) -> &'static str {
        match self {
            LeadStatus::Saved => "saved",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Failed => "failed",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "saved" => Some(LeadStatus::Saved),
            "accepted" => Some(LeadStatus::Accepted),
            "rejected" => Some(LeadStatus::Rejected),
            "failed" => Some(LeadStatus::Failed),
            _ => None,
        }
    }
}

/// One spreadsheet row: the submitted fields plus the partner verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Age")]
    pub age: Option<String>,
    #[serde(rename = "Arabic")]
    pub arabic: Option<String>,
    #[serde(rename = "Trading Interest")]
    pub trading_interest: Option<String>,
    #[serde(rename = "userIp")]
    pub user_ip: String,
    #[serde(rename = "Affiliate Token")]
    pub affiliate_token: Option<String>,
    #[serde(rename = "Status")]
    pub status: LeadStatus,
    #[serde(rename = "Account ID")]
    pub account_id: Option<String>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
    #[serde(rename = "Submitted At")]
    pub submitted_at: DateTime<Utc>,
}

impl LeadRow {
    pub fn new(lead: &Lead, status: LeadStatus, submitted_at: DateTime<Utc>) -> Self {
        Self {
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            country: lead.country.clone(),
            age: lead.age.clone(),
            arabic: lead.arabic.clone(),
            trading_interest: lead.trading_interest.clone(),
            user_ip: lead.user_ip.clone(),
            affiliate_token: lead.affiliate_token.clone(),
            status,
            account_id: None,
            error: None,
            submitted_at,
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Storage abstraction so the capture service can be exercised in isolation.
pub trait LeadStore: Send + Sync {
    fn append(&self, row: LeadRow) -> Result<(), StoreError>;
    fn rows(&self) -> Result<Vec<LeadRow>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("lead spreadsheet io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lead spreadsheet is malformed: {0}")]
    Csv(#[from] csv::Error),
    #[error("lead spreadsheet header does not match the expected layout (found: {})", .found.join(", "))]
    SchemaMismatch { found: Vec<String> },
    #[error("lead store unavailable: {0}")]
    Unavailable(String),
}

/// Spreadsheet-backed store persisting leads as CSV.
///
/// Every append re-reads the whole file and rewrites it through a sibling temp file.
/// Appends are serialised within the process only.
#[derive(Debug)]
pub struct CsvLeadStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLeadStore {
    /// Opens the spreadsheet at `path`, creating it with a header row when absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            read_rows(&path)?;
        } else {
            write_rows(&path, &[])?;
            info!(path = %path.display(), "created lead spreadsheet");
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LeadStore for CsvLeadStore {
    fn append(&self, row: LeadRow) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("lead store lock poisoned".to_string()))?;

        let mut rows = if self.path.exists() {
            read_rows(&self.path)?
        } else {
            Vec::new()
        };
        rows.push(row);
        write_rows(&self.path, &rows)?;

        debug!(path = %self.path.display(), rows = rows.len(), "lead spreadsheet updated");
        Ok(())
    }

    fn rows(&self) -> Result<Vec<LeadRow>, StoreError> {
        read_rows(&self.path)
    }
}

fn read_rows(path: &Path) -> Result<Vec<LeadRow>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if !headers.iter().eq(LEAD_HEADERS.iter().copied()) {
        return Err(StoreError::SchemaMismatch {
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    reader
        .deserialize::<LeadRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

fn write_rows(path: &Path, rows: &[LeadRow]) -> Result<(), StoreError> {
    let staging = staging_path(path);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&staging)?;

    writer.write_record(LEAD_HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&staging, path)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("leads.csv"));
    name.push(".tmp");
    path.with_file_name(name)
}
