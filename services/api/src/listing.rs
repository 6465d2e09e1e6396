use clap::Args;
use lead_relay::config::AppConfig;
use lead_relay::error::AppError;
use lead_relay::workflows::leads::{CsvLeadStore, LeadRow, LeadStatus, LeadStore};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct LeadsListArgs {
    /// Spreadsheet file to read (defaults to LEADS_FILE, then leads.csv)
    #[arg(long)]
    pub(crate) leads_file: Option<PathBuf>,
    /// Only show leads with this status (saved, accepted, rejected, failed)
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<LeadStatus>,
    /// Print the rows as JSON instead of a text listing
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn parse_status(raw: &str) -> Result<LeadStatus, String> {
    LeadStatus::from_label(raw).ok_or_else(|| {
        format!("unknown status '{raw}' (expected saved, accepted, rejected or failed)")
    })
}

pub(crate) fn run_leads_list(args: LeadsListArgs) -> Result<(), AppError> {
    let LeadsListArgs {
        leads_file,
        status,
        json,
    } = args;

    let leads_file = match leads_file {
        Some(path) => path,
        None => AppConfig::load()?.store.leads_file,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !leads_file.exists() {
        writeln!(out, "No lead spreadsheet at {}", leads_file.display())?;
        return Ok(());
    }

    let store = CsvLeadStore::open(&leads_file)?;
    let rows: Vec<LeadRow> = store
        .rows()?
        .into_iter()
        .filter(|row| status.map_or(true, |wanted| row.status == wanted))
        .collect();

    if json {
        serde_json::to_writer_pretty(&mut out, &rows).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        render_leads(&mut out, &leads_file, &rows)?;
    }

    Ok(())
}

pub(crate) fn render_leads<W: Write>(out: &mut W, path: &Path, rows: &[LeadRow]) -> io::Result<()> {
    writeln!(out, "Lead spreadsheet: {}", path.display())?;

    if rows.is_empty() {
        writeln!(out, "No leads recorded")?;
        return Ok(());
    }

    let count = |status: LeadStatus| rows.iter().filter(|row| row.status == status).count();
    writeln!(
        out,
        "{} lead(s): {} accepted, {} rejected, {} failed, {} saved",
        rows.len(),
        count(LeadStatus::Accepted),
        count(LeadStatus::Rejected),
        count(LeadStatus::Failed),
        count(LeadStatus::Saved),
    )?;

    for row in rows {
        let outcome = match (&row.account_id, &row.error) {
            (Some(account_id), _) => format!(" (account {account_id})"),
            (None, Some(error)) => format!(" ({error})"),
            (None, None) => String::new(),
        };
        let affiliate = row
            .affiliate_token
            .as_deref()
            .map(|token| format!(" | affiliate {token}"))
            .unwrap_or_default();

        writeln!(
            out,
            "- {} | {} <{}> | {} | {} | ip {}{} | {}{}",
            row.submitted_at.format("%Y-%m-%d %H:%M:%S"),
            row.name,
            row.email,
            row.phone,
            row.country,
            row.user_ip,
            affiliate,
            row.status.label(),
            outcome
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lead_relay::workflows::leads::LeadSubmission;

    fn row(status: LeadStatus) -> LeadRow {
        let lead = LeadSubmission {
            name: Some("Rania Aziz".to_string()),
            email: Some("rania@example.com".to_string()),
            phone: Some("+212600000001".to_string()),
            country: Some("MA".to_string()),
            affiliate_token: Some("aff-77".to_string()),
            ..LeadSubmission::default()
        }
        .validate("192.0.2.8")
        .expect("valid lead");
        let submitted_at = Utc
            .with_ymd_and_hms(2025, 5, 2, 14, 5, 0)
            .single()
            .expect("valid timestamp");
        LeadRow::new(&lead, status, submitted_at)
    }

    #[test]
    fn renders_summary_and_outcomes() {
        let rows = vec![
            row(LeadStatus::Accepted).with_account_id("ACC-5"),
            row(LeadStatus::Rejected).with_error("duplicate email"),
        ];
        let mut out = Vec::new();
        render_leads(&mut out, Path::new("leads.csv"), &rows).expect("renders");
        let text = String::from_utf8(out).expect("utf-8");

        assert!(text.contains("2 lead(s): 1 accepted, 1 rejected, 0 failed, 0 saved"));
        assert!(text.contains(
            "- 2025-05-02 14:05:00 | Rania Aziz <rania@example.com> | +212600000001 | MA | ip 192.0.2.8 | affiliate aff-77 | accepted (account ACC-5)"
        ));
        assert!(text.contains("rejected (duplicate email)"));
    }

    #[test]
    fn renders_empty_spreadsheet() {
        let mut out = Vec::new();
        render_leads(&mut out, Path::new("leads.csv"), &[]).expect("renders");
        let text = String::from_utf8(out).expect("utf-8");
        assert!(text.ends_with("No leads recorded\n"));
    }

    #[test]
    fn status_filter_parses_labels() {
        assert_eq!(parse_status("Accepted"), Ok(LeadStatus::Accepted));
        assert!(parse_status("pending").is_err());
    }
}
