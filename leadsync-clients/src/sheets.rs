//! Google Sheet as a [`LeadStore`], via the Sheets v4 values API.
//!
//! Row 1 is a header. Columns are `id, name, email, status, source,
//! task_ref`; short rows are padded. Updates never trust a row number alone:
//! the row is re-read, checked against the lead id, and the patch is merged
//! into its current contents before the write.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use leadsync_core::config::{Secret, SheetsConfig};
use leadsync_core::{ErrorClass, LeadLocator, LeadPatch, LeadRecord, LeadStore};

use crate::error::ClientError;

pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Number of lead columns, `A` through `F`.
pub const COLUMNS: usize = 6;

const SERVICE: &str = "sheets";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

pub struct SheetsLeadStore {
    agent: ureq::Agent,
    base_url: String,
    sheet_id: String,
    range: String,
    sheet_name: String,
    access_token: Secret,
}

impl std::fmt::Debug for SheetsLeadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsLeadStore")
            .field("sheet_id", &self.sheet_id)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

impl SheetsLeadStore {
    pub fn new(config: &SheetsConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            base_url: SHEETS_API.to_string(),
            sheet_id: config.sheet_id.clone(),
            range: config.range.clone(),
            sheet_name: config.sheet_name().to_string(),
            access_token: config.access_token.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{suffix}",
            self.base_url,
            self.sheet_id,
            encode_range(range)
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent.request(method, url).set(
            "Authorization",
            &format!("Bearer {}", self.access_token.expose()),
        )
    }

    fn read_rows(&self) -> Result<Vec<LeadRecord>, ClientError> {
        let body: ValueRange = self
            .request("GET", &self.values_url(&self.range, ""))
            .call()
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?
            .into_json()
            .map_err(|e| ClientError::decode(SERVICE, e))?;
        Ok(parse_rows(&body.values))
    }

    fn row_range(&self, row: usize) -> String {
        format!("{}!A{row}:F{row}", self.sheet_name)
    }
}

/// Percent-encode an A1 range for use as a URL path segment.
fn encode_range(range: &str) -> String {
    let mut out = String::with_capacity(range.len());
    for byte in range.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'!' | b':' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turn raw sheet values (header included) into records with 1-based row
/// numbers.
fn parse_rows(values: &[Vec<Value>]) -> Vec<LeadRecord> {
    values
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, row)| {
            let mut cells: Vec<String> = row.iter().take(COLUMNS).map(cell_text).collect();
            cells.resize(COLUMNS, String::new());
            let mut cells = cells.into_iter();
            let mut next = || cells.next().unwrap_or_default();
            LeadRecord {
                id: next(),
                name: next(),
                email: next(),
                status: next(),
                source: next(),
                external_ref: next(),
                row_position: i + 1,
            }
        })
        .collect()
}

fn record_to_row(record: &LeadRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.name.clone(),
        record.email.clone(),
        record.status.clone(),
        record.source.clone(),
        record.external_ref.clone(),
    ]
}

/// Row number out of an A1 range such as `Leads!A7:F7`.
fn parse_row_number(range: &str) -> Option<usize> {
    let cells = range.rsplit('!').next()?;
    let first = cells.split(':').next()?;
    let digits: String = first.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    digits.parse().ok()
}

/// Pick the row that holds `locator.id`: the hinted row if it still does,
/// otherwise the first row with that id.
fn locate<'a>(rows: &'a [LeadRecord], locator: &LeadLocator) -> Option<&'a LeadRecord> {
    let wanted = locator.id.0.as_str();
    rows.iter()
        .find(|r| r.row_position == locator.row_hint && r.id.trim() == wanted)
        .or_else(|| rows.iter().find(|r| r.id.trim() == wanted))
}

impl LeadStore for SheetsLeadStore {
    type Error = ClientError;

    fn fetch_all(&self) -> Result<Vec<LeadRecord>, ClientError> {
        self.read_rows()
    }

    fn update(&self, locator: &LeadLocator, patch: &LeadPatch) -> Result<(), ClientError> {
        let rows = self.read_rows()?;
        let current = locate(&rows, locator)
            .ok_or_else(|| ClientError::LeadNotFound(locator.id.0.clone()))?;
        if current.row_position != locator.row_hint {
            tracing::debug!(
                "sheets: lead {} moved from row {} to {}",
                locator.id,
                locator.row_hint,
                current.row_position
            );
        }

        let mut merged = current.clone();
        patch.apply_to(&mut merged);
        let range = self.row_range(merged.row_position);
        self.request("PUT", &self.values_url(&range, ""))
            .query("valueInputOption", "RAW")
            .send_json(json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [record_to_row(&merged)],
            }))
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?;
        Ok(())
    }

    fn append(&self, record: &LeadRecord) -> Result<usize, ClientError> {
        let body: AppendResponse = self
            .request("POST", &self.values_url(&self.range, ":append"))
            .query("valueInputOption", "RAW")
            .query("insertDataOption", "INSERT_ROWS")
            .send_json(json!({
                "majorDimension": "ROWS",
                "values": [record_to_row(record)],
            }))
            .map_err(|e| ClientError::from_ureq(SERVICE, e))?
            .into_json()
            .map_err(|e| ClientError::decode(SERVICE, e))?;
        parse_row_number(&body.updates.updated_range).ok_or_else(|| {
            ClientError::decode(
                SERVICE,
                format!("cannot read row from '{}'", body.updates.updated_range),
            )
        })
    }

    fn classify(&self, error: &ClientError) -> ErrorClass {
        error.classify()
    }
}
