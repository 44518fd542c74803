//! Task description layout and the `lead_id:` marker embedded in it.

use crate::types::LeadId;

/// Prefix of the machine-readable marker line.
pub const LEAD_MARKER: &str = "lead_id:";

const EMPTY_DESCRIPTION: &str = "No information available";

/// Render the description a task should carry for a lead.
///
/// The first line is always the marker when an id is present, so
/// [`parse_lead_marker`] finds it regardless of what follows.
pub fn format_description(lead_id: &str, email: &str, source: &str) -> String {
    let mut parts = Vec::with_capacity(4);
    if !lead_id.is_empty() {
        parts.push(format!("{LEAD_MARKER} {lead_id}"));
        parts.push(format!("Lead ID: {lead_id}"));
    }
    if !email.is_empty() {
        parts.push(format!("Email: {email}"));
    }
    if !source.is_empty() {
        parts.push(format!("Source: {source}"));
    }
    if parts.is_empty() {
        return EMPTY_DESCRIPTION.to_string();
    }
    parts.join("\n")
}

/// Extract the lead id from the first `lead_id:` line, if any.
pub fn parse_lead_marker(description: &str) -> Option<LeadId> {
    description
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(LEAD_MARKER))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(LeadId::from)
}
