//! `leadsync normalize`: what a raw sheet status becomes.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use leadsync_core::{StatusNormalizer, UnknownStatusPolicy};

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Raw status strings, as typed in the sheet.
    #[arg(required = true)]
    pub statuses: Vec<String>,

    /// How unrecognized statuses are treated.
    #[arg(long, default_value_t = UnknownStatusPolicy::DefaultToNew)]
    pub policy: UnknownStatusPolicy,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct NormalizedRow {
    #[tabled(rename = "input")]
    input: String,
    #[tabled(rename = "status")]
    status: String,
}

impl NormalizeArgs {
    /// Fails (exit 1) when the policy rejects any input.
    pub fn run(self) -> Result<ExitCode> {
        let normalizer = StatusNormalizer::new(self.policy);
        let mut rejected = false;
        let rows: Vec<NormalizedRow> = self
            .statuses
            .iter()
            .map(|raw| {
                let status = match normalizer.try_normalize(raw) {
                    Ok(status) => status.to_string(),
                    Err(_) => {
                        rejected = true;
                        "unrecognized".to_string()
                    }
                };
                NormalizedRow {
                    input: raw.clone(),
                    status,
                }
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to render JSON")?
            );
        } else {
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Ok(if rejected {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}
