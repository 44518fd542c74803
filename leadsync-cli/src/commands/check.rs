//! `leadsync check`: validate configuration without touching either service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use leadsync_core::SyncConfig;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Config file (defaults to ./leadsync.yaml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = SyncConfig::load(self.config.as_deref()).context("invalid configuration")?;
        println!("{} configuration OK", "✓".green());
        print!(
            "{}",
            serde_yaml::to_string(&config).context("failed to render configuration")?
        );
        Ok(())
    }
}
