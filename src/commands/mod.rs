pub mod data;
pub mod function;
pub mod lifecycle;
pub mod schema;
pub mod state;

use crate::Context;
use crate::config::ProviderConfig;
use crate::paths;
use crate::state::ProviderState;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{ConfirmCallback, Outcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Configuration and state loaded for one command
pub struct Workspace {
    pub config: ProviderConfig,
    pub state_path: PathBuf,
    pub state: ProviderState,
}

impl Workspace {
    /// Load the configuration (required) and the state file (optional)
    pub fn load(ctx: &Context) -> Result<Self> {
        let config_path = ctx.config_path()?;
        let config = ProviderConfig::load(&config_path)?;
        Self::with_config(&config_path, config)
    }

    /// Like [`Workspace::load`], but a missing configuration file is empty
    pub fn load_optional(ctx: &Context) -> Result<Self> {
        let config_path = ctx.config_path()?;
        let config = ProviderConfig::load_optional(&config_path)?;
        Self::with_config(&config_path, config)
    }

    fn with_config(config_path: &Path, config: ProviderConfig) -> Result<Self> {
        let state_path = paths::state_file()?;
        let state = ProviderState::load(&state_path)?;
        log::debug!(
            "Workspace: config {}, state {}",
            config_path.display(),
            state_path.display()
        );
        Ok(Self {
            config,
            state_path,
            state,
        })
    }

    /// Stamp and write the state file
    pub fn save_state(&mut self) -> Result<()> {
        self.state.touch(&self.state_path)
    }
}

/// Interactive yes/no prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}

/// Print a data source or function result as JSON, then its diagnostics
pub fn emit<T: Serialize>(label: &str, outcome: &Outcome<T>) -> Result<()> {
    let json = serde_json::to_string_pretty(&outcome.value).context("Failed to render result")?;
    println!("{json}");
    for diag in outcome.diagnostics.iter() {
        ui::diagnostic(label, diag);
    }
    if outcome.diagnostics.has_errors() {
        bail!("{label} finished with errors");
    }
    Ok(())
}
