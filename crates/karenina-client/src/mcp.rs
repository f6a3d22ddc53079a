//! MCP server configuration driven against the backend.
//!
//! [`McpController`] owns the local [`McpState`] and runs validations,
//! preset loads and preset saves through an [`McpBackend`].

use async_trait::async_trait;
use futures::future::join_all;
use karenina_core::mcp::{
    preset_from_server, preset_save_plan, McpError, McpPreset, McpState, PresetSavePlan,
    UserPrompt, ValidationApplied, ValidationOutcome,
};
use tracing::{info, warn};

use crate::client::KareninaClient;
use crate::error::Result;

/// Backend operations the MCP controller depends on.
#[async_trait]
pub trait McpBackend: Send + Sync {
    async fn validate_server(&self, name: &str, url: &str) -> Result<ValidationOutcome>;
    async fn list_presets(&self) -> Result<Vec<McpPreset>>;
    async fn save_preset(&self, preset: &McpPreset) -> Result<()>;
}

#[async_trait]
impl McpBackend for KareninaClient {
    async fn validate_server(&self, name: &str, url: &str) -> Result<ValidationOutcome> {
        self.validate_mcp_server(name, url).await
    }

    async fn list_presets(&self) -> Result<Vec<McpPreset>> {
        self.list_mcp_presets().await
    }

    async fn save_preset(&self, preset: &McpPreset) -> Result<()> {
        self.save_mcp_preset(preset).await
    }
}

/// Result of saving a server as a preset.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing to save; the named preset already matches.
    UpToDate(String),
    Saved(McpPreset),
    /// The user declined to name or overwrite a preset.
    Cancelled,
}

/// Local MCP configuration plus the presets known to the backend.
pub struct McpController<B> {
    backend: B,
    state: McpState,
    presets: Vec<McpPreset>,
    presets_enabled: bool,
}

impl<B: McpBackend> McpController<B> {
    pub fn new(backend: B, presets_enabled: bool) -> Self {
        Self {
            backend,
            state: McpState::new(),
            presets: Vec::new(),
            presets_enabled,
        }
    }

    pub fn state(&self) -> &McpState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut McpState {
        &mut self.state
    }

    pub fn presets(&self) -> &[McpPreset] {
        &self.presets
    }

    /// Validate one server.
    ///
    /// A transport failure marks the server invalid instead of failing the call.
    pub async fn validate(&mut self, name: &str) -> Result<ValidationApplied> {
        let ticket = self.state.begin_validation(name)?;
        let outcome = run_validation(&self.backend, &ticket.server, &ticket.url).await;
        Ok(self.state.complete_validation(&ticket, outcome))
    }

    /// Validate every configured server concurrently.
    pub async fn validate_all(&mut self) -> Result<Vec<(String, ValidationApplied)>> {
        let names: Vec<String> = self.state.servers().iter().map(|s| s.name.clone()).collect();
        let mut tickets = Vec::with_capacity(names.len());
        for name in &names {
            tickets.push(self.state.begin_validation(name)?);
        }

        let backend = &self.backend;
        let outcomes = join_all(
            tickets
                .iter()
                .map(|t| run_validation(backend, &t.server, &t.url)),
        )
        .await;

        Ok(tickets
            .iter()
            .zip(outcomes)
            .map(|(ticket, outcome)| {
                let applied = self.state.complete_validation(ticket, outcome);
                (ticket.server.clone(), applied)
            })
            .collect())
    }

    /// Fetch presets from the backend. Disabled presets load as an empty list.
    pub async fn load_presets(&mut self) -> Result<&[McpPreset]> {
        if self.presets_enabled {
            self.presets = self.backend.list_presets().await?;
            info!(count = self.presets.len(), "loaded MCP presets");
        } else {
            self.presets.clear();
        }
        Ok(&self.presets)
    }

    /// Apply a loaded preset and validate the resulting server.
    pub async fn apply_preset(&mut self, preset_name: &str) -> Result<ValidationApplied> {
        let preset = self
            .presets
            .iter()
            .find(|p| p.name == preset_name)
            .cloned()
            .ok_or_else(|| McpError::UnknownPreset(preset_name.to_string()))?;
        let server = self.state.apply_preset(&preset)?;
        self.validate(&server).await
    }

    /// Save `server` as a preset, asking the user for a name when needed.
    pub async fn save_preset(
        &mut self,
        server: &str,
        prompt: &dyn UserPrompt,
    ) -> Result<SaveOutcome> {
        let current = self
            .state
            .server(server)
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?;

        let name = match preset_save_plan(current, &self.presets) {
            PresetSavePlan::UpToDate { name } => return Ok(SaveOutcome::UpToDate(name)),
            PresetSavePlan::Overwrite { name } => name,
            PresetSavePlan::Prompt { suggested } => {
                let Some(entered) = prompt.prompt("Preset name", Some(&suggested)) else {
                    return Ok(SaveOutcome::Cancelled);
                };
                let entered = entered.trim().to_string();
                if entered.is_empty() {
                    return Err(McpError::EmptyPresetName.into());
                }
                let exists = self.presets.iter().any(|p| p.name == entered);
                if exists && !prompt.confirm(&format!("Preset {entered} exists. Overwrite it?")) {
                    return Ok(SaveOutcome::Cancelled);
                }
                entered
            }
        };

        let description = self
            .presets
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.description.clone());
        let preset = preset_from_server(current, &name, description);
        self.backend.save_preset(&preset).await?;

        match self.presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = preset.clone(),
            None => self.presets.push(preset.clone()),
        }
        self.state.mark_preset(server, &name)?;
        Ok(SaveOutcome::Saved(preset))
    }
}

async fn run_validation<B: McpBackend + ?Sized>(
    backend: &B,
    name: &str,
    url: &str,
) -> ValidationOutcome {
    match backend.validate_server(name, url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(server = %name, error = %e, "MCP validation request failed");
            ValidationOutcome::Invalid {
                error: e.to_string(),
            }
        }
    }
}
