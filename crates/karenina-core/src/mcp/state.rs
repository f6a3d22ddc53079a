//! MCP server list, validation lifecycle and tool selection.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::{McpError, McpResult};
use crate::obs;

/// Validation status of one server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum McpServerStatus {
    #[default]
    Idle,
    Validating,
    Valid,
    Invalid,
}

impl McpServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

/// A tool reported by a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl McpTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Named `(url, tool subset)` template served by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpPreset {
    pub name: String,
    pub url: String,
    /// `None` means every tool the server reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One configured tool server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServer {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub status: McpServerStatus,
    /// Tools reported by the last successful validation.
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub selected_tools: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Preset this server was created from or last updated by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Select every reported tool on the next successful validation.
    #[serde(default)]
    select_all_on_validation: bool,
    #[serde(skip)]
    generation: u64,
}

impl McpServer {
    fn new(name: String, url: String) -> Self {
        Self {
            name,
            url,
            status: McpServerStatus::Idle,
            tools: Vec::new(),
            selected_tools: BTreeSet::new(),
            error: None,
            preset: None,
            select_all_on_validation: true,
            generation: 0,
        }
    }

    pub fn reports_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t.name == tool)
    }

    /// A selected tool is available when the server is valid and reports it.
    pub fn is_available(&self, tool: &str) -> bool {
        self.status == McpServerStatus::Valid && self.reports_tool(tool)
    }

    /// Selected tools that are currently unavailable.
    pub fn phantom_tools(&self) -> Vec<&str> {
        self.selected_tools
            .iter()
            .filter(|t| !self.is_available(t))
            .map(String::as_str)
            .collect()
    }

    fn invalidate_pending(&mut self, generation: u64) {
        self.generation = generation;
        if self.status == McpServerStatus::Validating {
            self.status = McpServerStatus::Idle;
        }
    }
}

/// Identifies one validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    pub server: String,
    pub url: String,
    generation: u64,
}

impl ValidationTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Backend verdict for one validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid { tools: Vec<McpTool> },
    Invalid { error: String },
}

/// What `complete_validation` did with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationApplied {
    Applied {
        status: McpServerStatus,
        available: usize,
        phantom: usize,
    },
    /// The ticket was superseded; state is unchanged.
    Stale,
}

/// A selected tool and whether the server currently provides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSelection {
    pub name: String,
    pub available: bool,
}

/// Configuration handed to verification runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpConfiguration {
    /// Server name → URL.
    pub servers: BTreeMap<String, String>,
    /// Selected tools that are currently available.
    pub tools: Vec<String>,
}

impl McpConfiguration {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// All configured servers. Mutated only through the action methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpState {
    servers: Vec<McpServer>,
    #[serde(skip)]
    next_generation: u64,
}

fn check_name(name: &str) -> McpResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(McpError::EmptyName);
    }
    Ok(name.to_string())
}

fn check_url(url: &str) -> McpResult<String> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(McpError::InvalidUrl {
            url: url.to_string(),
        })
    }
}

impl McpState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn servers(&self) -> &[McpServer] {
        &self.servers
    }

    pub fn server(&self, name: &str) -> Option<&McpServer> {
        self.servers.iter().find(|s| s.name == name)
    }

    fn server_mut(&mut self, name: &str) -> McpResult<&mut McpServer> {
        self.servers
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| McpError::UnknownServer(name.to_string()))
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub fn add_server(&mut self, name: &str, url: &str) -> McpResult<()> {
        let name = check_name(name)?;
        let url = check_url(url)?;
        if self.server(&name).is_some() {
            return Err(McpError::DuplicateServer(name));
        }
        self.servers.push(McpServer::new(name, url));
        Ok(())
    }

    pub fn remove_server(&mut self, name: &str) -> McpResult<McpServer> {
        let idx = self
            .servers
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| McpError::UnknownServer(name.to_string()))?;
        Ok(self.servers.remove(idx))
    }

    /// Rename a server. Validations in flight under the old name become stale.
    pub fn rename_server(&mut self, old: &str, new: &str) -> McpResult<()> {
        let new = check_name(new)?;
        if new == old {
            return Ok(());
        }
        if self.server(&new).is_some() {
            return Err(McpError::DuplicateServer(new));
        }
        let generation = self.bump();
        let server = self.server_mut(old)?;
        server.name = new;
        server.invalidate_pending(generation);
        Ok(())
    }

    /// Change a server's URL. Any edit forces revalidation.
    pub fn update_server_url(&mut self, name: &str, url: &str) -> McpResult<()> {
        let url = check_url(url)?;
        let generation = self.bump();
        let server = self.server_mut(name)?;
        if server.url == url {
            return Ok(());
        }
        server.url = url;
        server.status = McpServerStatus::Idle;
        server.tools.clear();
        server.error = None;
        server.generation = generation;
        Ok(())
    }

    /// Mark a server as validating and issue the ticket its response must carry.
    pub fn begin_validation(&mut self, name: &str) -> McpResult<ValidationTicket> {
        let generation = self.bump();
        let server = self.server_mut(name)?;
        server.status = McpServerStatus::Validating;
        server.error = None;
        server.generation = generation;
        obs::emit_mcp_validation_started(&server.name, generation);
        Ok(ValidationTicket {
            server: server.name.clone(),
            url: server.url.clone(),
            generation,
        })
    }

    /// Apply a validation response unless its ticket has been superseded.
    pub fn complete_validation(
        &mut self,
        ticket: &ValidationTicket,
        outcome: ValidationOutcome,
    ) -> ValidationApplied {
        let Some(server) = self
            .servers
            .iter_mut()
            .find(|s| s.name == ticket.server && s.generation == ticket.generation)
        else {
            obs::emit_mcp_validation_stale(&ticket.server, ticket.generation);
            return ValidationApplied::Stale;
        };

        match outcome {
            ValidationOutcome::Valid { tools } => {
                server.status = McpServerStatus::Valid;
                server.error = None;
                server.tools = tools;
                if server.select_all_on_validation {
                    server.select_all_on_validation = false;
                    server
                        .selected_tools
                        .extend(server.tools.iter().map(|t| t.name.clone()));
                }
            }
            ValidationOutcome::Invalid { error } => {
                server.status = McpServerStatus::Invalid;
                server.error = Some(error);
                server.tools.clear();
            }
        }

        let phantom = server.phantom_tools().len();
        let available = server.selected_tools.len() - phantom;
        let status = server.status;
        obs::emit_mcp_validation_finished(
            &server.name,
            status == McpServerStatus::Valid,
            server.tools.len(),
            phantom,
        );
        ValidationApplied::Applied {
            status,
            available,
            phantom,
        }
    }

    /// Flip one tool's selection and return whether it is now selected.
    ///
    /// Phantom tools can always be deselected; selecting requires the server
    /// to report the tool.
    pub fn toggle_tool(&mut self, server: &str, tool: &str) -> McpResult<bool> {
        let s = self.server_mut(server)?;
        s.select_all_on_validation = false;
        if s.selected_tools.remove(tool) {
            return Ok(false);
        }
        if !s.reports_tool(tool) {
            return Err(McpError::UnknownTool {
                server: server.to_string(),
                tool: tool.to_string(),
            });
        }
        s.selected_tools.insert(tool.to_string());
        Ok(true)
    }

    pub fn select_all_tools(&mut self, server: &str) -> McpResult<()> {
        let s = self.server_mut(server)?;
        s.select_all_on_validation = false;
        let reported: Vec<String> = s.tools.iter().map(|t| t.name.clone()).collect();
        s.selected_tools.extend(reported);
        Ok(())
    }

    pub fn deselect_all_tools(&mut self, server: &str) -> McpResult<()> {
        let s = self.server_mut(server)?;
        s.select_all_on_validation = false;
        s.selected_tools.clear();
        Ok(())
    }

    /// Selected tools of one server with their availability, sorted by name.
    pub fn tool_selection(&self, server: &str) -> McpResult<Vec<ToolSelection>> {
        let s = self
            .server(server)
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?;
        Ok(s.selected_tools
            .iter()
            .map(|name| ToolSelection {
                name: name.clone(),
                available: s.is_available(name),
            })
            .collect())
    }

    /// Create or update a server from a preset and return its name.
    ///
    /// An existing server is matched by name first, then by URL. The preset's
    /// tool subset replaces the selection; its tools stay phantom until the
    /// server validates.
    pub fn apply_preset(&mut self, preset: &McpPreset) -> McpResult<String> {
        let name = match self
            .server(&preset.name)
            .or_else(|| self.servers.iter().find(|s| s.url == preset.url.trim()))
        {
            Some(existing) => {
                let name = existing.name.clone();
                self.update_server_url(&name, &preset.url)?;
                name
            }
            None => {
                self.add_server(&preset.name, &preset.url)?;
                check_name(&preset.name)?
            }
        };

        let server = self.server_mut(&name)?;
        server.preset = Some(preset.name.clone());
        match &preset.tools {
            Some(tools) => {
                server.selected_tools = tools.iter().cloned().collect();
                server.select_all_on_validation = false;
            }
            None => server.select_all_on_validation = server.selected_tools.is_empty(),
        }
        Ok(name)
    }

    /// Record that `server` now matches the saved preset `preset_name`.
    pub fn mark_preset(&mut self, server: &str, preset_name: &str) -> McpResult<()> {
        let preset_name = preset_name.trim();
        if preset_name.is_empty() {
            return Err(McpError::EmptyPresetName);
        }
        self.server_mut(server)?.preset = Some(preset_name.to_string());
        Ok(())
    }

    /// Apply several presets; returns the affected server names without duplicates.
    pub fn apply_presets(&mut self, presets: &[McpPreset]) -> McpResult<Vec<String>> {
        let mut names = Vec::new();
        for preset in presets {
            let name = self.apply_preset(preset)?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Servers and available selected tools for a verification run.
    pub fn to_configuration(&self) -> McpConfiguration {
        let servers = self
            .servers
            .iter()
            .map(|s| (s.name.clone(), s.url.clone()))
            .collect();
        let tools: BTreeSet<String> = self
            .servers
            .iter()
            .flat_map(|s| s.selected_tools.iter().filter(|t| s.is_available(t)).cloned())
            .collect();
        McpConfiguration {
            servers,
            tools: tools.into_iter().collect(),
        }
    }

    /// Problems that block using this configuration. Empty means ready.
    pub fn validate_ready(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for s in &self.servers {
            match s.status {
                McpServerStatus::Valid => {}
                McpServerStatus::Invalid => issues.push(format!(
                    "server {} is invalid: {}",
                    s.name,
                    s.error.as_deref().unwrap_or("validation failed")
                )),
                McpServerStatus::Idle | McpServerStatus::Validating => {
                    issues.push(format!("server {} has not been validated", s.name))
                }
            }
            let phantom = s.phantom_tools();
            if s.status == McpServerStatus::Valid && !phantom.is_empty() {
                issues.push(format!(
                    "server {} no longer provides selected tools: {}",
                    s.name,
                    phantom.join(", ")
                ));
            }
        }
        if !self.servers.is_empty() && self.to_configuration().tools.is_empty() {
            issues.push("no tools selected".to_string());
        }
        issues
    }
}
