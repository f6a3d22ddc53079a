//! Deciding how a server's configuration is saved back as a preset.

use std::collections::BTreeSet;

use super::state::{McpPreset, McpServer};

/// How to save a server as a preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetSavePlan {
    /// The origin preset already holds exactly this configuration.
    UpToDate { name: String },
    /// Tools or URL changed but the name did not: overwrite the origin preset.
    Overwrite { name: String },
    /// No usable origin preset, or the server was renamed: ask for a name.
    Prompt { suggested: String },
}

/// Compare a server against the preset it came from.
///
/// A preset without an explicit tool list stands for every reported tool.
pub fn preset_save_plan(server: &McpServer, presets: &[McpPreset]) -> PresetSavePlan {
    let origin = server
        .preset
        .as_deref()
        .and_then(|name| presets.iter().find(|p| p.name == name));

    let Some(origin) = origin else {
        return PresetSavePlan::Prompt {
            suggested: server.name.clone(),
        };
    };
    if origin.name != server.name {
        return PresetSavePlan::Prompt {
            suggested: server.name.clone(),
        };
    }

    let preset_tools: BTreeSet<String> = match &origin.tools {
        Some(tools) => tools.iter().cloned().collect(),
        None => server.tools.iter().map(|t| t.name.clone()).collect(),
    };
    if origin.url == server.url && preset_tools == server.selected_tools {
        PresetSavePlan::UpToDate {
            name: origin.name.clone(),
        }
    } else {
        PresetSavePlan::Overwrite {
            name: origin.name.clone(),
        }
    }
}

/// The preset a save would write.
pub fn preset_from_server(server: &McpServer, name: &str, description: Option<String>) -> McpPreset {
    McpPreset {
        name: name.to_string(),
        url: server.url.clone(),
        tools: Some(server.selected_tools.iter().cloned().collect()),
        description,
    }
}
