//! Console configuration: manager settings plus console-only options.

use std::fs;
use std::path::Path;

use anyhow::Context;
use brazier::manager::ManagerSettings;
use serde::Deserialize;

const DEFAULT_CONFIG: &str = r#"{
  "prompt": "> ",
  "granted_permissions": ["demo.echo", "demo.add", "demo.say", "demo.weather", "demo.sleep"],
  "settings": {
    "coordinator": "async",
    "async_parse": true,
    "boolean_liberal": true,
    "suggestion_case_insensitive": true,
    "suggestion_limit": 16
  }
}
"#;

/// The console's configuration file contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Prompt printed before each input line.
    pub prompt: String,
    /// Permissions the console sender holds.
    pub granted_permissions: Vec<String>,
    /// Settings handed to the command manager.
    pub settings: ManagerSettings,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            prompt: "> ".to_string(),
            granted_permissions: Vec::new(),
            settings: ManagerSettings::default(),
        })
    }
}

impl ConsoleConfig {
    /// Loads the configuration, writing the default file first when missing.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, DEFAULT_CONFIG)
                .with_context(|| format!("writing default config to {}", path.display()))?;
            log::info!("wrote default configuration to {}", path.display());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}
