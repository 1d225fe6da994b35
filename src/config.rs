use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Runtime settings, persisted as json in the OS config directory. Unknown
/// or missing fields fall back to their defaults so older files keep
/// loading across upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    /// Websocket endpoint of the client bridge that streams raw signals.
    pub bridge_ws: String,
    /// HTTP endpoint the event batches are posted to.
    pub collector_url: String,
    /// Bearer token identifying this player to the collector.
    pub registration_key: String,
    /// Push a confirmation line into game chat after each delivered batch.
    pub chat_notifications: bool,
    /// Seconds between batch sends.
    pub send_interval_secs: u64,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            bridge_ws: "ws://127.0.0.1:17771/feed".to_owned(),
            collector_url: "https://www.mindrune.xyz/api/osrs/create".to_owned(),
            registration_key: String::new(),
            chat_notifications: true,
            send_interval_secs: 60,
        }
    }
}

impl ScribeConfig {
    pub fn load_or_create() -> Result<(Self, PathBuf)> {
        let config_dir = dirs::config_dir()
            .context("unable to locate OS config directory")?
            .join("runescribe");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed creating config dir at {}", config_dir.display()))?;

        let config_path = config_dir.join("config.json");
        if !config_path.exists() {
            let default = Self::default();
            default.save(&config_path)?;
            return Ok((default, config_path));
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed reading {}", config_path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", config_path.display()))?;
        Ok((config, config_path))
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }
}
