use std::path::PathBuf;

use serde::Deserialize;
use pixelstrom_core::error::{Result, ViewerError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub channel: ChannelSection,

    #[serde(default)]
    pub bootstrap: BootstrapSection,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub display: DisplaySection,
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ViewerError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.channel.validate()?;
        self.reconnect.validate()?;
        self.display.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            snapshot_url: default_snapshot_url(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        // the channel client is built without TLS
        if !self.ws_url.starts_with("ws://") {
            return Err(ViewerError::Config(
                "server.ws_url must start with ws:// (wss is not supported)".into(),
            ));
        }
        if !(self.snapshot_url.starts_with("http://") || self.snapshot_url.starts_with("https://"))
        {
            return Err(ViewerError::Config(
                "server.snapshot_url must start with http:// or https://".into(),
            ));
        }
        Ok(())
    }
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".into()
}
fn default_snapshot_url() -> String {
    "http://localhost:3000/api/current-screen".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Zstd,
    #[serde(rename = "none")]
    Identity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    #[serde(default)]
    pub compression: Compression,

    /// Upper bound for one decompressed message.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl ChannelSection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=512 * 1024 * 1024).contains(&self.max_message_bytes) {
            return Err(ViewerError::Config(
                "channel.max_message_bytes must be between 1 KiB and 512 MiB".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_message_bytes() -> usize {
    32 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapMode {
    /// Fetch the current screen over HTTP once the channel is open.
    #[default]
    Fetch,
    /// Wait for the server to push a snapshot on the channel.
    Push,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapSection {
    #[serde(default)]
    pub mode: BootstrapMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// 0 = retry forever.
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: 0,
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.initial_backoff_ms) {
            return Err(ViewerError::Config(
                "reconnect.initial_backoff_ms must be between 100 and 60000".into(),
            ));
        }
        if self.max_backoff_ms > 300000 {
            return Err(ViewerError::Config(
                "reconnect.max_backoff_ms must be at most 300000".into(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ViewerError::Config(
                "reconnect.max_backoff_ms must not be below initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    10000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Log,
    Ppm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplaySection {
    #[serde(default)]
    pub sink: SinkKind,

    #[serde(default = "default_ppm_path")]
    pub ppm_path: PathBuf,

    /// Minimum time between two file writes.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            ppm_path: default_ppm_path(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl DisplaySection {
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_ms > 3_600_000 {
            return Err(ViewerError::Config(
                "display.min_interval_ms must be at most one hour".into(),
            ));
        }
        if self.sink == SinkKind::Ppm && self.ppm_path.as_os_str().is_empty() {
            return Err(ViewerError::Config(
                "display.ppm_path must be set for the ppm sink".into(),
            ));
        }
        Ok(())
    }
}

fn default_ppm_path() -> PathBuf {
    PathBuf::from("pixelstrom.ppm")
}
fn default_min_interval_ms() -> u64 {
    1000
}
