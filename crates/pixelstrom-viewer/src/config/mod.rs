//! Viewer config loader (strict parsing).

pub mod schema;

use std::fs;

use pixelstrom_core::error::{Result, ViewerError};

pub use schema::{
    BootstrapMode, BootstrapSection, ChannelSection, Compression, DisplaySection,
    ReconnectSection, ServerSection, SinkKind, ViewerConfig,
};

pub fn load_from_file(path: &str) -> Result<ViewerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ViewerError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ViewerConfig> {
    let cfg: ViewerConfig =
        serde_yaml::from_str(s).map_err(|e| ViewerError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
