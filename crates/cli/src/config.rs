//! Loading the TOML configuration document.

use std::path::Path;

use anyhow::Context;
use pipeline::PipelineConfig;
use tracing::info;

/// Reads and validates the configuration at `path`.
///
/// A missing file yields the defaults; an unreadable, malformed, or invalid
/// one is an error.
pub fn load(path: &Path) -> anyhow::Result<PipelineConfig> {
    let config = match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str::<PipelineConfig>(&text)
            .with_context(|| format!("could not parse configuration file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no configuration file, using defaults");
            PipelineConfig::default()
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("could not read configuration file {}", path.display()))
        }
    };
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}
