/// `load_config` module: loads a static YAML config and injects the API token from the environment.
///
/// This is the only place where user-supplied YAML is parsed into the CLI's typed config.
///
/// # Responsibilities
/// - Parse the YAML file into [`CliConfig`]: API location, [`ImportConfig`], and inputs
/// - Resolve relative input file paths against the config file's directory
/// - Inject the `PANDAWIKI_TOKEN` secret from the environment (never from YAML)
/// - Reject inputs that cannot be parsed with the configured import source
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use pandawiki_import_core::ImportConfig;
use serde::Deserialize;
use tracing::{error, info, warn};

pub const TOKEN_ENV: &str = "PANDAWIKI_TOKEN";

#[derive(Debug)]
pub struct CliConfig {
    pub api: ApiSection,
    pub import: ImportConfig,
    pub inputs: InputsSection,
    /// Bearer token read from [`TOKEN_ENV`].
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputsSection {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl InputsSection {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.urls.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api: ApiSection,
    import: ImportConfig,
    #[serde(default)]
    inputs: InputsSection,
}

/// Loads a static YAML config file (no secrets) and injects the token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            bail!("Failed to read config file {:?}: {}", path_ref, e);
        }
    };

    let mut raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            bail!("Failed to parse config YAML: {e}");
        }
    };

    let token = match env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => token,
        _ => {
            error!(env = TOKEN_ENV, "API token missing in environment");
            bail!("{TOKEN_ENV} must be set in the environment or a .env file");
        }
    };

    let source = raw.import.source;
    if source.is_file_backed() && !raw.inputs.urls.is_empty() {
        bail!("Import source {source:?} takes files, but inputs.urls is not empty");
    }
    if !source.is_file_backed() && !raw.inputs.files.is_empty() {
        bail!("Import source {source:?} takes URLs, but inputs.files is not empty");
    }
    if raw.inputs.is_empty() {
        warn!(config_path = ?path_ref, "No inputs configured; nothing will be imported");
    }

    let base_dir = path_ref.parent().unwrap_or_else(|| Path::new("."));
    raw.inputs.files = raw
        .inputs
        .files
        .into_iter()
        .map(|file| if file.is_relative() { base_dir.join(file) } else { file })
        .collect();

    Ok(CliConfig {
        api: raw.api,
        import: raw.import,
        inputs: raw.inputs,
        token,
    })
}
