//! Client configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Connection settings for the evaluation service.
///
/// Note: Custom Debug impl masks tokens to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppraiseConfig {
    /// Service base URL, e.g. `https://rrhh.example.org`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer access token. Supports `${VAR}` environment references.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Refresh token used to renew an expired session.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for AppraiseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppraiseConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for AppraiseConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            refresh_token: None,
            timeout_secs: None,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Single pass over the input: substituted values are never rescanned, so
/// a variable whose value contains `${...}` cannot loop the resolver.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("appraise"))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `appraise.toml` in the current directory
/// 2. `~/.config/appraise/config.toml`
///
/// Environment variable overrides: `APPRAISE_BASE_URL`, `APPRAISE_TOKEN`,
/// `APPRAISE_REFRESH_TOKEN`.
pub fn load_config() -> Result<AppraiseConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AppraiseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("appraise.toml");
        if local.exists() {
            Some(local)
        } else if let Some(dir) = config_dir() {
            let global = dir.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AppraiseConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AppraiseConfig::default(),
    };

    // Apply env var overrides
    if let Ok(url) = std::env::var("APPRAISE_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(token) = std::env::var("APPRAISE_TOKEN") {
        config.access_token = Some(token);
    }
    if let Ok(token) = std::env::var("APPRAISE_REFRESH_TOKEN") {
        config.refresh_token = Some(token);
    }

    config.base_url = resolve_env_vars(&config.base_url);
    config.access_token = config.access_token.as_deref().map(resolve_env_vars);
    config.refresh_token = config.refresh_token.as_deref().map(resolve_env_vars);

    Ok(config)
}
