//! `load_config` module: resolves where and how to talk to the CDA.
//!
//! Connection settings come from three places, highest precedence first:
//! 1. command-line flags and their environment variables (`CDA_API_ROOT`,
//!    `CDA_API_KEY`, `OFFICE`), including anything loaded from `.env`
//! 2. an optional YAML profile passed with `--config`
//! 3. nothing: a missing API root or office is an error
//!
//! Profile schema:
//!
//! ```yaml
//! cda:
//!   api_root: https://cwms-data.example.mil/cwms-data/
//!   office: SWT
//!   api_key_loc: /home/me/.cda_api_key
//! ```
//!
//! The API key itself is never read from the profile, only the location of a
//! file holding it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub cda: CdaSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct CdaSection {
    pub api_root: Option<String>,
    pub office: Option<String>,
    pub api_key_loc: Option<PathBuf>,
}

/// Everything the CDA client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub api_root: String,
    pub api_key: Option<String>,
}

/// Loads a YAML profile file.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<Profile> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading profile from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read profile");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str::<Profile>(&content) {
        Ok(profile) => {
            info!(
                config_path = ?path_ref,
                api_root_set = profile.cda.api_root.is_some(),
                office_set = profile.cda.office.is_some(),
                "Parsed profile YAML successfully"
            );
            Ok(profile)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse profile YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Merge flag values with the profile into a [`ConnectionConfig`].
pub fn resolve_connection(
    api_root: Option<&str>,
    api_key: Option<&str>,
    api_key_loc: Option<&Path>,
    profile: &Profile,
) -> Result<ConnectionConfig> {
    let api_root = api_root
        .map(str::to_string)
        .or_else(|| profile.cda.api_root.clone())
        .filter(|root| !root.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("CDA api root is required: pass --api-root or set CDA_API_ROOT")
        })?;

    let api_key = match (api_key, api_key_loc.or(profile.cda.api_key_loc.as_deref())) {
        (Some(key), _) => Some(key.to_string()),
        (None, Some(loc)) => Some(read_api_key_file(loc)?),
        (None, None) => None,
    };

    Ok(ConnectionConfig { api_root, api_key })
}

pub fn resolve_office(office: Option<&str>, profile: &Profile) -> Result<String> {
    office
        .map(str::to_string)
        .or_else(|| profile.cda.office.clone())
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("office is required: pass --office or set OFFICE"))
}

/// First line of the file, trimmed.
pub fn read_api_key_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read api key file {}", path.display()))?;
    let key = content.lines().next().unwrap_or("").trim().to_string();
    if key.is_empty() {
        anyhow::bail!("api key file {} is empty", path.display());
    }
    Ok(key)
}
