//! Credential resolution for the CLI
//!
//! Credentials come either inline (flags or `LW_*` environment variables)
//! or from a named profile in a local JSON config file. Mixing the two is
//! rejected; with nothing given at all, the `default` profile is assumed.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Resolved credentials for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Tenant account (bare name or full domain).
    pub account: String,
    /// Sub-account to scope single-account runs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<String>,
    pub api_key: String,
    pub api_secret: String,
}

/// On-disk profile store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileStore {
    #[serde(default)]
    pub profiles: HashMap<String, Credentials>,
}

impl ProfileStore {
    /// Load the profile store from the default path. A missing file is an
    /// empty store.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::store_path()?)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    fn store_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("agentcov").join("config.json"))
    }
}

/// Inline credential inputs from flags/environment.
#[derive(Debug, Default)]
pub struct CredentialArgs {
    pub account: Option<String>,
    pub sub_account: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub profile: Option<String>,
}

impl CredentialArgs {
    /// Resolve to concrete credentials, enforcing the input rules:
    /// a profile excludes inline credentials; inline credentials require
    /// account, key and secret together; with neither given, the `default`
    /// profile is assumed. A sub-account may override either source.
    pub fn resolve(self) -> Result<Credentials> {
        self.resolve_with(ProfileStore::load()?)
    }

    pub fn resolve_with(mut self, store: ProfileStore) -> Result<Credentials> {
        let any_inline =
            self.account.is_some() || self.api_key.is_some() || self.api_secret.is_some();

        if self.profile.is_none() && !any_inline {
            self.profile = Some("default".to_string());
        }

        if let Some(profile) = self.profile {
            if any_inline {
                bail!("If passing a profile, other credential values should not be specified");
            }
            let mut creds = store
                .profiles
                .get(&profile)
                .cloned()
                .with_context(|| format!("Profile '{}' not found in config file", profile))?;
            if self.sub_account.is_some() {
                creds.sub_account = self.sub_account;
            }
            return Ok(creds);
        }

        match (self.account, self.api_key, self.api_secret) {
            (Some(account), Some(api_key), Some(api_secret)) => Ok(Credentials {
                account,
                sub_account: self.sub_account,
                api_key,
                api_secret,
            }),
            _ => bail!(
                "If passing credentials, please specify at least --account, --api-key, and \
                 --api-secret; --sub-account is optional"
            ),
        }
    }
}
