//! Settings for repository access and delegation resolution.
//!
//! [`TufSettings`] is deserialised from TOML. Every field is optional in the
//! file and falls back to a default, so an empty document is valid. Values
//! are only checked by [`TufSettings::verify`]; the repository constructors
//! call it before using the settings.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

use crate::delegation::{DEFAULT_MAX_DELEGATIONS, ResolverConfig};
use crate::error::{Result, TufError};
use crate::repository::notary::{RepositoryId, validate_url};

/// Default ceiling on the size of a single remote response: 5 MiB.
pub const DEFAULT_MAX_RESPONSE_SIZE: u64 = 5 * 1024 * 1024;

/// Default timeout for remote requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Repository and resolver settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TufSettings {
    /// Base URL of the notary server. Must use `https`.
    pub notary_url: Option<String>,
    /// Logical repository identifier on the notary server.
    pub gun: Option<String>,
    /// Directory holding role documents on local disk.
    pub local_repo: Option<Utf8PathBuf>,
    /// Largest response body accepted from the notary server, in bytes.
    pub max_response_size: u64,
    /// Maximum number of targets roles visited per resolution, counting the
    /// top-level role.
    pub max_delegations: usize,
    /// Global timeout for each remote request, in seconds.
    pub timeout_secs: u64,
}

impl Default for TufSettings {
    fn default() -> Self {
        Self {
            notary_url: None,
            gun: None,
            local_repo: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            max_delegations: DEFAULT_MAX_DELEGATIONS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl TufSettings {
    /// Parse settings from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::SettingsParse`] for malformed TOML or unknown
    /// keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuf_resolver::config::TufSettings;
    ///
    /// let settings = TufSettings::from_toml_str("max_delegations = 10\n")?;
    /// assert_eq!(settings.max_delegations, 10);
    /// # Ok::<(), tuf_resolver::error::TufError>(())
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::SettingsRead`] when the file cannot be read and
    /// [`TufError::SettingsParse`] when it is not valid settings TOML.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| TufError::SettingsRead {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate every field that is present.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the first unusable field.
    pub fn verify(&self) -> Result<()> {
        if let Some(url) = &self.notary_url {
            validate_url(url)?;
        }
        if let Some(gun) = &self.gun {
            RepositoryId::new(gun.as_str())?;
        }
        if self.max_delegations == 0 {
            return Err(invalid("max_delegations must be at least 1"));
        }
        if self.max_response_size == 0 {
            return Err(invalid("max_response_size must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// The resolver configuration these settings describe.
    #[must_use]
    pub const fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_delegations: self.max_delegations,
        }
    }

    /// The remote request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn invalid(reason: &str) -> TufError {
    TufError::InvalidSettings {
        reason: reason.to_owned(),
    }
}
