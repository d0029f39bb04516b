//! Repository backed by a directory of role documents.
//!
//! Each role lives at `<repo_path>/<role>.json`; delegated roles with
//! `/`-separated names map onto nested directories.

use camino::{Utf8Path, Utf8PathBuf};
use log::trace;
use std::fs::File;
use std::io;

use super::transport::{TransportError, read_bounded};
use super::{MetadataSource, PersistentRepository, fetch_error};
use crate::config::TufSettings;
use crate::delegation::ResolverConfig;
use crate::error::{Result, TufError};
use crate::options::FetchOptions;
use crate::role::Role;

/// Role metadata stored on local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalRepository {
    repo_path: Utf8PathBuf,
    resolver_config: ResolverConfig,
}

impl LocalRepository {
    /// Open the repository at `repo_path`.
    ///
    /// Symbolic links are followed, so a link to a directory is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::RepoPathInvalid`] when the path cannot be
    /// inspected and [`TufError::RepoPathNotDirectory`] when it is not a
    /// directory.
    pub fn new(repo_path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let repo_path = repo_path.into();
        let metadata = std::fs::metadata(&repo_path).map_err(|e| TufError::RepoPathInvalid {
            path: repo_path.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(TufError::RepoPathNotDirectory { path: repo_path });
        }
        Ok(Self {
            repo_path,
            resolver_config: ResolverConfig::default(),
        })
    }

    /// Open the repository named by `settings.local_repo`, resolving
    /// delegations with the settings' resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidSettings`] when the settings fail
    /// verification or name no local repository, otherwise as
    /// [`LocalRepository::new`].
    pub fn from_settings(settings: &TufSettings) -> Result<Self> {
        settings.verify()?;
        let path = settings
            .local_repo
            .as_ref()
            .ok_or_else(|| TufError::InvalidSettings {
                reason: "local_repo is not set".to_owned(),
            })?;
        Ok(Self::new(path.clone())?.with_resolver_config(settings.resolver_config()))
    }

    /// Resolve delegations from this repository with `config`.
    #[must_use]
    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }

    /// The file holding `role`.
    #[must_use]
    pub fn role_path(&self, role: &Role) -> Utf8PathBuf {
        self.repo_path.join(role.file_name())
    }
}

impl MetadataSource for LocalRepository {
    fn fetch_raw(&self, role: &Role, options: &FetchOptions) -> Result<Vec<u8>> {
        let path = self.role_path(role);
        trace!("reading {path}");
        read_file(&path, options).map_err(|e| fetch_error(role, options, e))
    }

    fn resolver_config(&self) -> ResolverConfig {
        self.resolver_config
    }
}

impl PersistentRepository for LocalRepository {
    fn base_dir(&self) -> &Utf8Path {
        &self.repo_path
    }
}

/// Read `path` within the options' transfer limit.
fn read_file(
    path: &Utf8Path,
    options: &FetchOptions,
) -> std::result::Result<Vec<u8>, TransportError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TransportError::NotFound {
            location: path.to_string(),
        },
        _ => TransportError::Io {
            location: path.to_string(),
            source,
        },
    })?;
    read_bounded(
        file,
        options.transfer_limit(None),
        options.cancel_token(),
        path.as_str(),
    )
}
