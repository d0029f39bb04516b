//! Repository served by a notary trust server over HTTPS.
//!
//! Role documents are requested from
//! `<base>/v2/<gun>/_trust/tuf/<role>.json`, where `<gun>` is the logical
//! repository identifier. The server's liveness endpoint is
//! `<base>/_notary_server/health`.

use log::{debug, trace};
use std::fmt;
use ureq::http::Uri;

use super::transport::{Transport, UreqTransport};
use super::{MetadataSource, RemoteRepository, fetch_error};
use crate::config::TufSettings;
use crate::delegation::ResolverConfig;
use crate::error::{Result, TufError};
use crate::options::FetchOptions;
use crate::role::{Role, validate_path_segments};

const SECURE_SCHEME: &str = "https";
const HEALTH_PATH: &str = "/_notary_server/health";

/// Validate a notary base URL, requiring the `https` scheme and a host.
///
/// # Errors
///
/// Returns [`TufError::InvalidUrl`] when the URL cannot be parsed or names
/// no host, and [`TufError::InsecureScheme`] for any scheme other than
/// `https`.
///
/// # Examples
///
/// ```
/// use tuf_resolver::repository::notary::validate_url;
///
/// assert!(validate_url("https://notary.example.com").is_ok());
/// assert!(validate_url("http://notary.example.com").is_err());
/// ```
pub fn validate_url(url: &str) -> Result<Uri> {
    let uri: Uri = url.parse().map_err(|e: ureq::http::uri::InvalidUri| TufError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let scheme = uri.scheme_str().unwrap_or_default();
    if scheme != SECURE_SCHEME {
        return Err(TufError::InsecureScheme {
            scheme: scheme.to_owned(),
        });
    }
    if uri.authority().is_none() {
        return Err(TufError::InvalidUrl {
            url: url.to_owned(),
            reason: "missing host".to_owned(),
        });
    }
    Ok(uri)
}

/// The logical repository identifier (GUN) on a notary server.
///
/// A GUN is interpolated into request paths, so it is restricted to
/// `/`-separated segments of ASCII letters, digits, `.`, `_` and `-`, with
/// no empty, `.` or `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Validate and wrap a repository identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidRepositoryId`] when the value cannot be
    /// used as a path.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        match validate_path_segments(&value) {
            Ok(()) => Ok(Self(value)),
            Err(reason) => Err(TufError::InvalidRepositoryId { value, reason }),
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A notary-backed repository.
///
/// Generic over the [`Transport`] so tests can substitute a mock.
#[derive(Debug)]
pub struct NotaryRepository<T = UreqTransport> {
    base: String,
    gun: RepositoryId,
    max_response_size: u64,
    resolver_config: ResolverConfig,
    transport: T,
}

impl<T: Transport> NotaryRepository<T> {
    /// Build a repository for `gun` on the server at `url`.
    ///
    /// No response body larger than `max_response_size` bytes is ever
    /// buffered.
    ///
    /// # Errors
    ///
    /// Fails when `url` is not a valid HTTPS URL or `max_response_size` is
    /// zero.
    pub fn new(url: &str, gun: RepositoryId, max_response_size: u64, transport: T) -> Result<Self> {
        let uri = validate_url(url)?;
        if max_response_size == 0 {
            return Err(TufError::InvalidSettings {
                reason: "max_response_size must be at least 1".to_owned(),
            });
        }
        let authority = uri.authority().map_or("", |a| a.as_str());
        let base = format!(
            "{SECURE_SCHEME}://{authority}{}",
            uri.path().trim_end_matches('/')
        );
        debug!("using notary repository {gun} at {base}");
        Ok(Self {
            base,
            gun,
            max_response_size,
            resolver_config: ResolverConfig::default(),
            transport,
        })
    }

    /// Resolve delegations from this repository with `config`.
    #[must_use]
    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }

    /// The repository identifier.
    #[must_use]
    pub const fn gun(&self) -> &RepositoryId {
        &self.gun
    }

    /// The URL from which `role` is fetched.
    #[must_use]
    pub fn role_url(&self, role: &Role) -> String {
        format!("{}/v2/{}/_trust/tuf/{}", self.base, self.gun, role.file_name())
    }

    /// The server's liveness URL.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}{HEALTH_PATH}", self.base)
    }
}

impl NotaryRepository<UreqTransport> {
    /// Build a repository from `notary_url` and `gun` in `settings`,
    /// resolving delegations with the settings' resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidSettings`] when either field is missing,
    /// or the first validation error in the settings.
    pub fn from_settings(settings: &TufSettings) -> Result<Self> {
        settings.verify()?;
        let (Some(url), Some(gun)) = (&settings.notary_url, &settings.gun) else {
            return Err(TufError::InvalidSettings {
                reason: "notary_url and gun must both be set".to_owned(),
            });
        };
        Self::new(
            url,
            RepositoryId::new(gun.as_str())?,
            settings.max_response_size,
            UreqTransport::new(settings.timeout()),
        )
        .map(|repo| repo.with_resolver_config(settings.resolver_config()))
    }
}

impl<T: Transport> MetadataSource for NotaryRepository<T> {
    fn fetch_raw(&self, role: &Role, options: &FetchOptions) -> Result<Vec<u8>> {
        let url = self.role_url(role);
        let limit = options
            .transfer_limit(Some(self.max_response_size))
            .unwrap_or(self.max_response_size);
        trace!("GET {url} (limit {limit} bytes)");
        self.transport
            .fetch(&url, limit, options.cancel_token())
            .map_err(|e| fetch_error(role, options, e))
    }

    fn resolver_config(&self) -> ResolverConfig {
        self.resolver_config
    }
}

impl<T: Transport> RemoteRepository for NotaryRepository<T> {
    fn ping(&self) -> Result<()> {
        let url = self.health_url();
        trace!("checking health at {url}");
        self.transport
            .check_health(&url)
            .map_err(|source| TufError::HealthCheck { source })
    }
}
