//! HTTPS transport for the notary-backed repository.
//!
//! The [`Transport`] trait isolates network access so the remote
//! repository can be exercised without a server. [`UreqTransport`] is the
//! production implementation. Payloads are read in chunks through
//! [`read_bounded`], which enforces the byte limit and stops as soon as the
//! fetch is cancelled.

use std::io::{self, Read};
use std::time::Duration;

use crate::cancel::CancelToken;

/// Network timeout applied to every request made by [`UreqTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CACHE_CONTROL: &str = "Cache-Control";
const NO_STORE: &str = "no-store";

/// Bytes read between cancellation checks.
const READ_CHUNK: usize = 8 * 1024;

/// Errors arising while a source delivers a payload.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request failed or the server answered with an error status.
    #[error("request to {location} failed: {reason}")]
    Http {
        /// The URL or path that was requested.
        location: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested document does not exist.
    #[error("not found: {location}")]
    NotFound {
        /// The URL or path that was requested.
        location: String,
    },

    /// The payload is larger than the permitted number of bytes.
    #[error("{location} exceeds the {limit} byte limit")]
    TooLarge {
        /// The URL or path that was requested.
        location: String,
        /// The byte limit in force.
        limit: u64,
    },

    /// Reading the payload failed.
    #[error("I/O error reading {location}: {source}")]
    Io {
        /// The URL or path that was requested.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The fetch was cancelled before the payload was complete.
    #[error("fetch of {location} was cancelled")]
    Cancelled {
        /// The URL or path that was requested.
        location: String,
    },
}

/// Fetches documents from a remote trust server.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// GET `url` and return the body, reading at most `limit` bytes.
    ///
    /// Implementations poll `cancel` while the body is transferred.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TooLarge`] if the body exceeds `limit`,
    /// [`TransportError::NotFound`] on 404, [`TransportError::Cancelled`]
    /// once `cancel` fires, and [`TransportError::Http`] for any other
    /// failure.
    fn fetch(
        &self,
        url: &str,
        limit: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, TransportError>;

    /// GET `url` with caching of the response forbidden, discarding the
    /// body.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request fails or the server
    /// answers with an error status.
    fn check_health(&self, url: &str) -> Result<(), TransportError>;
}

/// [`Transport`] backed by a `ureq` agent.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tuf_resolver::repository::transport::UreqTransport;
///
/// let transport = UreqTransport::new(Duration::from_secs(5));
/// // Pass the transport to `NotaryRepository::new` in production.
/// # let _ = transport;
/// ```
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    /// Build a transport whose requests time out after `timeout` and which
    /// refuses plain HTTP.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .https_only(true)
            .build();
        Self::with_agent(ureq::Agent::new_with_config(config))
    }

    /// Wrap an already configured agent.
    #[must_use]
    pub const fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn fetch(
        &self,
        url: &str,
        limit: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled {
                location: url.to_owned(),
            });
        }
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        read_bounded(response.into_body().into_reader(), Some(limit), cancel, url)
    }

    fn check_health(&self, url: &str) -> Result<(), TransportError> {
        self.agent
            .get(url)
            .header(CACHE_CONTROL, NO_STORE)
            .call()
            .map(|_| ())
            .map_err(|e| map_ureq_error(url, &e))
    }
}

/// Map a ureq error to a [`TransportError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(404) => TransportError::NotFound {
            location: url.to_owned(),
        },
        other => TransportError::Http {
            location: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Read `reader` to the end, refusing to buffer more than `limit` bytes.
///
/// `cancel` is checked before every chunk, so a cancelled fetch stops
/// without reading the rest of the payload.
///
/// # Errors
///
/// Returns [`TransportError::TooLarge`] past `limit`,
/// [`TransportError::Cancelled`] once `cancel` fires and
/// [`TransportError::Io`] when a read fails.
pub fn read_bounded(
    reader: impl Read,
    limit: Option<u64>,
    cancel: &CancelToken,
    location: &str,
) -> Result<Vec<u8>, TransportError> {
    let mut reader = reader.take(limit.map_or(u64::MAX, |limit| limit.saturating_add(1)));
    let mut payload = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled {
                location: location.to_owned(),
            });
        }
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransportError::Io {
                    location: location.to_owned(),
                    source,
                });
            }
        };
        payload.extend_from_slice(chunk.get(..read).unwrap_or_default());
    }
    match limit {
        Some(limit) if payload.len() as u64 > limit => Err(TransportError::TooLarge {
            location: location.to_owned(),
            limit,
        }),
        _ => Ok(payload),
    }
}
