//! Per-fetch acceptance policy.
//!
//! A [`FetchOptions`] value is built once per fetch and consumed by a
//! single call. Options are orthogonal: a pinned root version, an exact
//! expected byte length, and an ordered list of payload tests. Sources
//! apply the length as a transfer bound and then call
//! [`FetchOptions::check_payload`] before decoding. A [`CancelToken`]
//! carried by the options lets a source abandon a transfer in flight.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::{Result, TufError};
use crate::metadata::Root;
use crate::role::Role;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Length of a raw SHA-256 digest in bytes.
const DIGEST_LEN: usize = 32;

/// A check run against the raw bytes of a fetched role.
///
/// Tests run in the order they were added and stop at the first failure.
pub trait PayloadTest: Send + Sync {
    /// Short name used when reporting a failure.
    fn name(&self) -> &str;

    /// Inspect the payload.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the payload is rejected.
    fn test(&self, payload: &[u8]) -> std::result::Result<(), String>;
}

/// Immutable options for one fetch call.
///
/// # Examples
///
/// ```
/// use tuf_resolver::options::FetchOptions;
///
/// let options = FetchOptions::builder()
///     .root_version(3)
///     .expected_length(2_048)
///     .build();
/// assert_eq!(options.root_version(), Some(3));
/// assert_eq!(options.expected_length(), Some(2_048));
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    root_version: Option<u32>,
    expected_length: Option<u64>,
    tests: Vec<Arc<dyn PayloadTest>>,
    cancel: CancelToken,
}

impl FetchOptions {
    /// Options with no constraints.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Start building options.
    #[must_use]
    pub fn builder() -> FetchOptionsBuilder {
        FetchOptionsBuilder::default()
    }

    /// The root version the fetched root must carry, if pinned.
    #[must_use]
    pub const fn root_version(&self) -> Option<u32> {
        self.root_version
    }

    /// The exact payload length required, if any.
    #[must_use]
    pub const fn expected_length(&self) -> Option<u64> {
        self.expected_length
    }

    /// The token a source polls while transferring the payload.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Number of payload tests attached.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// The root role to request: the pinned version when set, otherwise
    /// the latest root.
    #[must_use]
    pub const fn root_role(&self) -> Role {
        match self.root_version {
            Some(version) => Role::VersionedRoot(version),
            None => Role::Root,
        }
    }

    /// The largest number of bytes a source should accept for this fetch.
    ///
    /// Combines the expected length with the source's own ceiling, taking
    /// whichever is smaller.
    #[must_use]
    pub fn transfer_limit(&self, ceiling: Option<u64>) -> Option<u64> {
        match (self.expected_length, ceiling) {
            (Some(expected), Some(max)) => Some(expected.min(max)),
            (expected, max) => expected.or(max),
        }
    }

    /// Check the expected length, then run every payload test in order.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::LengthMismatch`] before any test runs when the
    /// length is wrong, or [`TufError::TestFailed`] for the first failing
    /// test.
    pub fn check_payload(&self, role: &Role, payload: &[u8]) -> Result<()> {
        if let Some(expected) = self.expected_length {
            let actual = payload.len() as u64;
            if actual != expected {
                return Err(TufError::LengthMismatch {
                    role: role.to_string(),
                    expected,
                    actual,
                });
            }
        }
        for test in &self.tests {
            test.test(payload).map_err(|reason| TufError::TestFailed {
                role: role.to_string(),
                test: test.name().to_owned(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Check a decoded root against the pinned version.
    ///
    /// The comparison is against the signed `version` field, not the name
    /// the root was fetched under.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::RootVersionMismatch`] when a version is pinned
    /// and the root carries a different one.
    pub fn check_root_version(&self, root: &Root) -> Result<()> {
        match self.root_version {
            Some(expected) if root.signed.version != expected => {
                Err(TufError::RootVersionMismatch {
                    expected,
                    actual: root.signed.version,
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tests: Vec<&str> = self.tests.iter().map(|test| test.name()).collect();
        f.debug_struct("FetchOptions")
            .field("root_version", &self.root_version)
            .field("expected_length", &self.expected_length)
            .field("tests", &tests)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Accumulates options for a [`FetchOptions`] value.
#[derive(Clone, Default)]
pub struct FetchOptionsBuilder {
    options: FetchOptions,
}

impl FetchOptionsBuilder {
    /// Require the fetched root to carry exactly this signed version.
    pub fn root_version(&mut self, version: u32) -> &mut Self {
        self.options.root_version = Some(version);
        self
    }

    /// Require the payload to be exactly `length` bytes.
    pub fn expected_length(&mut self, length: u64) -> &mut Self {
        self.options.expected_length = Some(length);
        self
    }

    /// Append a payload test. Tests run in insertion order.
    pub fn test(&mut self, test: impl PayloadTest + 'static) -> &mut Self {
        self.options.tests.push(Arc::new(test));
        self
    }

    /// Abandon the fetch, including a transfer in progress, once `token`
    /// is cancelled.
    pub fn cancel_token(&mut self, token: CancelToken) -> &mut Self {
        self.options.cancel = token;
        self
    }

    /// Produce the immutable options value.
    #[must_use]
    pub fn build(&self) -> FetchOptions {
        self.options.clone()
    }
}

/// Require the payload to hash to a known SHA-256 digest.
///
/// The digest may be given as 64 lowercase hex characters or as standard
/// padded base64, the encoding notary servers publish in snapshot hashes.
///
/// # Examples
///
/// ```
/// use tuf_resolver::options::{PayloadTest, Sha256Test};
///
/// let test = Sha256Test::new(
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
/// ).expect("valid digest");
/// assert!(test.test(b"hello").is_ok());
/// assert!(test.test(b"tampered").is_err());
///
/// let base64 = Sha256Test::new("LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=")
///     .expect("valid digest");
/// assert_eq!(base64.expected(), test.expected());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Test {
    expected: String,
}

impl Sha256Test {
    /// Build a test expecting the digest `expected`, in hex or base64.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidDigest`] when `expected` is neither 64
    /// lowercase hex characters nor base64 encoding exactly 32 bytes.
    pub fn new(expected: impl Into<String>) -> Result<Self> {
        let value = expected.into();
        let expected = normalise_digest(&value)
            .map_err(|reason| TufError::InvalidDigest { value, reason })?;
        Ok(Self { expected })
    }

    /// The digest the payload must hash to, as lowercase hex.
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }
}

impl PayloadTest for Sha256Test {
    fn name(&self) -> &str {
        "sha256"
    }

    fn test(&self, payload: &[u8]) -> std::result::Result<(), String> {
        let actual = format!("{:x}", Sha256::digest(payload));
        if actual == self.expected {
            Ok(())
        } else {
            Err(format!("expected {}, got {actual}", self.expected))
        }
    }
}

/// Reduce a hex or base64 digest to lowercase hex.
fn normalise_digest(value: &str) -> std::result::Result<String, String> {
    if value.len() == DIGEST_HEX_LEN {
        validate_hex_digest(value)?;
        return Ok(value.to_owned());
    }
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| format!("neither {DIGEST_HEX_LEN} hex characters nor base64: {e}"))?;
    if bytes.len() != DIGEST_LEN {
        return Err(format!(
            "base64 digest decodes to {} bytes, expected {DIGEST_LEN}",
            bytes.len()
        ));
    }
    Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
}

fn validate_hex_digest(value: &str) -> std::result::Result<(), String> {
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(format!("non-hex character '{bad}'"));
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("digest must be lowercase".to_owned());
    }
    Ok(())
}

/// Adapt a closure into a named [`PayloadTest`].
///
/// # Examples
///
/// ```
/// use tuf_resolver::options::{FnTest, PayloadTest};
///
/// let not_empty = FnTest::new("not-empty", |payload: &[u8]| {
///     if payload.is_empty() { Err("empty payload".to_owned()) } else { Ok(()) }
/// });
/// assert!(not_empty.test(b"").is_err());
/// ```
pub struct FnTest<F> {
    name: String,
    check: F,
}

impl<F> FnTest<F>
where
    F: Fn(&[u8]) -> std::result::Result<(), String> + Send + Sync,
{
    /// Wrap `check` under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> PayloadTest for FnTest<F>
where
    F: Fn(&[u8]) -> std::result::Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, payload: &[u8]) -> std::result::Result<(), String> {
        (self.check)(payload)
    }
}
