//! Error types for role fetching and delegation resolution.
//!
//! Variants are grouped by the class of failure they represent so callers
//! can decide how to react without matching every variant. The class is
//! exposed through [`TufError::kind`].

use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

use crate::repository::transport::TransportError;

/// Broad classification of a [`TufError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input detected while validating names, paths, URLs or settings.
    Configuration,
    /// The underlying source could not deliver the payload.
    Transport,
    /// A fetch-time acceptance check rejected the payload.
    Policy,
    /// The payload was delivered but is not usable metadata.
    Metadata,
    /// The caller cancelled the operation.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Policy => "policy",
            Self::Metadata => "metadata",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while fetching roles or resolving delegations.
#[derive(Debug, Error)]
pub enum TufError {
    /// A top-level role name does not match the permitted grammar.
    #[error("{name:?} is not a valid role")]
    InvalidRoleName {
        /// The rejected name.
        name: String,
    },

    /// A delegated role name is malformed or shadows a top-level role.
    #[error("invalid delegated role name {name:?}: {reason}")]
    InvalidDelegateName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A logical repository identifier cannot be used as a path segment.
    #[error("invalid repository identifier {value:?}: {reason}")]
    InvalidRepositoryId {
        /// The rejected identifier.
        value: String,
        /// Why the identifier was rejected.
        reason: String,
    },

    /// The local repository path does not exist or could not be inspected.
    #[error("tuf repo path validation failed for {path}: {reason}")]
    RepoPathInvalid {
        /// The path that failed validation.
        path: Utf8PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The local repository path exists but is not a directory.
    #[error("tuf repo path {path} must be a directory")]
    RepoPathNotDirectory {
        /// The offending path.
        path: Utf8PathBuf,
    },

    /// The remote repository URL could not be parsed.
    #[error("tuf remote repo url validation failed for {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as supplied.
        url: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// The remote repository URL does not use the secure scheme.
    #[error("tuf url scheme must be \"https\", got {scheme:?}")]
    InsecureScheme {
        /// The scheme that was supplied, or an empty string when missing.
        scheme: String,
    },

    /// An expected digest is not 64 lowercase hex characters.
    #[error("invalid SHA-256 digest {value:?}: {reason}")]
    InvalidDigest {
        /// The rejected digest.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// Loaded settings are missing a field or carry an unusable value.
    #[error("invalid settings: {reason}")]
    InvalidSettings {
        /// Description of the problem.
        reason: String,
    },

    /// The source failed to deliver the role.
    #[error("failed to fetch {role}: {source}")]
    Fetch {
        /// The role being fetched.
        role: String,
        /// The underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The notary server health check failed.
    #[error("notary health check failed: {source}")]
    HealthCheck {
        /// The underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The payload length differs from the expected length.
    #[error("{role}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// The role being fetched.
        role: String,
        /// The length required by the fetch options.
        expected: u64,
        /// The length actually delivered.
        actual: u64,
    },

    /// The source refused to deliver more than the expected length.
    #[error("{role}: payload exceeds expected length of {expected} bytes")]
    ExceedsExpectedLength {
        /// The role being fetched.
        role: String,
        /// The length required by the fetch options.
        expected: u64,
    },

    /// A post-fetch payload test rejected the payload.
    #[error("{role}: payload test {test} failed: {reason}")]
    TestFailed {
        /// The role being fetched.
        role: String,
        /// Name of the failing test.
        test: String,
        /// Description supplied by the test.
        reason: String,
    },

    /// A pinned root fetch returned a root with a different signed version.
    #[error("root version mismatch: pinned {expected}, signed content has {actual}")]
    RootVersionMismatch {
        /// The pinned version.
        expected: u32,
        /// The version found in the signed content.
        actual: u32,
    },

    /// The payload could not be decoded as metadata for the role.
    #[error("failed to decode {role} metadata: {source}")]
    Decode {
        /// The role being decoded.
        role: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Settings could not be read.
    #[error("failed to read settings from {path}: {source}")]
    SettingsRead {
        /// The settings file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be parsed.
    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl TufError {
    /// Return the broad class of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuf_resolver::error::{ErrorKind, TufError};
    ///
    /// let err = TufError::InvalidRoleName { name: "bogus".to_owned() };
    /// assert_eq!(err.kind(), ErrorKind::Configuration);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRoleName { .. }
            | Self::InvalidDelegateName { .. }
            | Self::InvalidRepositoryId { .. }
            | Self::RepoPathInvalid { .. }
            | Self::RepoPathNotDirectory { .. }
            | Self::InvalidUrl { .. }
            | Self::InsecureScheme { .. }
            | Self::InvalidDigest { .. }
            | Self::InvalidSettings { .. }
            | Self::SettingsRead { .. }
            | Self::SettingsParse(_) => ErrorKind::Configuration,
            Self::Fetch { .. } | Self::HealthCheck { .. } => ErrorKind::Transport,
            Self::LengthMismatch { .. }
            | Self::ExceedsExpectedLength { .. }
            | Self::TestFailed { .. }
            | Self::RootVersionMismatch { .. } => ErrorKind::Policy,
            Self::Decode { .. } => ErrorKind::Metadata,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Result type alias using [`TufError`].
pub type Result<T> = std::result::Result<T, TufError>;
