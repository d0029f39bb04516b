//! Role identity: top-level role grammar and delegated role names.
//!
//! Top-level roles are restricted to `root`, `<version>.root`, `snapshot`,
//! `timestamp` and `targets`. Delegated roles carry free-form names chosen
//! by signed delegation metadata, so they get their own newtype that only
//! admits names safe to splice into a file path or URL template and that
//! cannot be mistaken for a top-level role.

use std::fmt;

use crate::error::{Result, TufError};

const ROOT: &str = "root";
const SNAPSHOT: &str = "snapshot";
const TIMESTAMP: &str = "timestamp";
const TARGETS: &str = "targets";
const VERSIONED_ROOT_SUFFIX: &str = ".root";

/// Longest delegated role name accepted.
const MAX_DELEGATE_NAME_LEN: usize = 255;

/// The concrete metadata type a role resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    /// Root metadata.
    Root,
    /// Snapshot metadata.
    Snapshot,
    /// Timestamp metadata.
    Timestamp,
    /// Targets metadata, top-level or delegated.
    Targets,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Root => ROOT,
            Self::Snapshot => SNAPSHOT,
            Self::Timestamp => TIMESTAMP,
            Self::Targets => TARGETS,
        };
        f.write_str(label)
    }
}

/// A role whose metadata can be fetched from a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The latest root.
    Root,
    /// A specific root version, named `<version>.root` on the wire.
    VersionedRoot(u32),
    /// The snapshot role.
    Snapshot,
    /// The timestamp role.
    Timestamp,
    /// The top-level targets role.
    Targets,
    /// A targets role reached through delegation.
    Delegated(DelegatedRoleName),
}

impl Role {
    /// Return the metadata type this role must produce.
    #[must_use]
    pub const fn kind(&self) -> MetadataKind {
        match self {
            Self::Root | Self::VersionedRoot(_) => MetadataKind::Root,
            Self::Snapshot => MetadataKind::Snapshot,
            Self::Timestamp => MetadataKind::Timestamp,
            Self::Targets | Self::Delegated(_) => MetadataKind::Targets,
        }
    }

    /// Whether this is a top-level role rather than a delegation.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        !matches!(self, Self::Delegated(_))
    }

    /// Name of the JSON document holding this role, relative to the
    /// repository's metadata root.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuf_resolver::role::Role;
    ///
    /// assert_eq!(Role::VersionedRoot(4).file_name(), "4.root.json");
    /// ```
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{self}.json")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str(ROOT),
            Self::VersionedRoot(version) => write!(f, "{version}{VERSIONED_ROOT_SUFFIX}"),
            Self::Snapshot => f.write_str(SNAPSHOT),
            Self::Timestamp => f.write_str(TIMESTAMP),
            Self::Targets => f.write_str(TARGETS),
            Self::Delegated(name) => f.write_str(name.as_str()),
        }
    }
}

impl From<DelegatedRoleName> for Role {
    fn from(name: DelegatedRoleName) -> Self {
        Self::Delegated(name)
    }
}

/// Validate a top-level role name.
///
/// Accepts `root`, `<positive-int>.root`, `snapshot`, `timestamp` and
/// `targets`. Delegated names are never accepted here; use
/// [`DelegatedRoleName::new`] for those.
///
/// # Errors
///
/// Returns [`TufError::InvalidRoleName`] carrying the rejected string.
///
/// # Examples
///
/// ```
/// use tuf_resolver::role::{Role, validate_role_name};
///
/// assert_eq!(validate_role_name("12.root").ok(), Some(Role::VersionedRoot(12)));
/// assert!(validate_role_name("targets/releases").is_err());
/// ```
pub fn validate_role_name(name: &str) -> Result<Role> {
    let role = match name {
        ROOT => Some(Role::Root),
        SNAPSHOT => Some(Role::Snapshot),
        TIMESTAMP => Some(Role::Timestamp),
        TARGETS => Some(Role::Targets),
        other => other
            .strip_suffix(VERSIONED_ROOT_SUFFIX)
            .and_then(parse_root_version)
            .map(Role::VersionedRoot),
    };
    role.ok_or_else(|| TufError::InvalidRoleName {
        name: name.to_owned(),
    })
}

/// Parse a positive decimal version without sign or leading zeros.
fn parse_root_version(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.starts_with('0') {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Abort if `kind` is not the metadata type produced by `role`.
///
/// Every fetch path in this crate is statically typed to the kind its role
/// produces, so a mismatch means a caller wired a fetch function to the
/// wrong role.
///
/// # Panics
///
/// Panics when the role and metadata type disagree. This is an internal
/// consistency fault, not a recoverable error.
pub fn assert_role_matches_type(role: &Role, kind: MetadataKind) {
    assert!(
        role.kind() == kind,
        "role name and role type mismatch: {role} cannot hold {kind} metadata"
    );
}

/// A validated delegated targets role name such as `targets/releases`.
///
/// Names are `/`-separated segments of ASCII letters, digits, `.`, `_` and
/// `-`. Empty, `.` and `..` segments are rejected, as is any name equal to
/// a top-level role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DelegatedRoleName(String);

impl DelegatedRoleName {
    /// Validate and wrap a delegated role name.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidDelegateName`] when the name is empty,
    /// too long, contains unsafe characters or segments, or coincides with
    /// a top-level role name.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuf_resolver::role::DelegatedRoleName;
    ///
    /// assert!(DelegatedRoleName::new("targets/releases").is_ok());
    /// assert!(DelegatedRoleName::new("snapshot").is_err());
    /// assert!(DelegatedRoleName::new("targets/../root").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let rejection = if name.len() > MAX_DELEGATE_NAME_LEN {
            Some(format!("longer than {MAX_DELEGATE_NAME_LEN} bytes"))
        } else if validate_role_name(&name).is_ok() {
            Some("shadows a top-level role".to_owned())
        } else {
            validate_path_segments(&name).err()
        };
        match rejection {
            Some(reason) => Err(TufError::InvalidDelegateName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for DelegatedRoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DelegatedRoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that `value` is one or more `/`-separated safe path segments.
pub(crate) fn validate_path_segments(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_owned());
    }
    for segment in value.split('/') {
        match segment {
            "" => return Err("contains an empty path segment".to_owned()),
            "." | ".." => return Err(format!("contains a {segment:?} path segment")),
            _ => {}
        }
        if let Some(bad) = segment.chars().find(|c| !is_segment_char(*c)) {
            return Err(format!("contains disallowed character {bad:?}"));
        }
    }
    Ok(())
}

const fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}
