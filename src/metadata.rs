//! Data model for the four role envelopes.
//!
//! Only the fields read by fetching and delegation resolution are typed;
//! everything else in a document is ignored on decode. Signatures are
//! carried through untouched for the verification layer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TufError};
use crate::role::{MetadataKind, Role, assert_role_matches_type};

/// A signed metadata document: the signed body plus its signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signed<T> {
    /// The signed portion of the document.
    pub signed: T,
    /// Signatures over the canonical form of `signed`.
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// A single signature entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Identifier of the signing key.
    pub keyid: String,
    /// Signature scheme, e.g. `ecdsa`.
    #[serde(default)]
    pub method: String,
    /// Base64 signature bytes.
    pub sig: String,
}

/// Key identifiers and threshold for one top-level role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    /// Keys authorised to sign the role.
    pub keyids: Vec<String>,
    /// Number of distinct signatures required.
    pub threshold: u32,
}

/// Signed body of root metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootBody {
    /// Monotonic root version.
    pub version: u32,
    /// Expiry timestamp as written by the repository.
    pub expires: String,
    /// Whether the repository publishes consistent snapshots.
    #[serde(default)]
    pub consistent_snapshot: bool,
    /// Public keys by key identifier, kept in their wire form.
    #[serde(default)]
    pub keys: BTreeMap<String, serde_json::Value>,
    /// Keys and thresholds per top-level role.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleKeys>,
}

/// Length and hashes of a file, as recorded by snapshot, timestamp or
/// targets metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Exact length in bytes.
    pub length: u64,
    /// Digests keyed by algorithm name, hex or base64 as published.
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    /// Opaque application data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

/// Signed body of snapshot metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBody {
    /// Snapshot version.
    pub version: u32,
    /// Expiry timestamp as written by the repository.
    pub expires: String,
    /// File metadata for every role file in the snapshot.
    #[serde(default)]
    pub meta: BTreeMap<String, FileMeta>,
}

/// Signed body of timestamp metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampBody {
    /// Timestamp version.
    pub version: u32,
    /// Expiry timestamp as written by the repository.
    pub expires: String,
    /// File metadata for the current snapshot.
    #[serde(default)]
    pub meta: BTreeMap<String, FileMeta>,
}

/// One delegation declared by a targets role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Name of the delegated role.
    pub name: String,
    /// Keys authorised to sign the delegated role.
    #[serde(default)]
    pub keyids: Vec<String>,
    /// Number of distinct signatures required.
    #[serde(default)]
    pub threshold: u32,
    /// Target path patterns the delegate is trusted for.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// The delegations block of a targets role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delegations {
    /// Public keys used by delegates, kept in their wire form.
    #[serde(default)]
    pub keys: BTreeMap<String, serde_json::Value>,
    /// Delegations in signed precedence order.
    #[serde(default)]
    pub roles: Vec<Delegation>,
}

/// Signed body of targets metadata, top-level or delegated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetsBody {
    /// Targets version.
    pub version: u32,
    /// Expiry timestamp as written by the repository.
    pub expires: String,
    /// Target files described directly by this role.
    #[serde(default)]
    pub targets: BTreeMap<String, FileMeta>,
    /// Further delegations made by this role.
    #[serde(default)]
    pub delegations: Delegations,
}

/// Root metadata.
pub type Root = Signed<RootBody>;
/// Snapshot metadata.
pub type Snapshot = Signed<SnapshotBody>;
/// Timestamp metadata.
pub type Timestamp = Signed<TimestampBody>;
/// Targets metadata.
pub type Targets = Signed<TargetsBody>;

impl Targets {
    /// Delegations in signed declaration order.
    pub fn delegations(&self) -> impl Iterator<Item = &Delegation> {
        self.signed.delegations.roles.iter()
    }

    /// Target files described directly by this role.
    #[must_use]
    pub fn target_files(&self) -> &BTreeMap<String, FileMeta> {
        &self.signed.targets
    }
}

/// A metadata envelope that a fetch can produce.
///
/// The associated [`KIND`](RoleMetadata::KIND) ties each envelope to the
/// roles that may produce it, so fetch functions are typed per role.
pub trait RoleMetadata: DeserializeOwned {
    /// The metadata type this envelope represents.
    const KIND: MetadataKind;

    /// Version recorded in the signed body.
    fn version(&self) -> u32;
}

impl RoleMetadata for Root {
    const KIND: MetadataKind = MetadataKind::Root;

    fn version(&self) -> u32 {
        self.signed.version
    }
}

impl RoleMetadata for Snapshot {
    const KIND: MetadataKind = MetadataKind::Snapshot;

    fn version(&self) -> u32 {
        self.signed.version
    }
}

impl RoleMetadata for Timestamp {
    const KIND: MetadataKind = MetadataKind::Timestamp;

    fn version(&self) -> u32 {
        self.signed.version
    }
}

impl RoleMetadata for Targets {
    const KIND: MetadataKind = MetadataKind::Targets;

    fn version(&self) -> u32 {
        self.signed.version
    }
}

/// Decode `bytes` fetched for `role` into its envelope type.
///
/// # Errors
///
/// Returns [`TufError::Decode`] when the bytes are not valid JSON for the
/// envelope.
///
/// # Panics
///
/// Panics when `T` is not the envelope type produced by `role`; see
/// [`assert_role_matches_type`].
pub fn decode<T: RoleMetadata>(role: &Role, bytes: &[u8]) -> Result<T> {
    assert_role_matches_type(role, T::KIND);
    serde_json::from_slice(bytes).map_err(|source| TufError::Decode {
        role: role.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS_JSON: &str = r#"{
        "signed": {
            "_type": "Targets",
            "version": 3,
            "expires": "2030-01-01T00:00:00Z",
            "targets": {
                "app/v1": {"length": 12, "hashes": {"sha256": "abc"}}
            },
            "delegations": {
                "keys": {},
                "roles": [
                    {"name": "targets/b", "keyids": ["k1"], "threshold": 1, "paths": [""]},
                    {"name": "targets/a", "keyids": ["k2"], "threshold": 1, "paths": ["app/"]}
                ]
            }
        },
        "signatures": [{"keyid": "k0", "method": "ecdsa", "sig": "c2ln"}]
    }"#;

    #[test]
    fn decodes_targets_and_preserves_delegation_order() {
        let targets: Targets = decode(&Role::Targets, TARGETS_JSON.as_bytes()).expect("decode");
        let names: Vec<_> = targets.delegations().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["targets/b", "targets/a"]);
        assert_eq!(targets.version(), 3);
        assert_eq!(targets.target_files()["app/v1"].length, 12);
        assert_eq!(targets.signatures.len(), 1);
    }

    #[test]
    fn missing_delegations_decode_as_empty() {
        let json = r#"{"signed": {"version": 1, "expires": "2030-01-01T00:00:00Z"}}"#;
        let targets: Targets = decode(&Role::Targets, json.as_bytes()).expect("decode");
        assert_eq!(targets.delegations().count(), 0);
        assert!(targets.target_files().is_empty());
    }

    #[test]
    fn decode_failure_names_the_role() {
        let err = decode::<Snapshot>(&Role::Snapshot, b"{not json").expect_err("bad json");
        assert!(matches!(&err, TufError::Decode { role, .. } if role == "snapshot"));
    }

    #[test]
    fn decodes_root_roles() {
        let json = r#"{"signed": {
            "version": 2,
            "expires": "2030-01-01T00:00:00Z",
            "roles": {"root": {"keyids": ["k"], "threshold": 1}}
        }}"#;
        let root: Root = decode(&Role::VersionedRoot(2), json.as_bytes()).expect("decode");
        assert_eq!(root.version(), 2);
        assert_eq!(root.signed.roles["root"].threshold, 1);
    }

    #[test]
    #[should_panic(expected = "role name and role type mismatch")]
    fn decoding_into_the_wrong_envelope_aborts() {
        let _decoded: Result<Root> = decode(&Role::Timestamp, b"{}");
    }
}
