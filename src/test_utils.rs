//! Shared test utilities: metadata fixtures and a stub role fetcher.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::delegation::RoleFetcher;
use crate::error::{Result, TufError};
use crate::metadata::{Delegation, Delegations, FileMeta, RootBody, Signed, Targets, TargetsBody};
use crate::repository::transport::TransportError;
use crate::role::Role;

const FIXTURE_EXPIRY: &str = "2030-01-01T00:00:00Z";

/// Targets metadata delegating to `delegates` in order and claiming each
/// `(path, length)` pair directly.
#[must_use]
pub fn targets_fixture(delegates: &[&str], claims: &[(&str, u64)]) -> Targets {
    let targets = claims
        .iter()
        .map(|(path, length)| {
            let meta = FileMeta {
                length: *length,
                hashes: BTreeMap::new(),
                custom: None,
            };
            ((*path).to_owned(), meta)
        })
        .collect();
    let roles = delegates
        .iter()
        .map(|name| Delegation {
            name: (*name).to_owned(),
            keyids: vec!["fixture-key".to_owned()],
            threshold: 1,
            paths: vec![String::new()],
        })
        .collect();
    Signed {
        signed: TargetsBody {
            version: 1,
            expires: FIXTURE_EXPIRY.to_owned(),
            targets,
            delegations: Delegations {
                keys: BTreeMap::new(),
                roles,
            },
        },
        signatures: Vec::new(),
    }
}

/// JSON for targets metadata built by [`targets_fixture`].
///
/// # Panics
///
/// Panics if the fixture cannot be serialised, which would indicate a
/// broken data model.
#[must_use]
pub fn targets_json(delegates: &[&str], claims: &[(&str, u64)]) -> String {
    serde_json::to_string(&targets_fixture(delegates, claims))
        .unwrap_or_else(|e| panic!("targets fixture serialises: {e}"))
}

/// JSON for root metadata carrying the signed `version`.
///
/// # Panics
///
/// Panics if the fixture cannot be serialised.
#[must_use]
pub fn root_json(version: u32) -> String {
    let root = Signed {
        signed: RootBody {
            version,
            expires: FIXTURE_EXPIRY.to_owned(),
            consistent_snapshot: false,
            keys: BTreeMap::new(),
            roles: BTreeMap::new(),
        },
        signatures: Vec::new(),
    };
    serde_json::to_string(&root).unwrap_or_else(|e| panic!("root fixture serialises: {e}"))
}

/// JSON for snapshot or timestamp metadata with the given `meta` entries.
#[must_use]
pub fn meta_json(version: u32, meta: &[(&str, u64)]) -> String {
    let entries: Vec<String> = meta
        .iter()
        .map(|(name, length)| format!(r#""{name}":{{"length":{length},"hashes":{{}}}}"#))
        .collect();
    format!(
        r#"{{"signed":{{"version":{version},"expires":"{FIXTURE_EXPIRY}","meta":{{{}}}}},"signatures":[]}}"#,
        entries.join(",")
    )
}

/// A [`RoleFetcher`] serving canned targets metadata and recording every
/// role it is asked for.
#[derive(Debug, Default)]
pub struct StubFetcher {
    roles: HashMap<String, Targets>,
    failures: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// A fetcher that knows no roles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `targets` for the role named `name`.
    #[must_use]
    pub fn with_role(mut self, name: &str, targets: Targets) -> Self {
        self.roles.insert(name.to_owned(), targets);
        self
    }

    /// Fail fetches of `name` with a transport error carrying `reason`.
    #[must_use]
    pub fn with_failure(mut self, name: &str, reason: &str) -> Self {
        self.failures.insert(name.to_owned(), reason.to_owned());
        self
    }

    /// Role names requested so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RoleFetcher for StubFetcher {
    fn fetch(&self, role: &Role) -> Result<Targets> {
        let name = role.to_string();
        self.calls.borrow_mut().push(name.clone());
        if let Some(reason) = self.failures.get(&name) {
            return Err(TufError::Fetch {
                role: name.clone(),
                source: TransportError::Http {
                    location: format!("stub://{name}"),
                    reason: reason.clone(),
                },
            });
        }
        self.roles.get(&name).cloned().ok_or_else(|| TufError::Fetch {
            role: name.clone(),
            source: TransportError::NotFound {
                location: format!("stub://{name}"),
            },
        })
    }
}
