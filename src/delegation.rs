//! Delegated-targets resolution.
//!
//! Performs a preorder depth-first search of the delegation graph,
//! beginning with the top-level `targets` role, and merges every visited
//! role's target files into one path-ownership map. The first role to
//! claim a path in preorder owns it; later claims for the same path are
//! ignored.
//!
//! For each delegation, in signed declaration order:
//!
//! 1. A role that has been visited before is skipped, so cycles and
//!    diamonds terminate and each role is resolved once.
//! 2. Once the configured maximum number of roles has been visited,
//!    traversal stops and the remaining delegations are left unvisited.
//! 3. Otherwise the delegate name is validated, the role is fetched, its
//!    claims are recorded and its own delegations are expanded before the
//!    next sibling.
//!
//! Any other failure aborts the whole resolution; a partial tree is never
//! returned.

use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::metadata::{FileMeta, Targets};
use crate::role::{DelegatedRoleName, Role};

/// Default cap on the number of roles visited in one resolution.
pub const DEFAULT_MAX_DELEGATIONS: usize = 50;

const TOP_LEVEL: &str = "targets";

/// Fetches targets metadata for a role on behalf of the resolver.
///
/// Any closure `Fn(&Role) -> Result<Targets>` is a fetcher.
pub trait RoleFetcher {
    /// Fetch the targets metadata for `role`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the underlying source reports; it aborts the
    /// resolution.
    fn fetch(&self, role: &Role) -> Result<Targets>;
}

impl<F> RoleFetcher for F
where
    F: Fn(&Role) -> Result<Targets>,
{
    fn fetch(&self, role: &Role) -> Result<Targets> {
        self(role)
    }
}

/// Settings for a [`DelegationResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum number of roles, including the top-level targets role,
    /// visited in one resolution.
    pub max_delegations: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_delegations: DEFAULT_MAX_DELEGATIONS,
        }
    }
}

/// The authoritative entry for one target path.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetClaim {
    role: String,
    meta: FileMeta,
}

impl TargetClaim {
    /// Name of the role whose entry owns the path.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The owning role's file metadata for the path.
    #[must_use]
    pub const fn meta(&self) -> &FileMeta {
        &self.meta
    }
}

/// The merged result of resolving all reachable targets delegations.
#[derive(Debug, Clone)]
pub struct RootTarget {
    top_level: Arc<Targets>,
    claims: BTreeMap<String, TargetClaim>,
    roles: HashMap<String, Arc<Targets>>,
    visit_order: Vec<String>,
}

impl RootTarget {
    fn new(top_level: Targets) -> Self {
        let top_level = Arc::new(top_level);
        let mut tree = Self {
            top_level: Arc::clone(&top_level),
            claims: BTreeMap::new(),
            roles: HashMap::new(),
            visit_order: Vec::new(),
        };
        tree.append(TOP_LEVEL, top_level);
        tree
    }

    /// Record a visited role and its claims, keeping earlier claims.
    fn append(&mut self, name: &str, targets: Arc<Targets>) {
        for (path, meta) in targets.target_files() {
            match self.claims.get(path) {
                Some(prior) => debug!(
                    "{path} already claimed by {}; ignoring claim from {name}",
                    prior.role
                ),
                None => {
                    self.claims.insert(
                        path.clone(),
                        TargetClaim {
                            role: name.to_owned(),
                            meta: meta.clone(),
                        },
                    );
                }
            }
        }
        self.visit_order.push(name.to_owned());
        self.roles.insert(name.to_owned(), targets);
    }

    fn has_visited(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// The top-level targets role.
    #[must_use]
    pub fn top_level(&self) -> &Targets {
        &self.top_level
    }

    /// The authoritative claim for `path`, if any visited role made one.
    #[must_use]
    pub fn claim(&self, path: &str) -> Option<&TargetClaim> {
        self.claims.get(path)
    }

    /// Every claimed path with its authoritative claim, ordered by path.
    #[must_use]
    pub const fn claims(&self) -> &BTreeMap<String, TargetClaim> {
        &self.claims
    }

    /// Metadata of a visited role, including `targets` itself.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<&Targets> {
        self.roles.get(name).map(|targets| targets.as_ref())
    }

    /// Names of visited roles in preorder.
    pub fn visited_roles(&self) -> impl Iterator<Item = &str> {
        self.visit_order.iter().map(String::as_str)
    }

    /// Number of roles visited.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.visit_order.len()
    }
}

/// What happened when a delegation was considered.
#[derive(Debug, Clone)]
enum Visit {
    Fetched(Arc<Targets>),
    AlreadyVisited,
    CapReached,
}

/// Builds a [`RootTarget`] from a [`RoleFetcher`].
///
/// # Examples
///
/// ```
/// use tuf_resolver::delegation::{DelegationResolver, ResolverConfig};
/// use tuf_resolver::error::Result;
/// use tuf_resolver::metadata::{Signed, Targets, TargetsBody};
/// use tuf_resolver::role::Role;
///
/// let fetch = |_role: &Role| -> Result<Targets> {
///     Ok(Signed {
///         signed: TargetsBody {
///             version: 1,
///             expires: "2030-01-01T00:00:00Z".to_owned(),
///             targets: Default::default(),
///             delegations: Default::default(),
///         },
///         signatures: Vec::new(),
///     })
/// };
/// let tree = DelegationResolver::new(ResolverConfig::default())
///     .resolve(&fetch)
///     .expect("resolution succeeds");
/// assert_eq!(tree.visited_roles().collect::<Vec<_>>(), ["targets"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DelegationResolver {
    config: ResolverConfig,
    cancel: CancelToken,
}

impl DelegationResolver {
    /// A resolver using `config`.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `token` and stop with [`TufError::Cancelled`] once it fires.
    ///
    /// [`TufError::Cancelled`]: crate::error::TufError::Cancelled
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resolve every reachable delegation starting from `targets`.
    ///
    /// # Errors
    ///
    /// Fails with the first error from fetching the top-level role or any
    /// delegate, from validating a delegate name, or with
    /// [`TufError::Cancelled`] when cancelled. Revisits and the delegation
    /// cap are not errors.
    ///
    /// [`TufError::Cancelled`]: crate::error::TufError::Cancelled
    pub fn resolve(&self, fetcher: &dyn RoleFetcher) -> Result<RootTarget> {
        self.cancel.check()?;
        let top_level = fetcher.fetch(&Role::Targets)?;
        self.cancel.check()?;
        let mut tree = RootTarget::new(top_level);

        // Each entry is a role whose delegations are being expanded and the
        // index of the next delegation to consider.
        let mut pending = vec![(Arc::clone(&tree.top_level), 0_usize)];
        while let Some((parent, next)) = pending.last_mut() {
            let Some(name) = parent
                .signed
                .delegations
                .roles
                .get(*next)
                .map(|delegation| delegation.name.clone())
            else {
                pending.pop();
                continue;
            };
            *next += 1;
            match self.visit(fetcher, &mut tree, &name)? {
                Visit::Fetched(targets) => pending.push((targets, 0)),
                Visit::AlreadyVisited => {}
                Visit::CapReached => break,
            }
        }

        self.cancel.check()?;
        debug!("resolved {} targets roles", tree.role_count());
        Ok(tree)
    }

    fn visit(&self, fetcher: &dyn RoleFetcher, tree: &mut RootTarget, name: &str) -> Result<Visit> {
        if tree.has_visited(name) {
            debug!("skipping {name}: already visited");
            return Ok(Visit::AlreadyVisited);
        }
        if tree.role_count() >= self.config.max_delegations {
            warn!(
                "delegation cap of {} roles reached; not expanding {name} or later delegations",
                self.config.max_delegations
            );
            return Ok(Visit::CapReached);
        }
        let role = Role::from(DelegatedRoleName::new(name)?);
        self.cancel.check()?;
        let targets = Arc::new(fetcher.fetch(&role)?);
        self.cancel.check()?;
        debug!("fetched delegated role {name}");
        tree.append(name, Arc::clone(&targets));
        Ok(Visit::Fetched(targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TufError;
    use crate::repository::transport::TransportError;
    use crate::test_utils::{StubFetcher, targets_fixture};

    fn resolve_with(fetcher: &StubFetcher, max_delegations: usize) -> Result<RootTarget> {
        DelegationResolver::new(ResolverConfig { max_delegations }).resolve(fetcher)
    }

    fn owner<'a>(tree: &'a RootTarget, path: &str) -> &'a str {
        tree.claim(path).map_or("<unclaimed>", TargetClaim::role)
    }

    #[test]
    fn sequential_siblings_resolve_in_declaration_order() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a", "targets/b"], &[]))
            .with_role("targets/a", targets_fixture(&[], &[("/x", 1)]))
            .with_role("targets/b", targets_fixture(&[], &[("/x", 2), ("/y", 3)]));

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        assert_eq!(owner(&tree, "/x"), "targets/a");
        assert_eq!(tree.claim("/x").map(|c| c.meta().length), Some(1));
        assert_eq!(owner(&tree, "/y"), "targets/b");
        assert_eq!(
            tree.visited_roles().collect::<Vec<_>>(),
            ["targets", "targets/a", "targets/b"]
        );
    }

    #[test]
    fn top_level_claims_take_precedence() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a"], &[("/x", 10)]))
            .with_role("targets/a", targets_fixture(&[], &[("/x", 11)]));

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        assert_eq!(owner(&tree, "/x"), "targets");
    }

    #[test]
    fn preorder_visits_children_before_siblings() {
        // targets -> [a, b]; a -> [c]. c claims /p before b does.
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a", "targets/b"], &[]))
            .with_role("targets/a", targets_fixture(&["targets/c"], &[]))
            .with_role("targets/b", targets_fixture(&[], &[("/p", 2)]))
            .with_role("targets/c", targets_fixture(&[], &[("/p", 3)]));

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        assert_eq!(owner(&tree, "/p"), "targets/c");
        assert_eq!(
            fetcher.calls(),
            ["targets", "targets/a", "targets/c", "targets/b"]
        );
    }

    #[test]
    fn diamond_resolves_shared_delegate_once_via_first_path() {
        // targets -> [a, b]; a -> [d]; b -> [d]. b claims /q, d claims /q.
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a", "targets/b"], &[]))
            .with_role("targets/a", targets_fixture(&["targets/d"], &[]))
            .with_role("targets/b", targets_fixture(&["targets/d"], &[("/q", 2)]))
            .with_role("targets/d", targets_fixture(&[], &[("/q", 4)]));

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        assert_eq!(owner(&tree, "/q"), "targets/d");
        assert_eq!(tree.role_count(), 4);
        assert_eq!(
            fetcher.calls().iter().filter(|c| *c == "targets/d").count(),
            1
        );
    }

    #[test]
    fn cycles_terminate_with_each_role_once() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a"], &[]))
            .with_role("targets/a", targets_fixture(&["targets/b"], &[]))
            .with_role(
                "targets/b",
                targets_fixture(&["targets/a", "targets"], &[("/z", 1)]),
            );

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        assert_eq!(
            tree.visited_roles().collect::<Vec<_>>(),
            ["targets", "targets/a", "targets/b"]
        );
        assert_eq!(fetcher.calls().len(), 3);
        assert!(tree.role("targets/a").is_some());
        assert!(tree.role("targets/b").is_some());
    }

    #[test]
    fn cap_bounds_roles_fetched() {
        let fetcher = StubFetcher::new()
            .with_role(
                "targets",
                targets_fixture(&["targets/a", "targets/b", "targets/c"], &[]),
            )
            .with_role("targets/a", targets_fixture(&["targets/a1"], &[("/a", 1)]))
            .with_role("targets/a1", targets_fixture(&[], &[("/a1", 1)]))
            .with_role("targets/b", targets_fixture(&[], &[("/b", 1)]))
            .with_role("targets/c", targets_fixture(&[], &[("/c", 1)]));

        let tree = resolve_with(&fetcher, 3).expect("resolves");

        assert_eq!(
            tree.visited_roles().collect::<Vec<_>>(),
            ["targets", "targets/a", "targets/a1"]
        );
        assert_eq!(fetcher.calls().len(), 3);
        assert!(tree.claim("/a1").is_some());
        assert!(tree.claim("/b").is_none());
    }

    #[test]
    fn cap_of_one_keeps_only_top_level() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a"], &[("/t", 1)]))
            .with_role("targets/a", targets_fixture(&[], &[]));

        let tree = resolve_with(&fetcher, 1).expect("resolves");

        assert_eq!(tree.role_count(), 1);
        assert_eq!(fetcher.calls(), ["targets"]);
        assert_eq!(owner(&tree, "/t"), "targets");
    }

    #[test]
    fn top_level_fetch_failure_is_fatal() {
        let fetcher = StubFetcher::new();

        let err = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect_err("no targets");

        assert!(matches!(
            err,
            TufError::Fetch {
                source: TransportError::NotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn delegate_fetch_failure_aborts_resolution() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a", "targets/b"], &[]))
            .with_failure("targets/a", "connection reset")
            .with_role("targets/b", targets_fixture(&[], &[]));

        let err = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect_err("fails");

        assert!(err.to_string().contains("connection reset"), "{err}");
        assert_eq!(fetcher.calls(), ["targets", "targets/a"]);
    }

    #[test]
    fn delegate_shadowing_a_top_level_role_is_rejected() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["root"], &[]))
            .with_role("root", targets_fixture(&[], &[]));

        let err = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect_err("rejected");

        assert!(matches!(err, TufError::InvalidDelegateName { .. }));
        assert_eq!(fetcher.calls(), ["targets"]);
    }

    #[test]
    fn traversal_names_are_rejected_before_fetching() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/../snapshot"], &[]));

        let err = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect_err("rejected");

        assert!(matches!(err, TufError::InvalidDelegateName { .. }));
        assert_eq!(fetcher.calls(), ["targets"]);
    }

    #[test]
    fn cancelled_resolution_returns_no_tree() {
        let token = CancelToken::new();
        let cancel_after_a = token.clone();
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a", "targets/b"], &[]))
            .with_role("targets/a", targets_fixture(&[], &[]))
            .with_role("targets/b", targets_fixture(&[], &[]));
        let fetch = |role: &Role| {
            let result = fetcher.fetch(role);
            if role.to_string() == "targets/a" {
                cancel_after_a.cancel();
            }
            result
        };

        let err = DelegationResolver::default()
            .with_cancel_token(token)
            .resolve(&fetch)
            .expect_err("cancelled");

        assert!(matches!(err, TufError::Cancelled));
        assert_eq!(fetcher.calls(), ["targets", "targets/a"]);
    }

    #[test]
    fn cancellation_during_final_fetch_returns_no_tree() {
        let token = CancelToken::new();
        let cancel_during_fetch = token.clone();
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a"], &[]))
            .with_role("targets/a", targets_fixture(&[], &[("/a", 1)]));
        let fetch = |role: &Role| {
            if role.to_string() == "targets/a" {
                cancel_during_fetch.cancel();
            }
            fetcher.fetch(role)
        };

        let err = DelegationResolver::default()
            .with_cancel_token(token.clone())
            .resolve(&fetch)
            .expect_err("cancelled");

        assert!(token.is_cancelled());
        assert!(matches!(err, TufError::Cancelled));
    }

    #[test]
    fn cancellation_during_top_level_fetch_returns_no_tree() {
        let token = CancelToken::new();
        let cancel_during_fetch = token.clone();
        let fetcher = StubFetcher::new().with_role("targets", targets_fixture(&[], &[]));
        let fetch = |role: &Role| {
            cancel_during_fetch.cancel();
            fetcher.fetch(role)
        };

        let err = DelegationResolver::default()
            .with_cancel_token(token)
            .resolve(&fetch)
            .expect_err("cancelled");

        assert!(matches!(err, TufError::Cancelled));
    }

    #[test]
    fn long_delegation_chains_do_not_recurse() {
        const CHAIN: usize = 20_000;
        let names: Vec<String> = (0..CHAIN).map(|i| format!("targets/r{i}")).collect();
        let mut fetcher =
            StubFetcher::new().with_role("targets", targets_fixture(&[names[0].as_str()], &[]));
        for (i, name) in names.iter().enumerate() {
            let next: Vec<&str> = names.get(i + 1).map(String::as_str).into_iter().collect();
            fetcher = fetcher.with_role(name, targets_fixture(&next, &[]));
        }
        let last = names.last().map(String::as_str).expect("non-empty chain");

        let tree = resolve_with(&fetcher, CHAIN + 1).expect("resolves");

        assert_eq!(tree.role_count(), CHAIN + 1);
        assert_eq!(tree.visited_roles().last(), Some(last));
    }

    #[test]
    fn lookup_exposes_delegate_entries() {
        let fetcher = StubFetcher::new()
            .with_role("targets", targets_fixture(&["targets/a"], &[]))
            .with_role("targets/a", targets_fixture(&[], &[("/x", 7)]));

        let tree = resolve_with(&fetcher, DEFAULT_MAX_DELEGATIONS).expect("resolves");

        let delegate = tree.role("targets/a").expect("visited");
        assert_eq!(delegate.target_files()["/x"].length, 7);
        assert_eq!(tree.top_level().delegations().count(), 1);
        assert!(tree.role("targets/missing").is_none());
    }
}
