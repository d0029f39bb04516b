//! BDD tests for delegated-targets resolution.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::BTreeMap;
use tuf_resolver::delegation::{DelegationResolver, ResolverConfig, RootTarget};
use tuf_resolver::error::{ErrorKind, TufError};
use tuf_resolver::test_utils::{StubFetcher, targets_fixture};

/// Delegations and claims declared for one role.
#[derive(Default)]
struct RoleSetup {
    delegates: Vec<String>,
    claims: Vec<(String, u64)>,
}

#[derive(Default)]
struct DelegationWorld {
    roles: BTreeMap<String, RoleSetup>,
    failures: Vec<String>,
    cap: Option<usize>,
    calls: Vec<String>,
    result: Option<Result<RootTarget, TufError>>,
}

impl DelegationWorld {
    fn role(&mut self, name: &str) -> &mut RoleSetup {
        self.roles.entry(name.to_owned()).or_default()
    }

    fn delegate(&mut self, parent: &str, children: &str) {
        for child in children.split(',') {
            self.role(parent).delegates.push(child.to_owned());
            self.role(child);
        }
    }

    fn tree(&self) -> &RootTarget {
        match self.result.as_ref().expect("resolution attempted") {
            Ok(tree) => tree,
            Err(e) => panic!("expected a resolved tree, got {e}"),
        }
    }
}

#[fixture]
fn world() -> DelegationWorld {
    let mut world = DelegationWorld::default();
    world.role("targets");
    world
}

#[given("the top-level role delegates to \"{children}\"")]
fn given_top_level_delegates(world: &mut DelegationWorld, children: String) {
    world.delegate("targets", &children);
}

#[given("role \"{parent}\" delegates to \"{children}\"")]
fn given_role_delegates(world: &mut DelegationWorld, parent: String, children: String) {
    world.delegate(&parent, &children);
}

#[given("role \"{role}\" claims \"{path}\" with length {length}")]
fn given_role_claims(world: &mut DelegationWorld, role: String, path: String, length: String) {
    let length = length.parse().expect("numeric length");
    world.role(&role).claims.push((path, length));
}

#[given("role \"{role}\" cannot be fetched")]
fn given_role_fails(world: &mut DelegationWorld, role: String) {
    world.failures.push(role);
}

#[given("the delegation cap is {cap}")]
fn given_cap(world: &mut DelegationWorld, cap: String) {
    world.cap = Some(cap.parse().expect("numeric cap"));
}

#[when("the delegation tree is resolved")]
fn when_resolved(world: &mut DelegationWorld) {
    let mut fetcher = StubFetcher::new();
    for (name, setup) in &world.roles {
        let delegates: Vec<&str> = setup.delegates.iter().map(String::as_str).collect();
        let claims: Vec<(&str, u64)> = setup
            .claims
            .iter()
            .map(|(path, length)| (path.as_str(), *length))
            .collect();
        fetcher = fetcher.with_role(name, targets_fixture(&delegates, &claims));
    }
    for name in &world.failures {
        fetcher = fetcher.with_failure(name, "connection reset");
    }
    let config = world.cap.map_or_else(ResolverConfig::default, |max_delegations| {
        ResolverConfig { max_delegations }
    });

    world.result = Some(DelegationResolver::new(config).resolve(&fetcher));
    world.calls = fetcher.calls();
}

#[then("the tree visits \"{roles}\"")]
fn then_tree_visits(world: &mut DelegationWorld, roles: String) {
    let expected: Vec<&str> = roles.split(',').collect();
    let visited: Vec<&str> = world.tree().visited_roles().collect();
    assert_eq!(visited, expected);
}

#[then("path \"{path}\" is owned by \"{role}\"")]
fn then_path_owned_by(world: &mut DelegationWorld, path: String, role: String) {
    let claim = world.tree().claim(&path).expect("path is claimed");
    assert_eq!(claim.role(), role);
}

#[then("path \"{path}\" is unclaimed")]
fn then_path_unclaimed(world: &mut DelegationWorld, path: String) {
    assert!(world.tree().claim(&path).is_none(), "{path} should be unclaimed");
}

#[then("each role was fetched once")]
fn then_each_role_fetched_once(world: &mut DelegationWorld) {
    let mut calls = world.calls.clone();
    calls.sort();
    calls.dedup();
    assert_eq!(calls.len(), world.calls.len(), "calls: {:?}", world.calls);
}

#[then("resolution fails with a transport error")]
fn then_fails_with_transport_error(world: &mut DelegationWorld) {
    assert_failure_kind(world, ErrorKind::Transport);
}

#[then("resolution fails with a configuration error")]
fn then_fails_with_configuration_error(world: &mut DelegationWorld) {
    assert_failure_kind(world, ErrorKind::Configuration);
}

fn assert_failure_kind(world: &DelegationWorld, kind: ErrorKind) {
    match world.result.as_ref().expect("resolution attempted") {
        Ok(tree) => panic!("expected {kind} failure, got tree {tree:?}"),
        Err(e) => assert_eq!(e.kind(), kind, "error: {e}"),
    }
}

#[scenario(
    path = "tests/features/delegation.feature",
    name = "Sibling delegates are resolved in declaration order"
)]
fn scenario_sibling_order(world: DelegationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/delegation.feature",
    name = "A delegation cycle terminates"
)]
fn scenario_cycle(world: DelegationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/delegation.feature",
    name = "Traversal stops at the delegation cap"
)]
fn scenario_cap(world: DelegationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/delegation.feature",
    name = "A failing delegate aborts resolution"
)]
fn scenario_failing_delegate(world: DelegationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/delegation.feature",
    name = "A delegate named after a top-level role is rejected"
)]
fn scenario_shadowing_delegate(world: DelegationWorld) {
    let _ = world;
}
