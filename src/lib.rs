//! TUF role fetching and delegated-targets resolution.
//!
//! This crate fetches TUF role metadata from a local directory or a notary
//! trust server, applies fetch-time acceptance checks (expected length,
//! payload tests, pinned root versions) and resolves the delegated-targets
//! graph into a single path-ownership view. Signature verification and
//! expiry checking are left to the caller.
//!
//! # Modules
//!
//! - [`cancel`] - Cooperative cancellation of a resolution
//! - [`config`] - TOML-backed settings for repositories and the resolver
//! - [`delegation`] - Bounded, cycle-safe preorder delegation resolver
//! - [`error`] - Error types classified by failure kind
//! - [`metadata`] - Serde model of the role documents
//! - [`options`] - Fetch policy: expected length, payload tests, root pinning
//! - [`repository`] - Local and notary-backed metadata sources
//! - [`role`] - Role identity and name validation

pub mod cancel;
pub mod config;
pub mod delegation;
pub mod error;
pub mod metadata;
pub mod options;
pub mod repository;
pub mod role;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use cancel::CancelToken;
pub use config::TufSettings;
pub use delegation::{DelegationResolver, ResolverConfig, RoleFetcher, RootTarget, TargetClaim};
pub use error::{ErrorKind, Result, TufError};
pub use options::{FetchOptions, FnTest, PayloadTest, Sha256Test};
pub use repository::local::LocalRepository;
pub use repository::notary::{NotaryRepository, RepositoryId};
pub use repository::{PersistentRepository, RemoteRepository, Repository, RepositoryFetcher};
pub use role::{DelegatedRoleName, MetadataKind, Role, validate_role_name};
