//! Sources of role metadata.
//!
//! Two interchangeable sources implement [`MetadataSource`]: a local
//! directory ([`local::LocalRepository`]) and a notary trust server
//! ([`notary::NotaryRepository`]). Every source gets the [`Repository`]
//! operations through a blanket implementation, so fetch policy, decoding
//! and role/type pairing are applied identically regardless of where the
//! bytes come from.
//!
//! # Sub-modules
//!
//! - [`local`] - filesystem-backed repository.
//! - [`notary`] - HTTPS repository behind the notary URL template.
//! - [`transport`] - network seam used by the notary repository.

pub mod local;
pub mod notary;
pub mod transport;

use camino::Utf8Path;
use log::debug;
use std::collections::BTreeMap;

use crate::cancel::CancelToken;
use crate::delegation::{DelegationResolver, ResolverConfig, RoleFetcher, RootTarget};
use crate::error::{Result, TufError};
use crate::metadata::{FileMeta, Root, RoleMetadata, Snapshot, Targets, Timestamp, decode};
use crate::options::{FetchOptions, Sha256Test};
use crate::role::{Role, assert_role_matches_type};
use transport::TransportError;

/// Delivers the raw bytes of a role document.
pub trait MetadataSource {
    /// Fetch the raw document for `role`.
    ///
    /// Implementations must not buffer more than
    /// [`FetchOptions::transfer_limit`] bytes and should report an
    /// over-long payload through [`fetch_error`].
    ///
    /// # Errors
    ///
    /// Returns a transport or policy error when the document cannot be
    /// delivered within bounds.
    fn fetch_raw(&self, role: &Role, options: &FetchOptions) -> Result<Vec<u8>>;

    /// The resolver configuration applied when walking this source's
    /// delegations.
    fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
    }
}

/// The fetch contract shared by every repository.
pub trait Repository {
    /// Fetch the root role, honouring a pinned version and payload tests.
    ///
    /// # Errors
    ///
    /// Fails on transport, policy or decode errors, including
    /// [`TufError::RootVersionMismatch`] when the pinned version differs
    /// from the signed content.
    fn root(&self, options: &FetchOptions) -> Result<Root>;

    /// Fetch the snapshot role.
    ///
    /// # Errors
    ///
    /// Fails on transport, policy or decode errors.
    fn snapshot(&self, options: &FetchOptions) -> Result<Snapshot>;

    /// Fetch the latest timestamp role.
    ///
    /// # Errors
    ///
    /// Fails on transport or decode errors.
    fn timestamp(&self) -> Result<Timestamp>;

    /// Fetch a targets role: the top-level `targets` or a delegate.
    ///
    /// # Errors
    ///
    /// Fails on transport, policy or decode errors.
    ///
    /// # Panics
    ///
    /// Panics when `role` is not a targets role.
    fn targets_role(&self, role: &Role, options: &FetchOptions) -> Result<Targets>;

    /// The resolver this repository walks its delegations with.
    fn delegation_resolver(&self) -> DelegationResolver;

    /// Resolve the delegation tree with this repository's resolver, using
    /// `fetcher` for every role.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error reported by the resolver.
    fn targets(&self, fetcher: &dyn RoleFetcher) -> Result<RootTarget> {
        self.targets_with(&self.delegation_resolver(), fetcher)
    }

    /// Resolve the delegation tree with an explicit `resolver`.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error reported by `resolver`.
    fn targets_with(
        &self,
        resolver: &DelegationResolver,
        fetcher: &dyn RoleFetcher,
    ) -> Result<RootTarget> {
        resolver.resolve(fetcher)
    }

    /// Resolve the delegation tree against this repository.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error reported by the resolver.
    fn resolve_targets(&self) -> Result<RootTarget>
    where
        Self: Sized,
    {
        self.resolve_targets_until(&CancelToken::new())
    }

    /// Resolve the delegation tree against this repository, giving up with
    /// [`TufError::Cancelled`] once `cancel` fires, including mid-transfer.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error reported by the resolver.
    fn resolve_targets_until(&self, cancel: &CancelToken) -> Result<RootTarget>
    where
        Self: Sized,
    {
        let resolver = self.delegation_resolver().with_cancel_token(cancel.clone());
        let fetcher = RepositoryFetcher::new(self).with_cancel_token(cancel.clone());
        self.targets_with(&resolver, &fetcher)
    }
}

/// A repository reached over the network.
pub trait RemoteRepository: Repository {
    /// Check that the server is alive before fetching metadata.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::HealthCheck`] when the health check fails.
    fn ping(&self) -> Result<()>;
}

/// A repository persisted on local disk.
pub trait PersistentRepository: Repository {
    /// The directory holding the role documents.
    fn base_dir(&self) -> &Utf8Path;
}

impl<S: MetadataSource> Repository for S {
    fn root(&self, options: &FetchOptions) -> Result<Root> {
        let root: Root = fetch_role(self, &options.root_role(), options)?;
        options.check_root_version(&root)?;
        Ok(root)
    }

    fn snapshot(&self, options: &FetchOptions) -> Result<Snapshot> {
        fetch_role(self, &Role::Snapshot, options)
    }

    fn timestamp(&self) -> Result<Timestamp> {
        fetch_role(self, &Role::Timestamp, &FetchOptions::none())
    }

    fn targets_role(&self, role: &Role, options: &FetchOptions) -> Result<Targets> {
        fetch_role(self, role, options)
    }

    fn delegation_resolver(&self) -> DelegationResolver {
        DelegationResolver::new(self.resolver_config())
    }
}

/// Fetch, check and decode one role document.
fn fetch_role<S, T>(source: &S, role: &Role, options: &FetchOptions) -> Result<T>
where
    S: MetadataSource + ?Sized,
    T: RoleMetadata,
{
    assert_role_matches_type(role, T::KIND);
    debug!("fetching {role}");
    let payload = source.fetch_raw(role, options)?;
    options.check_payload(role, &payload)?;
    decode(role, &payload)
}

/// Convert a source's transport failure for `role` into a [`TufError`].
///
/// A payload cut off at the expected length is a policy violation rather
/// than a transport failure, and a cancelled transfer is a cancellation.
#[must_use]
pub fn fetch_error(role: &Role, options: &FetchOptions, err: TransportError) -> TufError {
    match err {
        TransportError::Cancelled { .. } => TufError::Cancelled,
        TransportError::TooLarge { limit, .. } if options.expected_length() == Some(limit) => {
            TufError::ExceedsExpectedLength {
                role: role.to_string(),
                expected: limit,
            }
        }
        source => TufError::Fetch {
            role: role.to_string(),
            source,
        },
    }
}

/// A [`RoleFetcher`] bound to one repository.
///
/// When built with [`bounded_by`](Self::bounded_by), each fetch is held to
/// the length and SHA-256 digest the snapshot records for that role. A
/// token set with [`with_cancel_token`](Self::with_cancel_token) is checked
/// before each fetch and handed to the source for the transfer itself.
#[derive(Debug)]
pub struct RepositoryFetcher<'a, R: ?Sized> {
    repo: &'a R,
    meta: BTreeMap<String, FileMeta>,
    cancel: CancelToken,
}

impl<'a, R: Repository + ?Sized> RepositoryFetcher<'a, R> {
    /// Fetch roles from `repo` with no per-role bounds.
    #[must_use]
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            meta: BTreeMap::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Bound every fetch by the file metadata recorded in `snapshot`.
    #[must_use]
    pub fn bounded_by(mut self, snapshot: &Snapshot) -> Self {
        self.meta.clone_from(&snapshot.signed.meta);
        self
    }

    /// Abandon fetches, including one in progress, once `token` fires.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The fetch options for `role` derived from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TufError::InvalidDigest`] when the snapshot records a
    /// SHA-256 digest that is neither hex nor base64.
    fn options_for(&self, role: &Role) -> Result<FetchOptions> {
        let mut builder = FetchOptions::builder();
        builder.cancel_token(self.cancel.clone());
        let meta = self
            .meta
            .get(&role.to_string())
            .or_else(|| self.meta.get(&role.file_name()));
        if let Some(meta) = meta {
            builder.expected_length(meta.length);
            if let Some(digest) = meta.hashes.get("sha256") {
                builder.test(Sha256Test::new(digest.as_str())?);
            }
        }
        Ok(builder.build())
    }
}

impl<R: Repository + ?Sized> RoleFetcher for RepositoryFetcher<'_, R> {
    fn fetch(&self, role: &Role) -> Result<Targets> {
        self.cancel.check()?;
        self.repo.targets_role(role, &self.options_for(role)?)
    }
}
