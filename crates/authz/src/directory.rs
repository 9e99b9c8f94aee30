//! Time-bounded cache of a project's policy document.
//!
//! # Architecture
//!
//! ```text
//! get_policy(force_refresh)
//!   → snapshot present, not forced, age <= TTL?  → return cached Arc
//!   → otherwise GET policy endpoint via ApiTransport
//!              → decode `policy` field
//!              → swap snapshot (write lock held only for the swap)
//! ```
//!
//! # Cache Strategy
//!
//! - **TTL**: Default 300 seconds from the fetch timestamp
//! - **Expiry**: a snapshot older than the TTL is refetched on the next read
//! - **Forced refresh**: always refetches, regardless of age
//! - **Replacement**: wholesale; readers holding the old `Arc` keep a complete
//!   document
//! - **Overlapping fetches**: each fetch takes a ticket when it starts; a
//!   result is installed only if its ticket is newer than the installed one,
//!   so the most recently started fetch wins regardless of completion order
//!
//! Transport failures propagate to the caller and leave the previous snapshot
//! in place.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fail::fail_point;
use parking_lot::RwLock;
use tokio::time::Instant;
use warden_transport::{ApiTransport, Endpoints, TransportError};

use crate::{
    error::{AuthzError, AuthzResult},
    policy::PolicyDocument,
};

/// Default policy cache TTL (5 minutes).
pub const DEFAULT_POLICY_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct Snapshot {
    policy: Arc<PolicyDocument>,
    fetched_at: Instant,
}

#[derive(Default)]
struct Slot {
    snapshot: Option<Snapshot>,
    /// Ticket of the installed snapshot, or the last ticket issued before an
    /// invalidation. Fetches holding a ticket at or below it are discarded.
    installed: u64,
}

/// Cache for the policy document of one project.
///
/// Any number of directories may coexist; each owns its own snapshot and
/// talks to its own transport.
pub struct PolicyDirectory {
    transport: Arc<dyn ApiTransport>,
    path: String,
    ttl: Duration,
    slot: RwLock<Slot>,
    /// Last fetch ticket issued.
    tickets: AtomicU64,
}

impl PolicyDirectory {
    /// Creates an empty directory for the project described by `endpoints`.
    #[must_use]
    pub fn new(transport: Arc<dyn ApiTransport>, endpoints: &Endpoints) -> Self {
        Self {
            transport,
            path: endpoints.policy(),
            ttl: DEFAULT_POLICY_TTL,
            slot: RwLock::new(Slot::default()),
            tickets: AtomicU64::new(0),
        }
    }

    /// Overrides the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Seeds the directory with a known policy, timestamped now.
    #[must_use]
    pub fn with_policy(self, policy: PolicyDocument) -> Self {
        self.slot.write().snapshot =
            Some(Snapshot { policy: Arc::new(policy), fetched_at: Instant::now() });
        self
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the policy, fetching it when absent, expired or forced.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Transport`] when the fetch fails
    /// - [`AuthzError::InvalidPolicy`] when the response is not a policy
    #[tracing::instrument(skip(self))]
    pub async fn get_policy(&self, force_refresh: bool) -> AuthzResult<Arc<PolicyDocument>> {
        if !force_refresh && let Some(snapshot) = self.snapshot() {
            if snapshot.fetched_at.elapsed() <= self.ttl {
                tracing::debug!(cache = "policy", "cache hit");
                return Ok(snapshot.policy);
            }
            tracing::debug!(cache = "policy", "cache expired");
        } else {
            tracing::debug!(cache = "policy", force_refresh, "cache miss");
        }

        self.refresh().await
    }

    /// Drops the cached policy. The next read fetches.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write();
        slot.installed = slot.installed.max(self.tickets.load(Ordering::Acquire));
        slot.snapshot = None;
        tracing::debug!(cache = "policy", "cache invalidated");
    }

    /// Returns when the current snapshot was fetched, if any.
    #[must_use]
    pub fn fetched_at(&self) -> Option<Instant> {
        self.slot.read().snapshot.as_ref().map(|s| s.fetched_at)
    }

    fn snapshot(&self) -> Option<Snapshot> {
        self.slot.read().snapshot.clone()
    }

    async fn refresh(&self) -> AuthzResult<Arc<PolicyDocument>> {
        let ticket = self.tickets.fetch_add(1, Ordering::AcqRel) + 1;

        fail_point!("policy-directory-before-fetch", |_| {
            Err(AuthzError::Transport(TransportError::connection(
                "injected failure before policy fetch",
            )))
        });
        let body = self.transport.get(&self.path).await?;
        let policy = Arc::new(PolicyDocument::from_response(&body)?);

        let mut slot = self.slot.write();
        if ticket > slot.installed {
            slot.installed = ticket;
            slot.snapshot =
                Some(Snapshot { policy: Arc::clone(&policy), fetched_at: Instant::now() });
            tracing::info!(
                ticket,
                roles = policy.roles.len(),
                scopes = policy.scopes.len(),
                "policy cache replaced"
            );
        } else {
            tracing::debug!(
                ticket,
                installed = slot.installed,
                "discarding policy fetch: a later fetch was installed meanwhile"
            );
        }

        Ok(policy)
    }
}

impl std::fmt::Debug for PolicyDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDirectory")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("cached", &self.slot.read().snapshot.is_some())
            .finish_non_exhaustive()
    }
}
