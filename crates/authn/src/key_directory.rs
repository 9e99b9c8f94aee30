//! Time-bounded cache of an issuer's public signing keys.
//!
//! This module provides [`KeyDirectory`], which wraps the key-set (JWKS)
//! endpoint of one project with an in-memory snapshot so that local token
//! verification does not hit the network for every token.
//!
//! # Architecture
//!
//! ```text
//! JWT arrives → extract kid
//!              → lookup(kid) on the current KeySet snapshot
//!              → unknown kid? get_keys(force_refresh = true)
//!                   → refetch only if the snapshot is older than the TTL
//!              → still unknown? KeyNotFound
//!              → verify signature with the cached DecodingKey
//! ```
//!
//! # Cache Strategy
//!
//! - **TTL**: Default 300 seconds from the fetch timestamp
//! - **Staleness alone never refetches**: a stale snapshot keeps serving until
//!   a caller forces a refresh, which happens only for unknown key ids
//! - **Forced refresh is rate-limited**: within the TTL it returns the cached
//!   snapshot, so a stream of tokens with bogus key ids cannot hammer the
//!   issuer
//! - **Replacement**: wholesale; readers holding the old `Arc<KeySet>` keep a
//!   complete set
//! - **Overlapping fetches**: the most recently started fetch wins; an older
//!   fetch completing later is discarded
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use warden_authn::KeyDirectory;
//! use warden_transport::{Endpoints, MemoryTransport, Tenancy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoints = Endpoints::new("project-test-123", Tenancy::Consumer);
//! let transport = MemoryTransport::new();
//! transport.respond(endpoints.jwks(), json!({ "keys": [] }));
//!
//! let directory = KeyDirectory::new(Arc::new(transport.clone()), &endpoints);
//! let keys = directory.get_keys(false).await?;
//! assert!(keys.is_empty());
//! assert_eq!(transport.call_count(&endpoints.jwks()), 1);
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fail::fail_point;
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use warden_transport::{ApiTransport, Endpoints, TransportError};

use crate::{
    config::DEFAULT_CACHE_TTL,
    error::{AuthError, Result},
    validation::ACCEPTED_ALGORITHMS,
};

/// Key type of the keys this directory can verify with.
const RSA_KEY_TYPE: &str = "RSA";

/// A public signing key in JWK form.
///
/// Only the members needed for RS256 verification are modelled; other JWK
/// members are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key ID, matched against the `kid` JWT header.
    pub kid: String,
    /// Key type (`RSA` for usable keys).
    pub kty: String,
    /// Algorithm the key is published for, if stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Public key use (`sig`), if stated.
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus, base64url without padding.
    #[serde(default)]
    pub n: String,
    /// RSA public exponent, base64url without padding.
    #[serde(default)]
    pub e: String,
}

impl SigningKey {
    /// Builds the RS256 verification key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPublicKey`] if the key is not an RSA key,
    /// is published for another algorithm, or its components do not decode.
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        if self.kty != RSA_KEY_TYPE {
            return Err(AuthError::invalid_public_key(format!(
                "key '{}' has type '{}', expected '{RSA_KEY_TYPE}'",
                self.kid, self.kty
            )));
        }

        if let Some(alg) = &self.alg
            && !ACCEPTED_ALGORITHMS.contains(&alg.as_str())
        {
            return Err(AuthError::invalid_public_key(format!(
                "key '{}' is published for '{alg}'",
                self.kid
            )));
        }

        if self.n.is_empty() || self.e.is_empty() {
            return Err(AuthError::invalid_public_key(format!(
                "key '{}' is missing RSA components",
                self.kid
            )));
        }

        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| AuthError::invalid_public_key(format!("key '{}': {e}", self.kid)))
    }
}

/// An immutable snapshot of a project's signing keys.
///
/// Verification keys are derived once, when the snapshot is built. Keys that
/// cannot verify RS256 signatures stay listed in [`keys`](Self::keys) but are
/// never returned by [`decoding_key`](Self::decoding_key).
pub struct KeySet {
    keys: Vec<SigningKey>,
    decoding: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
}

impl KeySet {
    fn new(keys: Vec<SigningKey>, fetched_at: Instant) -> Self {
        let mut decoding = HashMap::with_capacity(keys.len());
        for key in &keys {
            match key.decoding_key() {
                Ok(decoding_key) => {
                    decoding.insert(key.kid.clone(), Arc::new(decoding_key));
                },
                Err(err) => {
                    tracing::warn!(kid = %key.kid, error = %err, "skipping unusable signing key");
                },
            }
        }
        Self { keys, decoding, fetched_at }
    }

    /// Parses the `keys` array of a key-set response.
    fn parse(body: &Value) -> Result<Vec<SigningKey>> {
        let keys = body
            .get("keys")
            .ok_or_else(|| AuthError::invalid_response("key set response has no 'keys' field"))?;
        Vec::<SigningKey>::deserialize(keys)
            .map_err(|e| AuthError::invalid_response(format!("key set: {e}")))
    }

    /// Returns all published keys, in document order.
    #[must_use]
    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    /// Returns the published key with the given id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Returns the verification key for `kid`, if usable.
    #[must_use]
    pub fn decoding_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.decoding.get(kid).cloned()
    }

    /// Number of published keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When the snapshot was fetched (or seeded).
    #[must_use]
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("keys", &self.keys)
            .field("usable", &self.decoding.len())
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

#[derive(Default)]
struct Slot {
    set: Option<Arc<KeySet>>,
    /// Ticket of the fetch that produced `set` (0 when seeded or empty).
    installed: u64,
}

/// Cache for the public signing keys of one project.
///
/// No global state: any number of directories, for different projects or
/// tenancies, can coexist.
pub struct KeyDirectory {
    transport: Arc<dyn ApiTransport>,
    path: String,
    ttl: Duration,
    slot: RwLock<Slot>,
    /// Last fetch ticket issued. Tickets order fetches by start time.
    tickets: AtomicU64,
}

impl KeyDirectory {
    /// Creates an empty directory for the project described by `endpoints`.
    ///
    /// The first read fetches the key set.
    #[must_use]
    pub fn new(transport: Arc<dyn ApiTransport>, endpoints: &Endpoints) -> Self {
        Self {
            transport,
            path: endpoints.jwks(),
            ttl: DEFAULT_CACHE_TTL,
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

    /// Seeds the directory with pre-supplied keys, timestamped now.
    ///
    /// No fetch happens until a forced refresh arrives after the TTL.
    #[must_use]
    pub fn with_keys(self, keys: Vec<SigningKey>) -> Self {
        self.slot.write().set = Some(Arc::new(KeySet::new(keys, Instant::now())));
        self
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the key set, fetching it when absent, or when forced and the
    /// snapshot is older than the TTL.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Transport`] when the fetch fails (never retried here)
    /// - [`AuthError::InvalidResponse`] when the body has no `keys` array
    #[tracing::instrument(skip(self))]
    pub async fn get_keys(&self, force_refresh: bool) -> Result<Arc<KeySet>> {
        match self.snapshot() {
            None => {
                tracing::debug!(cache = "jwks", "cache empty");
            },
            Some(set) if force_refresh && set.fetched_at.elapsed() > self.ttl => {
                tracing::debug!(
                    cache = "jwks",
                    age_secs = set.fetched_at.elapsed().as_secs(),
                    "forced refresh of stale key set"
                );
            },
            Some(set) => {
                tracing::debug!(cache = "jwks", force_refresh, "cache hit");
                return Ok(set);
            },
        }

        self.refresh().await
    }

    /// Resolves the verification key for `kid`.
    ///
    /// An unknown key id forces exactly one refresh attempt before giving up.
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeyNotFound`] if no usable key has the id
    /// - any error from [`get_keys`](Self::get_keys)
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        let set = self.get_keys(false).await?;
        if let Some(key) = set.decoding_key(kid) {
            return Ok(key);
        }

        tracing::debug!(kid, "unknown key id, forcing key set refresh");
        let set = self.get_keys(true).await?;
        set.decoding_key(kid).ok_or_else(|| AuthError::key_not_found(kid))
    }

    /// Number of keys in the current snapshot (0 when empty).
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.slot.read().set.as_ref().map_or(0, |set| set.len())
    }

    /// When the current snapshot was fetched, if any.
    #[must_use]
    pub fn fetched_at(&self) -> Option<Instant> {
        self.slot.read().set.as_ref().map(|set| set.fetched_at)
    }

    fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.slot.read().set.clone()
    }

    async fn refresh(&self) -> Result<Arc<KeySet>> {
        let ticket = self.tickets.fetch_add(1, Ordering::AcqRel) + 1;

        fail_point!("key-directory-before-fetch", |_| {
            Err(AuthError::Transport(TransportError::connection(
                "injected failure before key set fetch",
            )))
        });
        let body = self.transport.get(&self.path).await?;
        let set = Arc::new(KeySet::new(KeySet::parse(&body)?, Instant::now()));

        let mut slot = self.slot.write();
        if ticket > slot.installed {
            slot.installed = ticket;
            slot.set = Some(Arc::clone(&set));
            tracing::info!(
                ticket,
                keys = set.len(),
                usable = set.decoding.len(),
                "key set cache replaced"
            );
        } else {
            tracing::debug!(
                ticket,
                installed = slot.installed,
                "discarding key set fetch: a later fetch was installed meanwhile"
            );
        }

        Ok(set)
    }
}

impl std::fmt::Debug for KeyDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDirectory")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("key_count", &self.key_count())
            .finish_non_exhaustive()
    }
}
