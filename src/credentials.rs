//! Test-user credentials and the deterministic credential pool.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;

/// Password shared by all fixed-pool test users.
///
/// Kept constant so capacity runs can reuse pre-registered accounts instead
/// of paying the password-hashing cost on every iteration.
pub const POOL_PASSWORD: &str = "Password123!";

/// Credentials for one test identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    /// Login username.
    pub username: String,
    /// Login email, the primary credential.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Display name sent on registration.
    pub nickname: String,
}

impl Credentials {
    /// Create the fixed pool user for 1-based index `n` (`testuser1`, ...).
    #[must_use]
    pub fn numbered(n: usize) -> Self {
        Self {
            username: format!("testuser{n}"),
            email: format!("testuser{n}@example.com"),
            password: POOL_PASSWORD.to_string(),
            nickname: format!("Test User {n}"),
        }
    }

    /// Generate a throwaway identity with a random suffix.
    ///
    /// Used when no pool entry exists for an actor.
    #[must_use]
    pub fn generated() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let suffix = suffix.to_lowercase();
        Self {
            username: format!("user_{suffix}"),
            email: format!("user_{suffix}@example.com"),
            password: POOL_PASSWORD.to_string(),
            nickname: format!("User {suffix}"),
        }
    }
}

/// Read-only pool of test identities, shared by all actors.
///
/// Populated once before the run; concurrent index-based reads need no
/// locking. Lookup is deterministic so the same actor index always maps to
/// the same identity across iterations and runs.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    users: Vec<Credentials>,
}

impl CredentialPool {
    /// Create an empty pool; every actor falls back to generated identities.
    #[must_use]
    pub const fn empty() -> Self {
        Self { users: Vec::new() }
    }

    /// Create a pool of `n` numbered test users.
    #[must_use]
    pub fn fixed(n: usize) -> Self {
        Self {
            users: (1..=n).map(Credentials::numbered).collect(),
        }
    }

    /// Create a pool from explicit credentials.
    #[must_use]
    pub fn from_users(users: Vec<Credentials>) -> Self {
        Self { users }
    }

    /// Deterministically pick the pool entry for an actor index.
    ///
    /// Returns `None` when the pool is empty; callers then generate a
    /// throwaway identity.
    #[must_use]
    pub fn for_actor(&self, actor_index: usize) -> Option<&Credentials> {
        if self.users.is_empty() {
            None
        } else {
            self.users.get(actor_index % self.users.len())
        }
    }

    /// Resolve credentials for an actor: pool entry or generated fallback.
    #[must_use]
    pub fn resolve(&self, actor_index: usize) -> Credentials {
        self.for_actor(actor_index)
            .cloned()
            .unwrap_or_else(Credentials::generated)
    }

    /// Number of identities in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Iterate over all pool identities.
    pub fn iter(&self) -> impl Iterator<Item = &Credentials> {
        self.users.iter()
    }
}
