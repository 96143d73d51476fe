//! Contracts the core depends on. Concrete backends live in [`crate::rest`] and
//! [`crate::memory`].

use pocketlens_core::{SessionTokens, UserIdentity};
use serde_json::Value;

use crate::error::{AuthError, StoreError};
use crate::query::{Insert, Rows, Select};

/// A row-level-secured tabular store reached through a token-scoped query interface.
#[allow(async_fn_in_trait)]
pub trait TableStore: Clone {
    /// A copy of this store forwarding `access_token` as the bearer credential.
    /// `None` means anonymous access.
    fn with_bearer(&self, access_token: Option<&str>) -> Self;

    async fn select(&self, query: &Select) -> Result<Rows, StoreError>;

    /// Returns the inserted rows when `Returning::Representation` was asked for,
    /// otherwise an empty list.
    async fn insert(&self, insert: &Insert) -> Result<Vec<Value>, StoreError>;
}

/// A signed-in user plus the token pair the identity service issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: UserIdentity,
    pub tokens: SessionTokens,
}

/// External identity service: password sign-in and refresh-token exchange.
#[allow(async_fn_in_trait)]
pub trait IdentityService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// Exchange a refresh token for a new access/refresh pair
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;
}
