//! Authenticated data client.
//!
//! Two states, encoded as types:
//!
//! * [`Probe`]: the store is scoped with whatever access token the caller holds
//!   (possibly none) and nothing caller-visible may run yet.
//! * [`Authenticated`]: a cheap existence probe succeeded; selects and inserts go
//!   through the token-scoped store.
//!
//! The only transition is [`Probe::authenticate`]. If the probe reports an expired
//! credential and a refresh token is available, the token pair is exchanged once and
//! the probe retried once. There is no retry loop, and no error other than credential
//! expiry ever triggers a refresh.

use pocketlens_core::SessionTokens;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{IdentityService, TableStore};
use crate::error::{AuthError, SessionError, StoreError};
use crate::query::{Insert, Rows, Select};

/// Table touched by the credential probe
pub const PROBE_TABLE: &str = "transactions";

fn probe_query() -> Select {
    Select::from(PROBE_TABLE).columns("id").limit(1)
}

#[derive(Debug)]
pub struct Probe<S> {
    store: S,
    tokens: SessionTokens,
}

#[derive(Debug)]
pub struct Authenticated<S> {
    store: S,
    tokens: SessionTokens,
    rotated: bool,
}

impl<S: TableStore> Probe<S> {
    /// Scope `base` with the caller's access token (anonymous when absent)
    pub fn new(base: &S, tokens: SessionTokens) -> Self {
        Self {
            store: base.with_bearer(tokens.access_token.as_deref()),
            tokens,
        }
    }

    async fn probe(store: &S) -> Result<(), StoreError> {
        store.select(&probe_query()).await.map(|_| ())
    }

    pub async fn authenticate<I: IdentityService>(self, identity: &I) -> Result<Authenticated<S>, SessionError> {
        match Self::probe(&self.store).await {
            Ok(()) => {
                debug!("credential probe ok");
                return Ok(Authenticated {
                    store: self.store,
                    tokens: self.tokens,
                    rotated: false,
                });
            }
            Err(StoreError::CredentialExpired) => {}
            Err(e) => return Err(e.into()),
        }

        let Some(refresh_token) = self.tokens.refresh_token.as_deref() else {
            warn!("access token expired and no refresh token available");
            return Err(SessionError::Expired);
        };

        info!("access token expired, exchanging refresh token");
        let session = match identity.refresh(refresh_token).await {
            Ok(session) => session,
            Err(AuthError::Rejected { status, message }) => {
                warn!(status, %message, "refresh rejected");
                return Err(SessionError::Expired);
            }
            Err(e) => return Err(e.into()),
        };

        let store = self.store.with_bearer(session.tokens.access_token.as_deref());
        match Self::probe(&store).await {
            Ok(()) => {
                info!(user_id = %session.user.id, "session refreshed");
                Ok(Authenticated {
                    store,
                    tokens: session.tokens,
                    rotated: true,
                })
            }
            Err(StoreError::CredentialExpired) => {
                warn!("refreshed credential still reported expired");
                Err(SessionError::Expired)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<S: TableStore> Authenticated<S> {
    /// Tokens currently in use (the refreshed pair after a rotation)
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// New token pair the caller must persist, if a refresh happened
    pub fn rotated_tokens(&self) -> Option<&SessionTokens> {
        self.rotated.then_some(&self.tokens)
    }

    pub async fn select(&self, query: &Select) -> Result<Rows, StoreError> {
        self.store.select(query).await
    }

    pub async fn insert(&self, insert: &Insert) -> Result<Vec<Value>, StoreError> {
        self.store.insert(insert).await
    }
}

/// Scope `base` with `tokens` and run the probe/refresh transition
pub async fn connect<S: TableStore, I: IdentityService>(
    base: &S,
    identity: &I,
    tokens: SessionTokens,
) -> Result<Authenticated<S>, SessionError> {
    Probe::new(base, tokens).authenticate(identity).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_valid_token_needs_no_refresh() {
        let backend = MemoryBackend::new();
        let u = backend.add_user("u@example.com", "pw");
        let tokens = backend.issue_tokens(&u);

        let client = connect(&backend.store(), &backend.identity(), tokens.clone()).await.unwrap();
        assert!(client.rotated_tokens().is_none());
        assert_eq!(client.tokens(), &tokens);
        assert_eq!(backend.select_calls(), 1);
        assert_eq!(backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_access_token_probes_anonymously() {
        let backend = MemoryBackend::new();
        let client = connect(&backend.store(), &backend.identity(), SessionTokens::default())
            .await
            .unwrap();
        let rows = client.select(&Select::from("transactions")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_probe_errors_other_than_expiry_propagate() {
        let backend = MemoryBackend::new();
        let u = backend.add_user("u@example.com", "pw");
        let tokens = backend.issue_tokens(&u);
        backend.fail_table(PROBE_TABLE, 503, "service unavailable");

        let err = connect(&backend.store(), &backend.identity(), tokens).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::Api { status: 503, .. })));
        assert_eq!(backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_policy_rejection_is_not_expiry() {
        let backend = MemoryBackend::new();
        let tokens = SessionTokens::new("forged", "also-forged");

        let err = connect(&backend.store(), &backend.identity(), tokens).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::Policy { .. })));
        assert_eq!(backend.refresh_calls(), 0);
    }
}
