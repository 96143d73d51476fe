//! Lazy, owner-scoped category lookup-or-create.
//!
//! There is no atomic upsert: two uploads racing on the same new (owner, name) pair
//! can both miss the lookup and both insert. Lookups take the first match, so later
//! reads stay consistent even when a duplicate exists.

use pocketlens_core::TxnKind;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

use crate::backend::TableStore;
use crate::error::ImportError;
use crate::query::{Insert, Returning, Select, value_id};
use crate::session::Authenticated;

pub const CATEGORIES_TABLE: &str = "categories";

/// Resolves category names to ids for one owner within one request.
pub struct CategoryResolver<'a, S> {
    client: &'a Authenticated<S>,
    owner_id: &'a str,
    memo: HashMap<String, String>,
    created: usize,
}

impl<'a, S: TableStore> CategoryResolver<'a, S> {
    pub fn new(client: &'a Authenticated<S>, owner_id: &'a str) -> Self {
        Self {
            client,
            owner_id,
            memo: HashMap::new(),
            created: 0,
        }
    }

    /// Existing id for `name` under this owner, or the id of a newly created
    /// category of `kind`. A category of the same name owned by someone else is
    /// never matched.
    pub async fn resolve(&mut self, name: &str, kind: TxnKind) -> Result<String, ImportError> {
        if let Some(id) = self.memo.get(name) {
            return Ok(id.clone());
        }

        let existing = self
            .client
            .select(
                &Select::from(CATEGORIES_TABLE)
                    .columns("id")
                    .eq("name", name)
                    .eq("user_id", self.owner_id)
                    .limit(1),
            )
            .await?;

        let id = match existing.first_id() {
            Some(id) => id,
            None => {
                let row = json!({
                    "user_id": self.owner_id,
                    "name": name,
                    "type": kind,
                });
                let created = self
                    .client
                    .insert(&Insert::new(CATEGORIES_TABLE, vec![row]).returning(Returning::Representation))
                    .await?;
                let id = created
                    .first()
                    .and_then(value_id)
                    .ok_or_else(|| ImportError::CategoryNotCreated(name.to_string()))?;
                info!(category = %name, %kind, "created category");
                self.created += 1;
                id
            }
        };

        self.memo.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Number of categories this resolver inserted
    pub fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::session::connect;

    async fn client_for(backend: &MemoryBackend, user: &str) -> Authenticated<crate::memory::MemoryStore> {
        let tokens = backend.issue_tokens(user);
        connect(&backend.store(), &backend.identity(), tokens).await.unwrap()
    }

    #[tokio::test]
    async fn test_same_name_twice_creates_once() {
        let backend = MemoryBackend::new();
        let u = backend.add_user("u@example.com", "pw");
        let client = client_for(&backend, &u).await;

        let mut resolver = CategoryResolver::new(&client, &u);
        let first = resolver.resolve("Food", TxnKind::Expense).await.unwrap();
        let second = resolver.resolve("Food", TxnKind::Expense).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.created(), 1);

        // a fresh resolver (next request) finds the stored row instead of inserting
        let mut next_request = CategoryResolver::new(&client, &u);
        assert_eq!(next_request.resolve("Food", TxnKind::Expense).await.unwrap(), first);
        assert_eq!(next_request.created(), 0);
        assert_eq!(backend.rows(CATEGORIES_TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_categories_are_scoped_per_owner() {
        let backend = MemoryBackend::new();
        let alice = backend.add_user("alice@example.com", "pw");
        let bob = backend.add_user("bob@example.com", "pw");
        let alice_client = client_for(&backend, &alice).await;
        let bob_client = client_for(&backend, &bob).await;

        let a = CategoryResolver::new(&alice_client, &alice)
            .resolve("Salary", TxnKind::Income)
            .await
            .unwrap();
        let b = CategoryResolver::new(&bob_client, &bob)
            .resolve("Salary", TxnKind::Income)
            .await
            .unwrap();
        assert_ne!(a, b);

        let rows = backend.rows(CATEGORIES_TABLE);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["type"] == "income"));
    }

    #[tokio::test]
    async fn test_owner_mismatch_is_rejected_not_hidden() {
        let backend = MemoryBackend::new();
        let alice = backend.add_user("alice@example.com", "pw");
        let client = client_for(&backend, &alice).await;

        let err = CategoryResolver::new(&client, "mallory")
            .resolve("Food", TxnKind::Expense)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Store(crate::error::StoreError::Policy { .. })));
    }
}
