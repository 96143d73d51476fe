use pocketlens_core::SessionTokens;
use pocketlens_store::{MemoryBackend, Select, SessionError, StoreError, connect};

fn user_with_tokens(backend: &MemoryBackend) -> (String, SessionTokens) {
    let u = backend.add_user("u@example.com", "pw");
    let tokens = backend.issue_tokens(&u);
    (u, tokens)
}

#[tokio::test]
async fn expired_access_without_refresh_token_fails_after_one_probe() {
    let backend = MemoryBackend::new();
    let (_, tokens) = user_with_tokens(&backend);
    let access = tokens.access_token.clone().unwrap();
    backend.expire(&access);

    let err = connect(&backend.store(), &backend.identity(), SessionTokens::access_only(access))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Expired));
    assert_eq!(backend.select_calls(), 1);
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn expired_access_is_refreshed_once_and_probe_retried_once() {
    let backend = MemoryBackend::new();
    let (u, tokens) = user_with_tokens(&backend);
    backend.seed(
        "transactions",
        vec![serde_json::json!({"user_id": &u, "date": "2024-01-05", "amount": 100.0, "type": "income"})],
    );
    backend.expire(tokens.access_token.as_deref().unwrap());

    let client = connect(&backend.store(), &backend.identity(), tokens.clone()).await.unwrap();

    assert_eq!(backend.select_calls(), 2);
    assert_eq!(backend.refresh_calls(), 1);

    let rotated = client.rotated_tokens().expect("refresh should rotate tokens").clone();
    assert_ne!(rotated.access_token, tokens.access_token);
    assert_ne!(rotated.refresh_token, tokens.refresh_token);
    assert_eq!(client.tokens(), &rotated);

    // later calls in the same request use the refreshed credential
    let rows = client.select(&Select::from("transactions")).await.unwrap();
    assert_eq!(rows.data.len(), 1);
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn rejected_refresh_is_terminal() {
    let backend = MemoryBackend::new();
    let (_, tokens) = user_with_tokens(&backend);
    backend.expire(tokens.access_token.as_deref().unwrap());
    backend.revoke_refresh(tokens.refresh_token.as_deref().unwrap());

    let err = connect(&backend.store(), &backend.identity(), tokens).await.unwrap_err();

    assert!(matches!(err, SessionError::Expired));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.select_calls(), 1);
}

#[tokio::test]
async fn refreshed_token_still_expired_does_not_loop() {
    let backend = MemoryBackend::new();
    // ids come from one counter: user-1, then access-2/refresh-2, then the refresh issues access-3
    let (_, tokens) = user_with_tokens(&backend);
    assert_eq!(tokens.access_token.as_deref(), Some("access-2"));
    backend.expire("access-2");
    backend.expire("access-3");

    let err = connect(&backend.store(), &backend.identity(), tokens).await.unwrap_err();

    assert!(matches!(err, SessionError::Expired));
    assert_eq!(backend.select_calls(), 2);
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn retry_probe_failure_other_than_expiry_propagates() {
    let backend = MemoryBackend::new();
    let (_, tokens) = user_with_tokens(&backend);
    backend.expire(tokens.access_token.as_deref().unwrap());
    // credential check runs before the table check, so only the retried probe sees the outage
    backend.fail_table("transactions", 503, "service unavailable");

    let err = connect(&backend.store(), &backend.identity(), tokens).await.unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Api { status: 503, .. })));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.select_calls(), 2);
}
