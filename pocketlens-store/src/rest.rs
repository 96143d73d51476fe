//! HTTP bindings: PostgREST-style table store (`/rest/v1`) and GoTrue-style
//! identity service (`/auth/v1`), sharing one `reqwest::Client`.

use pocketlens_core::{SessionTokens, UserIdentity};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::backend::{AuthSession, IdentityService, TableStore};
use crate::error::{AuthError, StoreError};
use crate::query::{Insert, Returning, Rows, Select, parse_content_range};

/// Where the backend lives and the project's public (anon) key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
}

impl RestConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    config: RestConfig,
    bearer: Option<String>,
}

impl RestStore {
    pub fn new(http: reqwest::Client, config: RestConfig) -> Self {
        Self {
            http,
            config,
            bearer: None,
        }
    }

    fn table_url(&self, table: &str) -> String {
        self.config.endpoint(&format!("rest/v1/{table}"))
    }

    /// Without a user token the anon key is forwarded; row-level security then
    /// treats the request as anonymous.
    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let token = self.bearer.as_deref().unwrap_or(&self.config.api_key);
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.config.api_key)?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        Ok(headers)
    }
}

async fn error_from(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StoreError::from_response(status, &body)
}

impl TableStore for RestStore {
    fn with_bearer(&self, access_token: Option<&str>) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            bearer: access_token.map(str::to_string),
        }
    }

    async fn select(&self, query: &Select) -> Result<Rows, StoreError> {
        debug!(table = %query.table, "select");
        let mut req = self
            .http
            .get(self.table_url(&query.table))
            .headers(self.headers()?)
            .query(&query.to_query_pairs());
        if query.count_exact {
            req = req.header("Prefer", "count=exact");
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }

        let count = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let data: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("select {}: {e}", query.table)))?;

        Ok(Rows {
            data,
            count: if query.count_exact { count } else { None },
        })
    }

    async fn insert(&self, insert: &Insert) -> Result<Vec<Value>, StoreError> {
        debug!(table = %insert.table, rows = insert.rows.len(), "insert");
        let resp = self
            .http
            .post(self.table_url(&insert.table))
            .headers(self.headers()?)
            .header("Prefer", insert.returning.prefer_header())
            .json(&insert.rows)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }

        match insert.returning {
            Returning::Minimal => Ok(Vec::new()),
            Returning::Representation => resp
                .json()
                .await
                .map_err(|e| StoreError::Decode(format!("insert {}: {e}", insert.table))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestIdentity {
    http: reqwest::Client,
    config: RestConfig,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: UserOut,
}

#[derive(Deserialize)]
struct UserOut {
    id: String,
    email: Option<String>,
}

impl From<TokenResponse> for AuthSession {
    fn from(t: TokenResponse) -> Self {
        AuthSession {
            user: UserIdentity {
                id: t.user.id,
                email: t.user.email,
            },
            tokens: SessionTokens::new(t.access_token, t.refresh_token),
        }
    }
}

impl RestIdentity {
    pub fn new(http: reqwest::Client, config: RestConfig) -> Self {
        Self { http, config }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, AuthError> {
        let resp = self
            .http
            .post(self.config.endpoint(path))
            .header("apikey", HeaderValue::from_str(&self.config.api_key)?)
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::from_response(status, &body));
        }
        Ok(resp)
    }

    async fn token(&self, grant: &str, body: &impl Serialize) -> Result<AuthSession, AuthError> {
        let resp = self
            .post(&format!("auth/v1/token?grant_type={grant}"), body)
            .await?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("token response: {e}")))?;
        Ok(token.into())
    }
}

impl IdentityService for RestIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.token("password", &PasswordGrant { email, password }).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.post("auth/v1/signup", &PasswordGrant { email, password }).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token("refresh_token", &RefreshGrant { refresh_token }).await
    }
}

/// Store and identity bindings built over one shared HTTP client
#[derive(Debug, Clone)]
pub struct RestBackend {
    pub store: RestStore,
    pub identity: RestIdentity,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            store: RestStore::new(http.clone(), config.clone()),
            identity: RestIdentity::new(http, config),
        }
    }
}
