//! In-memory table store and identity service with row-level security semantics.
//!
//! Rows are visible only to the user whose access token the store carries (matched
//! on the `user_id` column); inserts for another user are policy rejections. Tokens
//! can be expired on demand and every call is counted, so the session state machine
//! can be exercised without a network.

use pocketlens_core::{SessionTokens, UserIdentity};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{AuthSession, IdentityService, TableStore};
use crate::error::{AuthError, StoreError};
use crate::query::{Filter, Insert, Returning, Rows, Select};

#[derive(Debug, Clone)]
struct MemUser {
    id: String,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    users: Vec<MemUser>,
    access: HashMap<String, String>,
    refresh: HashMap<String, String>,
    expired: HashSet<String>,
    failing: HashMap<String, (u16, String)>,
    next_id: u64,
    select_calls: usize,
    insert_calls: usize,
    refresh_calls: usize,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue(&mut self, user_id: &str) -> SessionTokens {
        let n = self.next();
        let tokens = SessionTokens::new(format!("access-{n}"), format!("refresh-{n}"));
        if let (Some(a), Some(r)) = (&tokens.access_token, &tokens.refresh_token) {
            self.access.insert(a.clone(), user_id.to_string());
            self.refresh.insert(r.clone(), user_id.to_string());
        }
        tokens
    }

    fn identity(&self, user_id: &str) -> UserIdentity {
        let email = self.users.iter().find(|u| u.id == user_id).map(|u| u.email.clone());
        UserIdentity {
            id: user_id.to_string(),
            email,
        }
    }

    /// Resolve the caller. `Ok(None)` is anonymous.
    fn caller(&self, bearer: Option<&str>) -> Result<Option<String>, StoreError> {
        let Some(token) = bearer else {
            return Ok(None);
        };
        if self.expired.contains(token) {
            return Err(StoreError::CredentialExpired);
        }
        match self.access.get(token) {
            Some(user) => Ok(Some(user.clone())),
            None => Err(StoreError::Policy {
                status: 401,
                message: "invalid JWT".to_string(),
            }),
        }
    }

    fn check_failing(&self, table: &str) -> Result<(), StoreError> {
        match self.failing.get(table) {
            Some((status, message)) => Err(StoreError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn visible<'a>(&'a self, table: &'a str, user: Option<&'a str>) -> impl Iterator<Item = &'a Value> + 'a {
        self.tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(move |row| user.is_some() && row.get("user_id").and_then(Value::as_str) == user)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-memory backend; hand out [`MemoryStore`] and [`MemoryIdentity`] views.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> MemoryStore {
        MemoryStore {
            state: Arc::clone(&self.state),
            bearer: None,
        }
    }

    pub fn identity(&self) -> MemoryIdentity {
        MemoryIdentity {
            state: Arc::clone(&self.state),
        }
    }

    /// Register a user and return their id
    pub fn add_user(&self, email: &str, password: &str) -> String {
        let mut s = lock(&self.state);
        let id = format!("user-{}", s.next());
        s.users.push(MemUser {
            id: id.clone(),
            email: email.to_string(),
            password: password.to_string(),
        });
        id
    }

    /// Issue a fresh token pair for an existing user
    pub fn issue_tokens(&self, user_id: &str) -> SessionTokens {
        lock(&self.state).issue(user_id)
    }

    /// Make an access token report "credential expired" from now on
    pub fn expire(&self, access_token: &str) {
        lock(&self.state).expired.insert(access_token.to_string());
    }

    /// Revoke a refresh token so exchanging it is rejected
    pub fn revoke_refresh(&self, refresh_token: &str) {
        lock(&self.state).refresh.remove(refresh_token);
    }

    /// Make every call touching `table` fail with a server error
    pub fn fail_table(&self, table: &str, status: u16, message: &str) {
        lock(&self.state)
            .failing
            .insert(table.to_string(), (status, message.to_string()));
    }

    /// Seed rows directly, bypassing row-level security
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut s = lock(&self.state);
        for mut row in rows {
            if row.get("id").is_none() {
                let id = format!("{table}-{}", s.next());
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(id));
                }
            }
            s.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    /// Every row of a table regardless of owner
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.state).tables.get(table).cloned().unwrap_or_default()
    }

    pub fn select_calls(&self) -> usize {
        lock(&self.state).select_calls
    }

    pub fn insert_calls(&self) -> usize {
        lock(&self.state).insert_calls
    }

    pub fn refresh_calls(&self) -> usize {
        lock(&self.state).refresh_calls
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    bearer: Option<String>,
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn cell_matches(cell: Option<&Value>, wanted: &str, ordering: &[Ordering]) -> bool {
    let Some(cell) = cell else {
        return false;
    };
    let ord = match cell {
        Value::Number(n) => match (n.as_f64(), wanted.parse::<f64>()) {
            (Some(x), Ok(y)) => x.partial_cmp(&y),
            _ => None,
        },
        Value::String(s) => Some(s.as_str().cmp(wanted)),
        Value::Bool(b) => Some(b.to_string().as_str().cmp(wanted)),
        _ => None,
    };
    ord.is_some_and(|o| ordering.contains(&o))
}

fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq { column, value } => cell_matches(row.get(column), value, &[Ordering::Equal]),
        Filter::Gte { column, value } => {
            cell_matches(row.get(column), value, &[Ordering::Equal, Ordering::Greater])
        }
    })
}

/// Split a projection on top-level commas: `id,categories(name,type)` → [`id`, `categories(name,type)`]
fn split_columns(columns: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in columns.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(columns[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(columns[start..].trim());
    out.retain(|c| !c.is_empty());
    out
}

/// `categories(name)` → (`categories`, `name`)
fn embedded(column: &str) -> Option<(&str, &str)> {
    let (rel, rest) = column.split_once('(')?;
    Some((rel.trim(), rest.strip_suffix(')')?.trim()))
}

/// Foreign key column for a one-hop relation: `categories` → `category_id`
fn foreign_key(relation: &str) -> String {
    let singular = match relation.strip_suffix("ies") {
        Some(stem) => format!("{stem}y"),
        None => relation.strip_suffix('s').unwrap_or(relation).to_string(),
    };
    format!("{singular}_id")
}

fn project(state: &State, row: &Value, columns: &str, user: Option<&str>) -> Value {
    let mut out = Map::new();
    for col in split_columns(columns) {
        if col == "*" {
            if let Some(obj) = row.as_object() {
                out.extend(obj.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            continue;
        }
        if let Some((rel, inner)) = embedded(col) {
            let fk = row.get(foreign_key(rel));
            let target = fk.and_then(|fk| {
                state
                    .visible(rel, user)
                    .find(|r| r.get("id") == Some(fk))
            });
            let value = target.map_or(Value::Null, |t| project(state, t, inner, user));
            out.insert(rel.to_string(), value);
            continue;
        }
        out.insert(col.to_string(), row.get(col).cloned().unwrap_or(Value::Null));
    }
    Value::Object(out)
}

fn sort_key<'a>(row: &'a Value, column: &str) -> &'a Value {
    let found = match embedded(column) {
        Some((rel, inner)) => row.get(rel).and_then(|r| r.get(inner)),
        None => row.get(column),
    };
    found.unwrap_or(&Value::Null)
}

impl TableStore for MemoryStore {
    fn with_bearer(&self, access_token: Option<&str>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            bearer: access_token.map(str::to_string),
        }
    }

    async fn select(&self, query: &Select) -> Result<Rows, StoreError> {
        let mut s = lock(&self.state);
        s.select_calls += 1;
        let user = s.caller(self.bearer.as_deref())?;
        s.check_failing(&query.table)?;

        let matching: Vec<&Value> = s
            .visible(&query.table, user.as_deref())
            .filter(|row| row_matches(row, &query.filters))
            .collect();
        let count = query.count_exact.then_some(matching.len() as u64);

        let mut data: Vec<Value> = matching
            .into_iter()
            .map(|row| project(&s, row, &query.columns, user.as_deref()))
            .collect();
        for order in query.order.iter().rev() {
            data.sort_by(|a, b| {
                let ord = compare(sort_key(a, &order.column), sort_key(b, &order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(n) = query.limit {
            data.truncate(n);
        }

        Ok(Rows { data, count })
    }

    async fn insert(&self, insert: &Insert) -> Result<Vec<Value>, StoreError> {
        let mut s = lock(&self.state);
        s.insert_calls += 1;
        let user = s.caller(self.bearer.as_deref())?;
        s.check_failing(&insert.table)?;

        let policy_violation = || StoreError::Policy {
            status: 403,
            message: format!(
                "new row violates row-level security policy for table \"{}\"",
                insert.table
            ),
        };
        let Some(user) = user else {
            return Err(policy_violation());
        };
        if insert
            .rows
            .iter()
            .any(|r| r.get("user_id").and_then(Value::as_str) != Some(user.as_str()))
        {
            return Err(policy_violation());
        }

        let mut stored = Vec::with_capacity(insert.rows.len());
        for row in &insert.rows {
            let Some(obj) = row.as_object() else {
                return Err(StoreError::Api {
                    status: 400,
                    message: "rows must be JSON objects".to_string(),
                });
            };
            let mut obj = obj.clone();
            if !obj.contains_key("id") {
                let id = format!("{}-{}", insert.table, s.next());
                obj.insert("id".to_string(), Value::String(id));
            }
            stored.push(Value::Object(obj));
        }
        s.tables
            .entry(insert.table.clone())
            .or_default()
            .extend(stored.iter().cloned());

        Ok(match insert.returning {
            Returning::Minimal => Vec::new(),
            Returning::Representation => stored,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryIdentity {
    state: Arc<Mutex<State>>,
}

impl IdentityService for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let mut s = lock(&self.state);
        let user = s
            .users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .cloned()
            .ok_or_else(|| AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;
        let tokens = s.issue(&user.id);
        Ok(AuthSession {
            user: s.identity(&user.id),
            tokens,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let mut s = lock(&self.state);
        if s.users.iter().any(|u| u.email == email) {
            return Err(AuthError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let id = format!("user-{}", s.next());
        s.users.push(MemUser {
            id,
            email: email.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let mut s = lock(&self.state);
        s.refresh_calls += 1;
        let user_id = s.refresh.remove(refresh_token).ok_or_else(|| AuthError::Rejected {
            status: 400,
            message: "Invalid Refresh Token".to_string(),
        })?;
        let tokens = s.issue(&user_id);
        Ok(AuthSession {
            user: s.identity(&user_id),
            tokens,
        })
    }
}
