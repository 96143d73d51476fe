//! pocketlens-store: session-bound data access over a row-level-secured table store.
//!
//! Every user-initiated read and write goes through a [`TableStore`] scoped with the
//! caller's bearer credential; the backing store enforces per-user row access. The
//! [`session`] module wraps that store in a probe → authenticated state machine that
//! performs at most one transparent credential refresh per request.

pub mod error;
pub mod query;
pub mod backend;
pub mod rest;
pub mod memory;
pub mod shared;
pub mod session;
pub mod categories;
pub mod import;
pub mod summary;

pub use backend::{AuthSession, IdentityService, TableStore};
pub use categories::CategoryResolver;
pub use error::{AuthError, ImportError, SessionError, StoreError};
pub use import::{ImportReport, import_budgets, import_transactions, store_budgets, store_transactions};
pub use memory::{MemoryBackend, MemoryIdentity, MemoryStore};
pub use query::{Insert, Returning, Rows, Select};
pub use rest::{RestBackend, RestConfig, RestIdentity, RestStore};
pub use session::{Authenticated, Probe, connect};
pub use shared::{DEFAULT_CLIENT_TTL, SharedHandle};
pub use summary::{ChatContext, Dashboard, load_chat_context, load_dashboard};
