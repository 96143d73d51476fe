//! pocketlens-core: canonical finance records and session types shared by every crate

pub mod finance;
pub mod session;

pub use finance::{CanonicalBudget, CanonicalTransaction, TxnKind};
pub use session::{SessionTokens, UserIdentity};
