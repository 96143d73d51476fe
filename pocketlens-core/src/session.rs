//! Session credentials handed around per request. The core never persists these.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// The authenticated user all ingested records are attributed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_only_without_any_token() {
        assert!(SessionTokens::default().is_empty());
        assert!(!SessionTokens::access_only("a").is_empty());
        assert!(!SessionTokens {
            access_token: None,
            refresh_token: Some("r".to_string()),
        }
        .is_empty());
    }

    #[test]
    fn test_tokens_roundtrip_missing_fields_as_none() {
        let t: SessionTokens = serde_json::from_str(r#"{"access_token":"a","refresh_token":null}"#).unwrap();
        assert_eq!(t, SessionTokens::access_only("a"));
    }
}
