use serde::Deserialize;
use thiserror::Error;

/// Failures from the table-query path.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The forwarded access token is past its expiry. The only error that triggers a refresh.
    #[error("credential expired")]
    CredentialExpired,
    /// The store refused the operation under its row-level policy. Never read as "no rows".
    #[error("rejected by row-level policy ({status}): {message}")]
    Policy { status: u16, message: String },
    #[error("storage api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid credential header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("unexpected storage response: {0}")]
    Decode(String),
}

/// Failures from the identity service
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service answered and said no (bad password, revoked refresh token, ...)
    #[error("identity service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid credential header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("unexpected identity response: {0}")]
    Decode(String),
}

/// Outcome of establishing an authenticated session for one request
#[derive(Debug, Error)]
pub enum SessionError {
    /// Terminal: the caller must force re-authentication.
    #[error("session expired, please log in again")]
    Expired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] AuthError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid csv: {0:#}")]
    Parse(anyhow::Error),
    #[error("no valid rows found")]
    NoValidRows,
    #[error("category '{0}' was not returned after insert")]
    CategoryNotCreated(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn text(&self, raw: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.msg.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

fn is_expiry_message(text: &str) -> bool {
    text.to_ascii_lowercase().contains("jwt expired")
}

impl StoreError {
    /// Classify a non-success response from the table-query path.
    ///
    /// Only an explicit "JWT expired" message counts as expiry; any other 401/403 is a
    /// policy rejection.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = ApiErrorBody::parse(body);
        let message = parsed.text(body);
        if is_expiry_message(&message) || is_expiry_message(body) {
            return StoreError::CredentialExpired;
        }
        let message = match parsed.code {
            Some(code) => format!("{message} [{}]", code.as_str().map(str::to_string).unwrap_or(code.to_string())),
            None => message,
        };
        match status {
            401 | 403 => StoreError::Policy { status, message },
            _ => StoreError::Api { status, message },
        }
    }

    pub fn is_credential_expired(&self) -> bool {
        matches!(self, StoreError::CredentialExpired)
    }
}

impl AuthError {
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = ApiErrorBody::parse(body).text(body);
        AuthError::Rejected { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_expired_is_credential_expiry() {
        let body = r#"{"code":"PGRST301","details":null,"hint":null,"message":"JWT expired"}"#;
        assert!(StoreError::from_response(401, body).is_credential_expired());
        assert!(StoreError::from_response(401, "JWT expired").is_credential_expired());
    }

    #[test]
    fn test_other_auth_failures_are_policy() {
        let body = r#"{"code":"42501","message":"new row violates row-level security policy for table \"budgets\""}"#;
        match StoreError::from_response(403, body) {
            StoreError::Policy { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("row-level security"));
                assert!(message.contains("42501"));
            }
            other => panic!("expected policy error, got {other:?}"),
        }
        assert!(matches!(
            StoreError::from_response(401, r#"{"message":"JWSError JWSInvalidSignature"}"#),
            StoreError::Policy { status: 401, .. }
        ));
    }

    #[test]
    fn test_server_errors_are_api() {
        match StoreError::from_response(500, "upstream timeout") {
            StoreError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream timeout");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_auth_error_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#;
        match AuthError::from_response(400, body) {
            AuthError::Rejected { message, .. } => assert_eq!(message, "Invalid Refresh Token: Already Used"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
