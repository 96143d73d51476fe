use anyhow::{Context, Result, bail};
use pocketlens_store::{Authenticated, IdentityService, RestBackend, RestStore, SessionError, connect};
use std::io::{self, Write};
use tracing::info;

use crate::state::{self, SavedSession};

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

// Plain stdin; the input is echoed.
fn prompt_secret(label: &str) -> Result<String> {
    prompt_line(label)
}

fn prompt_credentials(email: Option<String>) -> Result<(String, String)> {
    let email = match email {
        Some(e) => e,
        None => prompt_line("Email")?,
    };
    let password = prompt_secret("Password")?;
    if email.is_empty() || password.is_empty() {
        bail!("email and password are required");
    }
    Ok((email, password))
}

pub async fn login(backend: &RestBackend, email: Option<String>) -> Result<()> {
    let (email, password) = prompt_credentials(email)?;
    let session = backend
        .identity
        .sign_in(&email, &password)
        .await
        .context("login failed")?;

    let saved = SavedSession {
        user: session.user,
        tokens: session.tokens,
    };
    state::save_session(&saved)?;
    info!(user_id = %saved.user.id, "logged in");
    println!("Logged in as {}", saved.user.email.as_deref().unwrap_or(&email));
    Ok(())
}

pub async fn register(backend: &RestBackend, email: Option<String>) -> Result<()> {
    let (email, password) = prompt_credentials(email)?;
    backend
        .identity
        .sign_up(&email, &password)
        .await
        .context("registration failed")?;
    println!("Registered {email}. Confirm the address if asked, then run: pocketlens auth login");
    Ok(())
}

pub fn logout() -> Result<()> {
    if state::clear_session()? {
        println!("Logged out");
    } else {
        println!("No saved session");
    }
    Ok(())
}

/// Authenticated client for the saved session.
///
/// Rotated tokens are written back before returning. An expired session is cleared
/// so the next command starts from a clean login.
pub async fn session_client(backend: &RestBackend) -> Result<(SavedSession, Authenticated<RestStore>)> {
    let Some(mut saved) = state::load_session()?.filter(|s| !s.tokens.is_empty()) else {
        bail!("not logged in; run: pocketlens auth login");
    };

    let client = match connect(&backend.store, &backend.identity, saved.tokens.clone()).await {
        Ok(client) => client,
        Err(SessionError::Expired) => {
            state::clear_session()?;
            bail!("session expired, please log in again: pocketlens auth login");
        }
        Err(e) => return Err(e).context("connect to backend"),
    };

    if let Some(rotated) = client.rotated_tokens() {
        saved.tokens = rotated.clone();
        state::save_session(&saved)?;
        info!(user_id = %saved.user.id, "saved refreshed session");
    }

    Ok((saved, client))
}
