use anyhow::{Context, Result};
use pocketlens_core::{SessionTokens, UserIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub fn pocketlens_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".pocketlens"))
}

pub fn ensure_pocketlens_home() -> Result<PathBuf> {
    let dir = pocketlens_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Who is logged in and the credential pair to present on the next request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedSession {
    pub user: UserIdentity,
    pub tokens: SessionTokens,
}

pub fn session_path() -> Result<PathBuf> {
    Ok(ensure_pocketlens_home()?.join("session.json"))
}

pub fn read_session(path: &Path) -> Result<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let session = serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(session))
}

pub fn write_session(path: &Path, session: &SavedSession) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_session() -> Result<Option<SavedSession>> {
    read_session(&session_path()?)
}

pub fn save_session(session: &SavedSession) -> Result<()> {
    write_session(&session_path()?, session)
}

/// Forget the saved session. Returns whether there was one.
pub fn clear_session() -> Result<bool> {
    let p = session_path()?;
    if !p.exists() {
        return Ok(false);
    }
    fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
    Ok(true)
}
