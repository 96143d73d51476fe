use anyhow::{Context, Result, bail};
use pocketlens_store::RestConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_pocketlens_home;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendSection,
    pub llm: LlmSection,
    pub upload: UploadSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSection {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Public (anon) key; all user data access is additionally scoped by the session token
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Ask the model for `application/json` output
    pub json_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadSection {
    pub max_bytes: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            json_mode: false,
        }
    }
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Environment wins over the file
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = var(key).filter(|v| !v.trim().is_empty()) {
                *target = v.trim().to_string();
            }
        };
        set(&mut self.backend.url, "SUPABASE_URL");
        set(&mut self.backend.anon_key, "SUPABASE_KEY");
        set(&mut self.llm.model, "GEMINI_MODEL_ID");
        if let Some(key) = var("GOOGLE_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = Some(key.trim().to_string());
        }
    }

    pub fn rest_config(&self) -> Result<RestConfig> {
        if self.backend.url.is_empty() || self.backend.anon_key.is_empty() {
            bail!(
                "backend is not configured; set [backend] url/anon_key in {} or SUPABASE_URL/SUPABASE_KEY",
                config_path()?.display()
            );
        }
        Ok(RestConfig {
            url: self.backend.url.clone(),
            api_key: self.backend.anon_key.clone(),
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_pocketlens_home()?.join("config.toml"))
}

fn load_file_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

/// File config (or defaults) with environment overrides applied
pub fn load_config() -> Result<Config> {
    let mut cfg = load_file_config()?;
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
