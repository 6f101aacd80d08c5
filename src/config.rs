use anyhow::{Context, Result};

pub const DEFAULT_BASE_URL: &str = "https://notehub-public.goit.study/api";

pub struct Config {
    pub base_url: String,
    pub token: String,
}

impl Config {
    /// Resolve configuration from the environment.
    ///
    /// Called before the terminal enters raw mode so a missing token is
    /// reported as a plain startup error instead of garbling the screen.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("NOTEHUB_TOKEN")
            .context("NOTEHUB_TOKEN is not set. Export a NoteHub API token and try again.")?;
        if token.trim().is_empty() {
            anyhow::bail!("NOTEHUB_TOKEN is empty. Export a NoteHub API token and try again.");
        }
        let base_url = std::env::var("NOTEHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Config { base_url, token })
    }
}
