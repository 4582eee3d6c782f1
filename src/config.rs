use crate::claims::TokenSource;
use crate::service::ExistencePolicy;
use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the caller's token is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer`, falling back to the auth cookie
    #[default]
    Bearer,
    /// A custom header holding the bare token
    Header,
    /// The auth cookie only
    Cookie,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CdnBackend {
    /// In-process provider, useful for development and tests
    #[default]
    Memory,
}

/// Main configuration structure that can be loaded from CLI or a config file
///
/// Example configuration file content
/// # CDN validator configuration
///
/// listen_address = "0.0.0.0:8080"
/// entitlements_file = "/etc/cdn-validator/config.yaml"
///
/// # Token discovery: "bearer", "header" or "cookie"
/// auth_mode = "bearer"
/// auth_cookie = "auth_token"
///
/// cdn_backend = "memory"
/// cdn_timeout_secs = 30
///
/// # "reveal" or "hide" distributions the caller is not entitled to
/// existence_policy = "reveal"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Where to look for the caller's token
    #[arg(long, value_enum, default_value_t = AuthMode::Bearer)]
    pub auth_mode: AuthMode,

    /// Cookie carrying the token in bearer and cookie modes
    #[arg(long, default_value = "auth_token")]
    #[serde(default = "default_auth_cookie")]
    pub auth_cookie: String,

    /// Header carrying the token in header mode
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,

    /// Distribution and entitlement document, reloaded on change
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements_file: Option<PathBuf>,

    /// CDN provider backend
    #[arg(long, value_enum, default_value_t = CdnBackend::Memory)]
    pub cdn_backend: CdnBackend,

    /// Deadline for each CDN provider call, in seconds
    #[arg(long, default_value_t = 30)]
    #[serde(default = "default_cdn_timeout_secs")]
    pub cdn_timeout_secs: u64,

    /// How to answer for distributions the caller may not use
    #[arg(long, value_enum, default_value_t = ExistencePolicy::Reveal)]
    pub existence_policy: ExistencePolicy,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            auth_mode: AuthMode::default(),
            auth_cookie: default_auth_cookie(),
            auth_header: None,
            entitlements_file: None,
            cdn_backend: CdnBackend::default(),
            cdn_timeout_secs: default_cdn_timeout_secs(),
            existence_policy: ExistencePolicy::default(),
            log_level: default_log_level(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_address == default_listen_address() {
            self.listen_address = file_config.listen_address;
        }
        if self.auth_mode == AuthMode::default() {
            self.auth_mode = file_config.auth_mode;
        }
        if self.auth_cookie == default_auth_cookie() {
            self.auth_cookie = file_config.auth_cookie;
        }
        if self.cdn_backend == CdnBackend::default() {
            self.cdn_backend = file_config.cdn_backend;
        }
        if self.cdn_timeout_secs == default_cdn_timeout_secs() {
            self.cdn_timeout_secs = file_config.cdn_timeout_secs;
        }
        if self.existence_policy == ExistencePolicy::default() {
            self.existence_policy = file_config.existence_policy;
        }
        if self.log_level == default_log_level() {
            self.log_level = file_config.log_level;
        }

        // For Option fields, CLI takes precedence if Some
        if self.auth_header.is_none() {
            self.auth_header = file_config.auth_header;
        }
        if self.entitlements_file.is_none() {
            self.entitlements_file = file_config.entitlements_file;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.entitlements_file.is_none() {
            return Err(anyhow::anyhow!("An entitlements file is required"));
        }

        match self.auth_mode {
            AuthMode::Header => {
                let header = self
                    .auth_header
                    .as_deref()
                    .filter(|header| !header.is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("An auth header name is required when auth mode is 'header'")
                    })?;
                HeaderName::from_bytes(header.as_bytes())
                    .with_context(|| format!("Invalid auth header name: {header}"))?;
            }
            AuthMode::Bearer | AuthMode::Cookie => {
                if self.auth_cookie.is_empty() {
                    return Err(anyhow::anyhow!("Auth cookie name cannot be empty"));
                }
            }
        }

        if self.cdn_timeout_secs == 0 {
            return Err(anyhow::anyhow!("CDN timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Token discovery for the claim middleware
    pub fn token_source(&self) -> TokenSource {
        match self.auth_mode {
            AuthMode::Bearer => TokenSource::Bearer {
                cookie: self.auth_cookie.clone(),
            },
            AuthMode::Header => TokenSource::Header(self.auth_header.clone().unwrap_or_default()),
            AuthMode::Cookie => TokenSource::Cookie(self.auth_cookie.clone()),
        }
    }

    pub fn cdn_timeout(&self) -> Duration {
        Duration::from_secs(self.cdn_timeout_secs)
    }
}

// Default value functions
fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_auth_cookie() -> String {
    "auth_token".to_string()
}

fn default_cdn_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}
