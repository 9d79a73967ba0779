//! Startup configuration for the server binary.
//!
//! Values are layered, later layers winning: built-in defaults, an optional
//! TOML file (`--config` or `PAIRS_CONFIG`), `PAIRS_*` environment
//! variables, then command line flags.

use crate::settings::{AppSettings, MAX_PAIRS};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Longest flip-back delay accepted; anything above makes the board unplayable.
pub const MAX_FLIP_BACK_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "pairs-web-server", version, about = "Pairs memory game web server")]
pub struct ServerArgs {
    /// TOML configuration file
    #[arg(long, short = 'c', env = "PAIRS_CONFIG")]
    pub config: Option<PathBuf>,
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind to
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
    /// Directory holding index.html, app.js and style.css
    #[arg(long, short = 'd')]
    pub static_dir: Option<PathBuf>,
    /// Pairs on the board for new sessions
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_PAIRS as u64))]
    pub pairs: Option<u64>,
    /// Mismatches allowed for new sessions
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,
    /// How long a mismatched pair stays visible, in milliseconds
    #[arg(long)]
    pub flip_back_delay_ms: Option<u64>,
    #[arg(long)]
    pub session_timeout_minutes: Option<u64>,
    /// Append one JSON line per evaluated turn to this file
    #[arg(long)]
    pub turn_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub default_pairs: usize,
    pub default_max_attempts: u32,
    pub flip_back_delay_ms: u64,
    pub session_timeout_minutes: u64,
    pub turn_log: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let app = AppSettings::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: None,
            default_pairs: app.default_pairs,
            default_max_attempts: app.default_max_attempts,
            flip_back_delay_ms: 450,
            session_timeout_minutes: app.session_timeout_minutes,
            turn_log: None,
        }
    }
}

impl ServerSettings {
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            default_pairs: self.default_pairs,
            default_max_attempts: self.default_max_attempts,
            session_timeout_minutes: self.session_timeout_minutes,
        }
    }

    pub fn flip_back_delay(&self) -> Duration {
        Duration::from_millis(self.flip_back_delay_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.app_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.flip_back_delay_ms > MAX_FLIP_BACK_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "flip_back_delay_ms must be at most {MAX_FLIP_BACK_DELAY_MS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
    Cli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigSources {
    pub host: ValueSource,
    pub port: ValueSource,
    pub static_dir: ValueSource,
    pub default_pairs: ValueSource,
    pub default_max_attempts: ValueSource,
    pub flip_back_delay_ms: ValueSource,
    pub session_timeout_minutes: ValueSource,
    pub turn_log: ValueSource,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            host: ValueSource::Default,
            port: ValueSource::Default,
            static_dir: ValueSource::Default,
            default_pairs: ValueSource::Default,
            default_max_attempts: ValueSource::Default,
            flip_back_delay_ms: ValueSource::Default,
            session_timeout_minutes: ValueSource::Default,
            turn_log: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub settings: ServerSettings,
    pub sources: ConfigSources,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    static_dir: Option<PathBuf>,
    #[serde(default)]
    default_pairs: Option<usize>,
    #[serde(default)]
    default_max_attempts: Option<u32>,
    #[serde(default)]
    flip_back_delay_ms: Option<u64>,
    #[serde(default)]
    session_timeout_minutes: Option<u64>,
    #[serde(default)]
    turn_log: Option<PathBuf>,
}

/// Resolves settings against the process environment.
pub fn load(args: &ServerArgs) -> Result<ConfigResolved, ConfigError> {
    load_with_env(args, |key| std::env::var(key).ok())
}

/// Resolves settings with `env` standing in for the process environment.
pub fn load_with_env<F>(args: &ServerArgs, env: F) -> Result<ConfigResolved, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = ServerSettings::default();
    let mut sources = ConfigSources::default();

    if let Some(path) = &args.config {
        let text = fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&text)?;
        apply_file(&mut cfg, &mut sources, file);
    }

    apply_env(&mut cfg, &mut sources, &env)?;
    apply_args(&mut cfg, &mut sources, args);

    cfg.validate()?;
    Ok(ConfigResolved {
        settings: cfg,
        sources,
    })
}

fn apply_file(cfg: &mut ServerSettings, sources: &mut ConfigSources, file: FileConfig) {
    if let Some(v) = file.host {
        cfg.host = v;
        sources.host = ValueSource::File;
    }
    if let Some(v) = file.port {
        cfg.port = v;
        sources.port = ValueSource::File;
    }
    if let Some(v) = file.static_dir {
        cfg.static_dir = Some(v);
        sources.static_dir = ValueSource::File;
    }
    if let Some(v) = file.default_pairs {
        cfg.default_pairs = v;
        sources.default_pairs = ValueSource::File;
    }
    if let Some(v) = file.default_max_attempts {
        cfg.default_max_attempts = v;
        sources.default_max_attempts = ValueSource::File;
    }
    if let Some(v) = file.flip_back_delay_ms {
        cfg.flip_back_delay_ms = v;
        sources.flip_back_delay_ms = ValueSource::File;
    }
    if let Some(v) = file.session_timeout_minutes {
        cfg.session_timeout_minutes = v;
        sources.session_timeout_minutes = ValueSource::File;
    }
    if let Some(v) = file.turn_log {
        cfg.turn_log = Some(v);
        sources.turn_log = ValueSource::File;
    }
}

fn apply_env<F>(
    cfg: &mut ServerSettings,
    sources: &mut ConfigSources,
    env: &F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(v) = var("PAIRS_HOST") {
        cfg.host = v;
        sources.host = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_PORT") {
        cfg.port = parse_env("PAIRS_PORT", &v)?;
        sources.port = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_STATIC_DIR") {
        cfg.static_dir = Some(PathBuf::from(v));
        sources.static_dir = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_DEFAULT_PAIRS") {
        cfg.default_pairs = parse_env("PAIRS_DEFAULT_PAIRS", &v)?;
        sources.default_pairs = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_DEFAULT_MAX_ATTEMPTS") {
        cfg.default_max_attempts = parse_env("PAIRS_DEFAULT_MAX_ATTEMPTS", &v)?;
        sources.default_max_attempts = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_FLIP_BACK_DELAY_MS") {
        cfg.flip_back_delay_ms = parse_env("PAIRS_FLIP_BACK_DELAY_MS", &v)?;
        sources.flip_back_delay_ms = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_SESSION_TIMEOUT_MINUTES") {
        cfg.session_timeout_minutes = parse_env("PAIRS_SESSION_TIMEOUT_MINUTES", &v)?;
        sources.session_timeout_minutes = ValueSource::Env;
    }
    if let Some(v) = var("PAIRS_TURN_LOG") {
        cfg.turn_log = Some(PathBuf::from(v));
        sources.turn_log = ValueSource::Env;
    }
    Ok(())
}

fn apply_args(cfg: &mut ServerSettings, sources: &mut ConfigSources, args: &ServerArgs) {
    if let Some(v) = &args.host {
        cfg.host = v.clone();
        sources.host = ValueSource::Cli;
    }
    if let Some(v) = args.port {
        cfg.port = v;
        sources.port = ValueSource::Cli;
    }
    if let Some(v) = &args.static_dir {
        cfg.static_dir = Some(v.clone());
        sources.static_dir = ValueSource::Cli;
    }
    if let Some(v) = args.pairs {
        cfg.default_pairs = v as usize;
        sources.default_pairs = ValueSource::Cli;
    }
    if let Some(v) = args.max_attempts {
        cfg.default_max_attempts = v;
        sources.default_max_attempts = ValueSource::Cli;
    }
    if let Some(v) = args.flip_back_delay_ms {
        cfg.flip_back_delay_ms = v;
        sources.flip_back_delay_ms = ValueSource::Cli;
    }
    if let Some(v) = args.session_timeout_minutes {
        cfg.session_timeout_minutes = v;
        sources.session_timeout_minutes = ValueSource::Cli;
    }
    if let Some(v) = &args.turn_log {
        cfg.turn_log = Some(v.clone());
        sources.turn_log = ValueSource::Cli;
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}: cannot parse {value:?}")))
}
