//! Configuration management for source paths, scheduling, and notifications.

use std::{
   fs,
   path::{Path, PathBuf},
   sync::OnceLock,
   time::Duration,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_NOTIFICATION_URL: &str = "https://notifications.airphoto.app";
pub const MAX_INGEST_CONCURRENCY: usize = 64;
pub const MIN_RECHECK_INTERVAL_MS: u64 = 250;

/// Application configuration loaded from config files and environment
/// variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   pub db:     Option<PathBuf>,
   pub assets: Option<PathBuf>,

   pub recheck_interval_ms: u64,
   pub ingest_concurrency:  usize,
   pub frame_timeout_ms:    u64,

   pub notifications:    bool,
   pub notification_url: String,
   pub tokens_file:      Option<PathBuf>,

   pub ffmpeg:  String,
   pub ffprobe: String,
   pub debug:   bool,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         db:                  None,
         assets:              None,
         recheck_interval_ms: 20_000,
         ingest_concurrency:  6,
         frame_timeout_ms:    15_000,
         notifications:       false,
         notification_url:    DEFAULT_NOTIFICATION_URL.to_string(),
         tokens_file:         None,
         ffmpeg:              "ffmpeg".to_string(),
         ffprobe:             "ffprobe".to_string(),
         debug:               false,
      }
   }
}

/// Values supplied on the command line; they take precedence over every
/// other layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
   #[serde(skip_serializing_if = "Option::is_none")]
   pub db:                  Option<PathBuf>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub assets:              Option<PathBuf>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub recheck_interval_ms: Option<u64>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub notifications:       Option<bool>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub debug:               Option<bool>,
}

impl Config {
   /// Loads defaults, the global config file, an optional explicit file,
   /// `ALBUMSYNC_*` environment variables and finally CLI overrides.
   pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
      let mut figment = Figment::from(Serialized::defaults(Self::default()));

      if let Some(global) = ensure_global_config() {
         figment = figment.merge(Toml::file(global));
      }
      if let Some(path) = explicit {
         if !path.exists() {
            return Err(ConfigError::NotFound { key: "config", path: path.to_path_buf() }.into());
         }
         figment = figment.merge(Toml::file(path));
      }

      let config: Self = figment
         .merge(Env::prefixed("ALBUMSYNC_").lowercase(true))
         .merge(Serialized::defaults(overrides))
         .extract()
         .map_err(ConfigError::from)?;
      Ok(config)
   }

   fn create_default_config(path: &Path) {
      if let Some(parent) = path.parent() {
         let _ = fs::create_dir_all(parent);
      }
      if let Ok(toml) = toml::to_string_pretty(&Self::default()) {
         let _ = fs::write(path, toml);
      }
   }

   /// Checks that the mandatory paths exist and the tuning knobs are sane.
   pub fn validate(&self) -> Result<()> {
      let db = self.db.as_ref().ok_or(ConfigError::Missing("db"))?;
      if !db.exists() {
         return Err(ConfigError::NotFound { key: "db", path: db.clone() }.into());
      }
      let assets = self.assets.as_ref().ok_or(ConfigError::Missing("assets"))?;
      if !assets.is_dir() {
         return Err(ConfigError::NotFound { key: "assets", path: assets.clone() }.into());
      }
      if self.ingest_concurrency == 0 || self.ingest_concurrency > MAX_INGEST_CONCURRENCY {
         return Err(
            ConfigError::Invalid {
               key:    "ingest_concurrency",
               reason: format!("must be between 1 and {MAX_INGEST_CONCURRENCY}"),
            }
            .into(),
         );
      }
      if self.recheck_interval_ms < MIN_RECHECK_INTERVAL_MS {
         return Err(
            ConfigError::Invalid {
               key:    "recheck_interval_ms",
               reason: format!("must be at least {MIN_RECHECK_INTERVAL_MS}"),
            }
            .into(),
         );
      }
      Ok(())
   }

   pub fn db_path(&self) -> Result<&Path> {
      Ok(self.db.as_deref().ok_or(ConfigError::Missing("db"))?)
   }

   pub fn assets_path(&self) -> Result<&Path> {
      Ok(self.assets.as_deref().ok_or(ConfigError::Missing("assets"))?)
   }

   pub const fn recheck_interval(&self) -> Duration {
      Duration::from_millis(self.recheck_interval_ms)
   }

   pub const fn frame_timeout(&self) -> Duration {
      Duration::from_millis(self.frame_timeout_ms)
   }

   pub fn effective_tokens_file(&self) -> PathBuf {
      self
         .tokens_file
         .clone()
         .unwrap_or_else(|| base_dir().join("tokens"))
   }
}

/// Returns the base directory for albumsync state and configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| resolve_base_dir(".albumsync"))
}

pub fn config_file_path() -> PathBuf {
   base_dir().join("config.toml")
}

fn ensure_global_config() -> Option<PathBuf> {
   let path = config_file_path();
   if !path.exists() {
      Config::create_default_config(&path);
   }
   path.exists().then_some(path)
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}
