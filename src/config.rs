use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::paths::database_file_path;

pub const DEFAULT_CATALOG_URL: &str = "https://podcast-api.netlify.app";
pub const DEFAULT_SHARE_ORIGIN: &str = "https://podtrack.app";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_url: String,
    pub supabase: Option<SupabaseConfig>,
    pub share_origin: String,
    pub player_bin: PathBuf,
    pub database_path: PathBuf,
    pub timeouts: HttpTimeouts,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_path = match non_empty(std::env::var_os("PODTRACK_DB")) {
            Some(path) => PathBuf::from(path),
            None => database_file_path()?,
        };
        Ok(Self::from_lookup(
            |key| std::env::var_os(key),
            database_path,
        ))
    }

    pub fn from_lookup<F>(lookup: F, database_path: PathBuf) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let text = |key: &str| {
            non_empty(lookup(key)).map(|value| value.to_string_lossy().trim().to_string())
        };

        let supabase = match (
            text("PODTRACK_SUPABASE_URL"),
            text("PODTRACK_SUPABASE_ANON_KEY"),
        ) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig {
                url: trim_trailing_slash(&url),
                anon_key,
            }),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!(
                    "PODTRACK_SUPABASE_URL and PODTRACK_SUPABASE_ANON_KEY must both be set; favorites disabled"
                );
                None
            }
            (None, None) => None,
        };

        Self {
            catalog_url: trim_trailing_slash(
                &text("PODTRACK_CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            ),
            supabase,
            share_origin: trim_trailing_slash(
                &text("PODTRACK_SHARE_ORIGIN").unwrap_or_else(|| DEFAULT_SHARE_ORIGIN.to_string()),
            ),
            player_bin: resolve_player_bin_from_env(lookup("PODTRACK_PLAYER_BIN")),
            database_path,
            timeouts: HttpTimeouts::default(),
        }
    }
}

pub fn resolve_player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("mpv"),
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|value| !value.to_string_lossy().trim().is_empty())
}

fn trim_trailing_slash(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}
