//! Application configuration: compile-time constants and a SQLite-backed
//! settings store for the OAuth client.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use thiserror::Error;

/// Subscriber count the countdown runs to
pub const TARGET_COUNT: u64 = 100_000;
/// Length of the trailing daily-gain window, in days
pub const WINDOW_DAYS: u64 = 30;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/yt-analytics.readonly",
];

pub const DISCOVERY_DOCS: [&str; 2] = [
    "https://www.googleapis.com/discovery/v1/apis/youtube/v3/rest",
    "https://www.googleapis.com/discovery/v1/apis/youtubeAnalytics/v2/rest",
];

pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

pub const KEY_CLIENT_ID: &str = "client_id";
pub const KEY_CLIENT_SECRET: &str = "client_secret";
pub const KEY_API_KEY: &str = "api_key";
pub const KEY_NO_BROWSER: &str = "no_browser";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Missing setting: {0}")]
    Missing(&'static str),
}

pub struct AppConfig {
    conn: Mutex<Connection>,
}

impl AppConfig {
    /// Create the settings table in an existing database connection
    pub fn init_table(conn: &Connection) -> Result<(), ConfigError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Open (or create) the settings database at `path`
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let conn = Connection::open(path)?;
        Self::init_table(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open standalone in-memory config (for testing)
    pub fn open_in_memory() -> Result<Self, ConfigError> {
        let conn = Connection::open_in_memory()?;
        Self::init_table(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection (config table must already be initialized)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let result = self.conn().query_row(
            "SELECT value FROM app_config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        let ret = match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ConfigError::Database(e)),
        };
        tracing::debug!(key = %key, found = ret.as_ref().ok().and_then(|v| v.as_ref()).is_some(), "Config get");
        ret
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        tracing::debug!(key = %key, "Config set");
        let now = chrono::Utc::now().timestamp();
        self.conn().execute(
            "INSERT OR REPLACE INTO app_config (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), ConfigError> {
        tracing::debug!(key = %key, "Config delete");
        self.conn()
            .execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        Ok(self.get(key)?.map(|v| v == "true").unwrap_or(false))
    }
}

/// OAuth client settings plus the fixed provider constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub api_key: String,
    pub scopes: Vec<String>,
    pub discovery_docs: Vec<String>,
    pub target_count: u64,
    pub window_days: u64,
    /// Launch the system browser for consent; otherwise only print the URL
    pub open_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: PLACEHOLDER_CLIENT_ID.to_string(),
            client_secret: None,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            discovery_docs: DISCOVERY_DOCS.iter().map(|s| s.to_string()).collect(),
            target_count: TARGET_COUNT,
            window_days: WINDOW_DAYS,
            open_browser: true,
        }
    }
}

impl Settings {
    /// Resolve settings from the store, falling back to placeholders
    pub fn load(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(id) = config.get(KEY_CLIENT_ID)?.filter(|v| !v.is_empty()) {
            settings.client_id = id;
        }
        if let Some(key) = config.get(KEY_API_KEY)?.filter(|v| !v.is_empty()) {
            settings.api_key = key;
        }
        settings.client_secret = config.get(KEY_CLIENT_SECRET)?.filter(|v| !v.is_empty());
        settings.open_browser = !config.get_bool(KEY_NO_BROWSER)?;
        Ok(settings)
    }

    /// Reject placeholder credentials before talking to the provider
    pub fn ensure_configured(&self) -> Result<(), ConfigError> {
        if self.client_id == PLACEHOLDER_CLIENT_ID {
            return Err(ConfigError::Missing(KEY_CLIENT_ID));
        }
        if self.api_key == PLACEHOLDER_API_KEY {
            return Err(ConfigError::Missing(KEY_API_KEY));
        }
        Ok(())
    }
}
