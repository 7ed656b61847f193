//! Settings shared by the connector and passed unchanged to every migration.
//!
//! The file format is the JSON document the course-management system keeps next
//! to its other settings:
//!
//! ```json
//! {
//!   "database": { "host": "localhost", "user": "submitty_dbuser", "password": "..." },
//!   "extra": { "submitty_data_dir": "/var/local/submitty" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MigrateError, Result};

pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_PORT: u16 = 5432;

pub const DEFAULT_USER: &str = "submitty_dbuser";

/// Name of the system-wide database.
pub const DEFAULT_SYSTEM_DATABASE: &str = "submitty";

/// Course databases are named `<prefix>_<semester>_<course>`.
pub const DEFAULT_COURSE_DATABASE_PREFIX: &str = "submitty";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub system_database: String,
    pub course_database_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_owned(),
            password: String::new(),
            system_database: DEFAULT_SYSTEM_DATABASE.to_owned(),
            course_database_prefix: DEFAULT_COURSE_DATABASE_PREFIX.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,

    /// Free-form settings only migrations look at.
    pub extra: Map<String, Value>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrateError::Config(format!("{}: {e}", path.display())))?;

        Self::from_json(&content)
            .map_err(|e| MigrateError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.database.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.database.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.database.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.database.password = password.into();
        self
    }

    pub fn system_database(mut self, name: impl Into<String>) -> Self {
        self.config.database.system_database = name.into();
        self
    }

    pub fn course_database_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.database.course_database_prefix = prefix.into();
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
