//! Runtime configuration: environment variables, entity definition files,
//! and backend connections. Used by binaries embedding the library; tests
//! and embedders with their own wiring can skip this entirely.

use crate::descriptor::EntityDefinition;
use crate::error::ConfigError;
use crate::registry::{StorageBackends, DEFAULT_CHUNK_SIZE};
use crate::state::PageDefaults;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use std::path::Path;

/// Environment-driven settings. Every backend is optional; only the ones
/// named by registered entities need to be reachable.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub mongodb_uri: Option<String>,
    pub mongodb_database: Option<String>,
    pub postgres_url: Option<String>,
    pub mysql_url: Option<String>,
    pub page_defaults: PageDefaults,
    pub chunk_size: usize,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Load(format!("{key}: invalid value '{raw}'"))),
        None => Ok(default),
    }
}

impl RuntimeConfig {
    /// Reads settings from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = PageDefaults::default();
        Ok(RuntimeConfig {
            mongodb_uri: env_opt("MONGODB_URI"),
            mongodb_database: env_opt("MONGODB_DATABASE"),
            postgres_url: env_opt("DATABASE_URL"),
            mysql_url: env_opt("MYSQL_URL"),
            page_defaults: PageDefaults {
                page_size: env_parse("CRUDCRAFT_PAGE_SIZE", defaults.page_size)?,
                max_page_size: env_parse("CRUDCRAFT_MAX_PAGE_SIZE", defaults.max_page_size)?,
            },
            chunk_size: env_parse("CRUDCRAFT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
        })
    }

    /// Connects every configured backend. A configured but unreachable
    /// backend is a startup error; an unconfigured one is simply absent.
    pub async fn connect_backends(&self) -> Result<StorageBackends, ConfigError> {
        let mongo = match (&self.mongodb_uri, &self.mongodb_database) {
            (Some(uri), Some(db)) => {
                let client = mongodb::Client::with_uri_str(uri)
                    .await
                    .map_err(|e| ConfigError::Load(format!("mongodb: {e}")))?;
                Some(client.database(db))
            }
            (Some(_), None) => {
                return Err(ConfigError::Load(
                    "MONGODB_URI set but MONGODB_DATABASE missing".into(),
                ))
            }
            _ => None,
        };

        let postgres = match &self.postgres_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .map_err(|e| ConfigError::Load(format!("postgres: {e}")))?,
            ),
            None => None,
        };

        let mysql = match &self.mysql_url {
            Some(url) => Some(
                MySqlPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .map_err(|e| ConfigError::Load(format!("mysql: {e}")))?,
            ),
            None => None,
        };

        Ok(StorageBackends {
            mongo,
            postgres,
            mysql,
        })
    }
}

/// Loads entity definitions from a JSON file holding an array of
/// definitions.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<EntityDefinition>, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_file_parses_an_array() {
        let dir = std::env::temp_dir().join("crudcraft-runtime-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("entities.json");
        std::fs::write(
            &path,
            r#"[{
                "name": "users",
                "collection": "users",
                "id_strategy": "document",
                "fields": [{"name": "id"}, {"name": "email"}]
            }]"#,
        )
        .unwrap();
        let defs = load_definitions(&path).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "users");
    }

    #[test]
    fn missing_definitions_file_is_a_load_error() {
        let err = load_definitions("/nonexistent/entities.json").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
