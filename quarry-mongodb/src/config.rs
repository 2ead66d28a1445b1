//! MongoDB connection configuration.
//!
//! The configuration lives in the `[mongo]` table of a TOML document:
//!
//! ```toml
//! [mongo]
//! hosts = ["db-0.internal:27017", "db-1.internal:27017"]
//! replica_set = "rs0"
//! database = "orders"
//! connect_timeout = 10
//! max_pool_size = 50
//!
//! [mongo.read_preference]
//! mode = "secondaryPreferred"
//! max_staleness = 90
//! tags = { region = "eu-west" }
//!
//! [mongo.auth]
//! source = "admin"
//! username = "${MONGO_USER}"
//! password = "${MONGO_PASSWORD}"
//! ```
//!
//! `${VAR}` placeholders are replaced from the environment before parsing.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{MongoError, MongoResult};

/// Name of the TOML table holding the MongoDB configuration.
pub const CONFIG_SECTION: &str = "mongo";

/// MongoDB connection configuration.
///
/// All fields are optional in the source document; zero values mean
/// "leave the driver default" unless documented otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Seed list of `host:port` addresses.
    pub hosts: Vec<String>,
    /// Replica set name. Empty means no replica set is required.
    pub replica_set: String,
    /// Database used by [`Manager::collection`](crate::Manager::collection)
    /// and [`Manager::default_database`](crate::Manager::default_database).
    pub database: String,
    /// Read preference settings.
    pub read_preference: ReadPreferenceConfig,
    /// Credential settings.
    pub auth: AuthConfig,
    /// Connection timeout in seconds.
    pub connect_timeout: u64,
    /// Maximum idle time of pooled connections in seconds. Zero means no limit.
    pub max_conn_idle_time: u64,
    /// Maximum connection pool size. Zero keeps the driver default.
    pub max_pool_size: u32,
    /// Minimum connection pool size.
    pub min_pool_size: u32,
    /// Server selection timeout in seconds. Zero keeps the driver default.
    pub server_selection_timeout: u64,
    /// Application name reported to the server.
    pub app_name: String,
}

/// Read preference settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadPreferenceConfig {
    /// Numeric mode code, see [`ReadMode`]. Mode names are accepted too.
    #[serde(deserialize_with = "deserialize_mode")]
    pub mode: i32,
    /// Maximum replication lag in seconds. Zero means unset.
    ///
    /// The driver rejects values below 90 seconds when the client is created.
    pub max_staleness: u64,
    /// Tag set a member must carry to be eligible.
    pub tags: HashMap<String, String>,
}

impl ReadPreferenceConfig {
    /// The read mode selected by `mode`, if it is a known code.
    pub fn read_mode(&self) -> Option<ReadMode> {
        ReadMode::from_code(self.mode)
    }
}

/// Credential settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authentication mechanism name, e.g. `SCRAM-SHA-256`.
    pub mechanism: String,
    /// Mechanism specific properties.
    pub mechanism_properties: HashMap<String, String>,
    /// Database the credential is defined in.
    pub source: String,
    /// User name to authenticate as.
    pub username: String,
    /// Password for `username`. Empty means none unless `password_set` is true.
    pub password: String,
    /// Distinguishes an intentionally empty password from no password.
    pub password_set: bool,
}

impl AuthConfig {
    /// Whether any credential field differs from its default.
    pub fn is_configured(&self) -> bool {
        !self.mechanism.is_empty()
            || !self.mechanism_properties.is_empty()
            || !self.source.is_empty()
            || !self.username.is_empty()
            || !self.password.is_empty()
            || self.password_set
    }
}

/// Read preference mode.
///
/// The numeric codes are the ones accepted in `read_preference.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReadMode {
    /// Read from the primary only.
    Primary = 1,
    /// Read from the primary, fall back to a secondary.
    PrimaryPreferred = 2,
    /// Read from a secondary only.
    Secondary = 3,
    /// Read from a secondary, fall back to the primary.
    SecondaryPreferred = 4,
    /// Read from the member with the lowest latency.
    Nearest = 5,
}

impl ReadMode {
    /// Map a numeric mode code to a mode.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Primary),
            2 => Some(Self::PrimaryPreferred),
            3 => Some(Self::Secondary),
            4 => Some(Self::SecondaryPreferred),
            5 => Some(Self::Nearest),
            _ => None,
        }
    }

    /// Map a mode name to a mode. Case, `-` and `_` are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "primary" => Some(Self::Primary),
            "primarypreferred" => Some(Self::PrimaryPreferred),
            "secondary" => Some(Self::Secondary),
            "secondarypreferred" => Some(Self::SecondaryPreferred),
            "nearest" => Some(Self::Nearest),
            _ => None,
        }
    }

    /// The numeric mode code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

fn deserialize_mode<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    struct ModeVisitor;

    impl Visitor<'_> for ModeVisitor {
        type Value = i32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a read preference mode code or name")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i32, E> {
            i32::try_from(v).map_err(|_| E::custom(format!("mode {v} out of range")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i32, E> {
            i32::try_from(v).map_err(|_| E::custom(format!("mode {v} out of range")))
        }

        // Unknown names behave like unknown codes.
        fn visit_str<E: de::Error>(self, v: &str) -> Result<i32, E> {
            Ok(ReadMode::from_name(v).map(ReadMode::code).unwrap_or(0))
        }
    }

    deserializer.deserialize_any(ModeVisitor)
}

impl MongoConfig {
    /// Load the `[mongo]` section from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> MongoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MongoError::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse the `[mongo]` section from a TOML document.
    ///
    /// A document without the section yields the default configuration.
    pub fn from_toml_str(content: &str) -> MongoResult<Self> {
        let expanded = expand_env_vars(content);

        let table: toml::Table = toml::from_str(&expanded)
            .map_err(|e| MongoError::config(format!("failed to parse TOML: {}", e)))?;

        Self::from_table(&table)
    }

    /// Extract the `[mongo]` section from an already parsed TOML table.
    pub fn from_table(table: &toml::Table) -> MongoResult<Self> {
        match table.get(CONFIG_SECTION) {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e| MongoError::config(format!("unmarshal mongo option error: {}", e))),
            None => Ok(Self::default()),
        }
    }
}

fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = MongoConfig::default();
        assert!(config.hosts.is_empty());
        assert_eq!(config.read_preference.mode, 0);
        assert!(!config.auth.is_configured());
    }

    #[test]
    fn test_parse_full_section() {
        let toml = r#"
            [mongo]
            hosts = ["a:27017", "b:27018"]
            replica_set = "rs0"
            database = "orders"
            connect_timeout = 5
            max_conn_idle_time = 60
            max_pool_size = 20
            min_pool_size = 2

            [mongo.read_preference]
            mode = 4
            max_staleness = 90
            tags = { region = "eu" }

            [mongo.auth]
            source = "admin"
            username = "svc"
            password = "secret"
        "#;

        let config = MongoConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.hosts, vec!["a:27017", "b:27018"]);
        assert_eq!(config.replica_set, "rs0");
        assert_eq!(config.database, "orders");
        assert_eq!(config.connect_timeout, 5);
        assert_eq!(config.max_pool_size, 20);
        assert_eq!(config.read_preference.read_mode(), Some(ReadMode::SecondaryPreferred));
        assert_eq!(config.read_preference.max_staleness, 90);
        assert_eq!(config.read_preference.tags.get("region").map(String::as_str), Some("eu"));
        assert_eq!(config.auth.username, "svc");
        assert!(config.auth.is_configured());
    }

    #[test]
    fn test_mode_by_name() {
        let toml = r#"
            [mongo.read_preference]
            mode = "secondary_preferred"
        "#;
        let config = MongoConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.read_preference.mode, 4);

        let toml = r#"
            [mongo.read_preference]
            mode = "somewhere"
        "#;
        let config = MongoConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.read_preference.mode, 0);
        assert_eq!(config.read_preference.read_mode(), None);
    }

    #[test]
    fn test_missing_section_is_default() {
        let config = MongoConfig::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, MongoConfig::default());
    }

    #[test]
    fn test_malformed_section() {
        let err = MongoConfig::from_toml_str("[mongo]\nhosts = 5\n").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("unmarshal mongo option error"));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("QUARRY_TEST_MONGO_USER", "reporter") };

        let toml = r#"
            [mongo.auth]
            username = "${QUARRY_TEST_MONGO_USER}"
            password = "${QUARRY_TEST_UNSET_VARIABLE}"
        "#;
        let config = MongoConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.auth.username, "reporter");
        assert_eq!(config.auth.password, "${QUARRY_TEST_UNSET_VARIABLE}");
    }

    #[test]
    fn test_password_set_alone_configures_auth() {
        let auth = AuthConfig {
            password_set: true,
            ..AuthConfig::default()
        };
        assert!(auth.is_configured());
    }

    #[test]
    fn test_read_mode_codes() {
        assert_eq!(ReadMode::from_code(1), Some(ReadMode::Primary));
        assert_eq!(ReadMode::from_code(5), Some(ReadMode::Nearest));
        assert_eq!(ReadMode::from_code(0), None);
        assert_eq!(ReadMode::from_code(6), None);
        assert_eq!(ReadMode::Secondary.code(), 3);
        assert_eq!(ReadMode::from_name("Primary-Preferred"), Some(ReadMode::PrimaryPreferred));
    }
}
