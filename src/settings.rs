// src/settings.rs

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_PATH: &str = "./data/restaurants";
const DEFAULT_RESTAURANTS_FILE: &str = "./restaurants/restaurants.json";
const ENV_PREFIX: &str = "RESTAURANT";

#[derive(Parser, Debug)]
#[command(version, about = "Restaurant recommendation server")]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogSettings {
    /// A `tracing_subscriber::EnvFilter` directive such as `info` or
    /// `restaurant_recommendation_server=debug`.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoaderSettings {
    pub restaurants_file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub log: LogSettings,
    pub loader: LoaderSettings,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    ///
    /// Environment variables prefixed with `RESTAURANT_` override both, with
    /// `__` separating the section from the key, e.g. `RESTAURANT_WEB__ADDRESS`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", DEFAULT_DB_PATH)?
            .set_default("log.level", "info")?
            .set_default("log.format", "json")?
            .set_default("loader.restaurants_file", DEFAULT_RESTAURANTS_FILE)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.add_source(env).build()?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.web.address, DEFAULT_ADDR.parse().unwrap());
        assert_eq!(settings.database.path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(
            settings.loader.restaurants_file,
            PathBuf::from(DEFAULT_RESTAURANTS_FILE)
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [web]
            address = "127.0.0.1:9000"

            [log]
            format = "text"
            "#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.web.address, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.log.format, LogFormat::Text);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn environment_overrides_file_and_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[web]\naddress = \"127.0.0.1:9000\"").unwrap();

        let vars = config::Map::from([
            (
                "RESTAURANT_WEB__ADDRESS".to_string(),
                "127.0.0.1:9111".to_string(),
            ),
            (
                "RESTAURANT_LOADER__RESTAURANTS_FILE".to_string(),
                "/srv/restaurants.json".to_string(),
            ),
            ("OTHER_WEB__ADDRESS".to_string(), "127.0.0.1:1".to_string()),
        ]);
        let env = environment().source(Some(vars));

        let settings = Settings::from_sources(Some(file.path()), env).unwrap();
        assert_eq!(settings.web.address, "127.0.0.1:9111".parse().unwrap());
        assert_eq!(
            settings.loader.restaurants_file,
            PathBuf::from("/srv/restaurants.json")
        );
        assert_eq!(settings.database.path, PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn invalid_address_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[web]\naddress = \"not an address\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
