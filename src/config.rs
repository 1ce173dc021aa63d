//! 設定の読み込み
//!
//! `config/default.toml` を基本とし、`config/{RUN_MODE}.toml` と
//! `LENDING__` で始まる環境変数で上書きする。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::domain::Policy;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// 未設定ならインメモリのアダプターで起動する
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub policy: Policy,
}

impl AppConfig {
    /// 設定ファイルと環境変数から読み込む
    ///
    /// 例: `LENDING__POLICY__DAILY_FINE_RATE=20`
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("LENDING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("server.port", env::var("PORT").ok())?
            .build()?
            .try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}
