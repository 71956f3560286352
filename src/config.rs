use std::net::SocketAddr;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "moneyd", about = "Personal finance tracking backend")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "moneyd.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default = "default_database")]
    pub database: DatabaseConfig,

    /// Carried over from the source deployment. Not consumed by any
    /// endpoint.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// "sqlite" or "postgres"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// SQLite database path; ":memory:" for an ephemeral store
    #[serde(default = "default_sqlite_path")]
    pub path: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_name")]
    pub name: String,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_database() -> DatabaseConfig {
    DatabaseConfig {
        backend: default_backend(),
        path: default_sqlite_path(),
        host: default_db_host(),
        port: default_db_port(),
        user: default_db_user(),
        password: String::new(),
        name: default_db_name(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9071
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_sqlite_path() -> String {
    "moneyd.db".to_string()
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "moneyd".to_string()
}

fn default_db_name() -> String {
    "moneyd".to_string()
}

fn default_secret_key() -> String {
    "moneyd-secret-key".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            database: default_database(),
            secret_key: default_secret_key(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config.apply_env_overrides();
        config
    }

    /// Environment variables take precedence over the config file for
    /// the store connection and the secret key.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DB_BACKEND") {
            self.database.backend = v;
        }
        if let Ok(v) = std::env::var("DB_PATH") {
            self.database.path = v;
        }
        if let Ok(v) = std::env::var("DB_HOST") {
            self.database.host = v;
        }
        if let Ok(v) = std::env::var("DB_PORT") {
            if let Ok(port) = v.parse() {
                self.database.port = port;
            }
        }
        if let Ok(v) = std::env::var("DB_USER") {
            self.database.user = v;
        }
        if let Ok(v) = std::env::var("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Ok(v) = std::env::var("DB_NAME") {
            self.database.name = v;
        }
        if let Ok(v) = std::env::var("SECRET_KEY") {
            self.secret_key = v;
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .expect("Invalid listen address")
    }
}
