use clap::{ArgAction, Parser, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Upper bound in milliseconds on a single classification backend call
    #[arg(long, env = "BACKEND_TIMEOUT_MS", default_value = "30000")]
    pub backend_timeout_ms: u64,

    /// Allowed origins, comma separated. "*" allows any origin
    #[arg(
        long,
        env = "CORS_ALLOW_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_allow_origins: Vec<String>,

    /// Whether cross-origin requests may carry credentials
    #[arg(
        long,
        env = "CORS_ALLOW_CREDENTIALS",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub cors_allow_credentials: bool,

    /// Allowed methods, comma separated. "*" allows any method
    #[arg(
        long,
        env = "CORS_ALLOW_METHODS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_allow_methods: Vec<String>,

    /// Allowed request headers, comma separated. "*" allows any header
    #[arg(
        long,
        env = "CORS_ALLOW_HEADERS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_allow_headers: Vec<String>,

    /// How long browsers may cache a preflight response, in seconds
    #[arg(long, env = "CORS_MAX_AGE_SECS", default_value = "600")]
    pub cors_max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn cors_max_age(&self) -> Duration {
        Duration::from_secs(self.cors_max_age_secs)
    }
}
