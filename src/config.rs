use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub api: ApiConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Send one request through the authenticated client and print the response body
    Request {
        /// Path relative to the API base URL, or an absolute URL
        path: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Extra header as `name:value`, repeatable
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Report the session state and probe the given paths with it
    Check {
        /// Paths to probe, in order
        #[arg(default_values_t = ["/auth/v1/user".to_string()])]
        paths: Vec<String>,
    },
}

#[derive(Clone, Debug, Args)]
pub struct ApiConfig {
    /// Base URL of the backend API
    #[arg(long, env = "RESPECT_API_URL", default_value = "http://localhost:54321")]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "RESPECT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log every request/response pair and attach request ids
    #[arg(long, env = "RESPECT_DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Path of the login surface users are redirected to when their session is lost
    #[arg(long, env = "RESPECT_LOGIN_PATH", default_value = "/login")]
    pub login_path: String,

    /// Path the caller is currently on, used to suppress redirect loops
    #[arg(long, env = "RESPECT_CURRENT_PATH", default_value = "/")]
    pub current_path: String,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Base URL of the authentication service
    #[arg(long, env = "RESPECT_AUTH_URL", default_value = "http://localhost:54321/auth/v1")]
    pub auth_url: String,

    /// Public API key sent to the authentication service
    #[arg(long, env = "RESPECT_ANON_KEY")]
    pub anon_key: Option<String>,

    /// Coalesce concurrent refreshes into a single provider call
    #[arg(long, env = "RESPECT_SINGLE_FLIGHT", default_value_t = true, action = clap::ArgAction::Set)]
    pub single_flight: bool,

    /// Access token of an existing session
    #[arg(long, env = "RESPECT_ACCESS_TOKEN", requires = "refresh_token")]
    pub access_token: Option<String>,

    /// Refresh token of an existing session
    #[arg(long, env = "RESPECT_REFRESH_TOKEN")]
    pub refresh_token: Option<String>,

    /// Expiry of the access token as a unix timestamp
    #[arg(long, env = "RESPECT_EXPIRES_AT", default_value_t = 0)]
    pub expires_at: i64,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "RESPECT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported when set
    #[arg(long, env = "RESPECT_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
