//! Server configuration
//!
//! Configuration is loaded from environment variables. Every default matches the
//! fixed constants of the demo service, so an empty environment reproduces it exactly.

use std::env;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Load simulation configuration
    pub load: LoadConfig,

    /// WebSocket configuration
    pub ws: WsConfig,
}

/// Load-simulation knobs
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Length of one simulated "time unit"
    pub time_unit: Duration,
    /// Number of progress messages produced by a medium run
    pub medium_steps: usize,
    /// Iterations of the sum-of-squares loop on `/complex`
    pub complex_iterations: u64,
    /// Simulated I/O wait on `/complex`, in time units
    pub complex_io_units: u32,
}

/// Which `Origin` headers may open a WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Every origin is accepted
    #[default]
    AllowAll,
    /// Only the listed origins are accepted
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Parse a comma-separated origin list. Empty input or `*` means allow all.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| o.trim_end_matches('/').to_string())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::AllowAll
        } else {
            Self::AllowList(origins)
        }
    }

    /// Check an `Origin` header value. Requests without an origin (non-browser
    /// clients) are always accepted.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::AllowAll, _) | (_, None) => true,
            (Self::AllowList(list), Some(origin)) => {
                let origin = origin.trim_end_matches('/');
                list.iter().any(|allowed| allowed.eq_ignore_ascii_case(origin))
            }
        }
    }
}

/// WebSocket connection configuration
#[derive(Debug, Clone, Default)]
pub struct WsConfig {
    /// Close the connection when no frame arrives for this long
    pub idle_timeout: Option<Duration>,
    /// Upgrade origin check
    pub origin_policy: OriginPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            load: LoadConfig::default(),
            ws: WsConfig::default(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(1),
            medium_steps: 10,
            complex_iterations: 1_000_000,
            complex_io_units: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Load config
        if let Ok(val) = env::var("LOAD_TIME_UNIT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.load.time_unit = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("COMPLEX_ITERATIONS")
            && let Ok(n) = val.parse()
        {
            config.load.complex_iterations = n;
        }

        // WebSocket config
        if let Ok(val) = env::var("WS_IDLE_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.ws.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Ok(val) = env::var("WS_ALLOWED_ORIGINS") {
            config.ws.origin_policy = OriginPolicy::parse(&val);
        }

        config
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
