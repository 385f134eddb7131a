use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 9066;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_INTERVAL_SECS: f64 = 10.0;
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// IP literal or host name, resolved when the listener binds
    pub bind_addr: String,
    pub scrape_interval: Duration,
    pub docker_host: Option<String>,
    pub docker_timeout: Option<Duration>,
    pub xdg_runtime_dir: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: lookup("PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            bind_addr: non_empty(lookup("BIND_ADDR")).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            scrape_interval: lookup("SCRAPE_INTERVAL")
                .and_then(|s| parse_seconds(&s))
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_INTERVAL_SECS)),
            docker_host: non_empty(lookup("DOCKER_HOST")),
            docker_timeout: lookup("DOCKER_TIMEOUT").and_then(|s| parse_seconds(&s)),
            xdg_runtime_dir: non_empty(lookup("XDG_RUNTIME_DIR")),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Host and port for `TcpListener::bind`
    pub fn listen_addr(&self) -> (&str, u16) {
        (self.bind_addr.as_str(), self.port)
    }

    /// Bound for every call to the Docker daemon.
    ///
    /// Defaults to half the scrape interval, never below one second.
    pub fn request_timeout(&self) -> Duration {
        self.docker_timeout
            .unwrap_or(self.scrape_interval / 2)
            .max(MIN_REQUEST_TIMEOUT)
    }
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
