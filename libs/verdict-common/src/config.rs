// Process-level configuration shared by the API and CLI

use std::time::Duration;

pub const DEFAULT_JUDGE0_URL: &str = "https://judge0-ce.p.rapidapi.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: Option<String>,
    pub judge0_url: String,
    pub judge0_api_key: Option<String>,
    pub judge0_api_host: Option<String>,
    pub judge0_poll_attempts: u32,
    pub execution_timeout: Duration,
    pub bind_addr: String,
    pub languages_config: String,
    /// Sessions untouched for this long are dropped by the API
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Config {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            redis_url: non_empty_var("REDIS_URL"),
            judge0_url: non_empty_var("JUDGE0_URL").unwrap_or_else(|| DEFAULT_JUDGE0_URL.to_string()),
            judge0_api_key: non_empty_var("JUDGE0_API_KEY"),
            judge0_api_host: non_empty_var("JUDGE0_API_HOST"),
            judge0_poll_attempts: parsed_var("JUDGE0_POLL_ATTEMPTS").unwrap_or(10),
            execution_timeout: Duration::from_millis(parsed_var("EXECUTION_TIMEOUT_MS").unwrap_or(30_000)),
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            languages_config: non_empty_var("LANGUAGES_CONFIG")
                .unwrap_or_else(|| "config/languages.json".to_string()),
            session_idle_ttl: Duration::from_secs(parsed_var("SESSION_IDLE_TTL_SECS").unwrap_or(3600)),
            max_sessions: parsed_var("MAX_SESSIONS").unwrap_or(10_000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            judge0_url: DEFAULT_JUDGE0_URL.to_string(),
            judge0_api_key: None,
            judge0_api_host: None,
            judge0_poll_attempts: 10,
            execution_timeout: Duration::from_millis(30_000),
            bind_addr: "0.0.0.0:3000".to_string(),
            languages_config: "config/languages.json".to_string(),
            session_idle_ttl: Duration::from_secs(3600),
            max_sessions: 10_000,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    non_empty_var(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.judge0_url, DEFAULT_JUDGE0_URL);
        assert_eq!(config.judge0_poll_attempts, 10);
        assert!(config.redis_url.is_none());
        assert_eq!(config.session_idle_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_sessions, 10_000);
    }
}
