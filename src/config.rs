use std::env;
use std::net::IpAddr;
use std::num::ParseIntError;

#[derive(Debug, Clone)]
/// Application configuration loaded from environment variables.
pub struct Config {
    /// Host to bind the HTTP/WebSocket server to.
    pub host: String,
    /// Port for the HTTP/WebSocket server to listen on.
    pub port: u16,
    /// Logging level (e.g., "info", "debug").
    pub rust_log: String,
    /// Capacity of each connection's bounded outbound queue (spec.md 5).
    pub outbound_queue_capacity: usize,
}

#[derive(Debug)]
/// Errors that can occur during configuration loading.
pub enum ConfigError {
    /// A port or queue capacity value could not be parsed as an integer.
    InvalidPort(String, ParseIntError),
    /// A port value was 0, which is logically invalid for this application.
    PortOutOfRange(u16),
    /// OUTBOUND_QUEUE_CAPACITY was set but is 0, which would make every
    /// forward fail immediately.
    QueueCapacityOutOfRange(usize),
    /// HOST was set but is neither the literal `localhost` nor a
    /// parseable IP address.
    InvalidHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort(var, err) => {
                write!(f, "{} must be a valid port number ({})", var, err)
            }
            ConfigError::PortOutOfRange(port) => {
                write!(f, "PORT must be between 1 and 65535 (got {})", port)
            }
            ConfigError::QueueCapacityOutOfRange(cap) => {
                write!(
                    f,
                    "OUTBOUND_QUEUE_CAPACITY must be at least 1 (got {})",
                    cap
                )
            }
            ConfigError::InvalidHost(host) => {
                write!(f, "HOST must be 'localhost' or a valid IP address (got '{}')", host)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validates environment variables and returns a Config object. Every
/// field has a default (spec.md 6), so this only errors when a value is
/// present but malformed.
pub fn validate_env() -> Result<Config, ConfigError> {
    let host = match env::var("HOST") {
        Ok(raw) if raw == "localhost" || raw.parse::<IpAddr>().is_ok() => raw,
        Ok(raw) => return Err(ConfigError::InvalidHost(raw)),
        Err(_) => "localhost".to_string(),
    };

    let port: u16 = match env::var("PORT") {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidPort("PORT".to_string(), e))?,
        Err(_) => 8080,
    };
    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| {
        eprintln!("RUST_LOG not set, using default: info");
        "info".to_string()
    });

    let outbound_queue_capacity: usize = match env::var("OUTBOUND_QUEUE_CAPACITY") {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidPort("OUTBOUND_QUEUE_CAPACITY".to_string(), e))?,
        Err(_) => crate::connection::DEFAULT_OUTBOUND_CAPACITY,
    };
    if outbound_queue_capacity == 0 {
        return Err(ConfigError::QueueCapacityOutOfRange(outbound_queue_capacity));
    }

    Ok(Config {
        host,
        port,
        rust_log,
        outbound_queue_capacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    lazy_static::lazy_static! {
        static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
    }

    struct EnvGuard<'a> {
        vars: Vec<String>,
        _guard: std::sync::MutexGuard<'a, ()>,
    }

    impl<'a> EnvGuard<'a> {
        fn new() -> Self {
            let guard = ENV_MUTEX.lock().unwrap();
            EnvGuard {
                vars: Vec::new(),
                _guard: guard,
            }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.vars.push(key.to_string());
        }

        fn unset(&mut self, key: &str) {
            env::remove_var(key);
            self.vars.push(key.to_string());
        }
    }

    impl<'a> Drop for EnvGuard<'a> {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let mut guard = EnvGuard::new();
        guard.unset("HOST");
        guard.unset("PORT");
        guard.unset("RUST_LOG");
        guard.unset("OUTBOUND_QUEUE_CAPACITY");

        let config = validate_env().expect("defaults alone should be valid");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.outbound_queue_capacity, 32);
    }

    #[test]
    fn honors_explicit_host_and_port() {
        let mut guard = EnvGuard::new();
        guard.set("HOST", "0.0.0.0");
        guard.set("PORT", "9001");

        let config = validate_env().expect("valid configuration");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn invalid_host_is_rejected() {
        let mut guard = EnvGuard::new();
        guard.set("HOST", "not a host");

        let err = validate_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost(_)));
        assert!(err.to_string().contains("HOST must be"));
    }

    #[test]
    fn ip_address_host_is_accepted() {
        let mut guard = EnvGuard::new();
        guard.set("HOST", "192.168.1.1");

        let config = validate_env().expect("a valid IP address should be accepted");
        assert_eq!(config.host, "192.168.1.1");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut guard = EnvGuard::new();
        guard.set("PORT", "not-a-number");

        let err = validate_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_, _)));
        assert!(err.to_string().contains("PORT must be a valid port number"));
    }

    #[test]
    fn zero_port_is_out_of_range() {
        let mut guard = EnvGuard::new();
        guard.set("PORT", "0");

        let err = validate_env().unwrap_err();
        assert!(matches!(err, ConfigError::PortOutOfRange(0)));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut guard = EnvGuard::new();
        guard.set("OUTBOUND_QUEUE_CAPACITY", "0");

        let err = validate_env().unwrap_err();
        assert!(matches!(err, ConfigError::QueueCapacityOutOfRange(0)));
    }

    #[test]
    fn honors_explicit_queue_capacity() {
        let mut guard = EnvGuard::new();
        guard.set("OUTBOUND_QUEUE_CAPACITY", "64");

        let config = validate_env().expect("valid configuration");
        assert_eq!(config.outbound_queue_capacity, 64);
    }
}
