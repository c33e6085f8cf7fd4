use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "NcdMonitor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_REMINDER_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "ncd_monitor_lib=info,tower_http=info"
}

/// Application data directory: ~/NcdMonitor/ (falls back to the working
/// directory when no home directory is known).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite file location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("ncd.db")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub risk_model_path: Option<PathBuf>,
    pub fcm_server_key: Option<String>,
    pub reminder_interval: Duration,
    pub seed_demo: bool,
}

impl AppConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = get("NCD_DB_PATH").map(PathBuf::from).unwrap_or_else(default_db_path);

        let bind_raw = get("NCD_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "NCD_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let reminder_secs = match get("NCD_REMINDER_INTERVAL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "NCD_REMINDER_INTERVAL_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_REMINDER_SECS,
        };

        let seed_demo = match get("NCD_SEED_DEMO") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                var: "NCD_SEED_DEMO",
                value: raw,
            })?,
            None => false,
        };

        Ok(Self {
            db_path,
            bind_addr,
            risk_model_path: get("NCD_RISK_MODEL_PATH").map(PathBuf::from),
            fcm_server_key: get("FCM_SERVER_KEY"),
            reminder_interval: Duration::from_secs(reminder_secs),
            seed_demo,
        })
    }

    /// Defaults pointed at a scratch database.
    #[cfg(test)]
    pub fn for_tests(db_path: PathBuf) -> Self {
        Self {
            db_path,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            risk_model_path: None,
            fcm_server_key: None,
            reminder_interval: Duration::from_secs(DEFAULT_REMINDER_SECS),
            seed_demo: false,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
