use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Liveness sweeper period in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Poll buffers untouched by a fetch for longer than this are evicted
    #[serde(default = "default_buffer_idle_timeout")]
    pub buffer_idle_timeout_secs: u64,
    /// Maximum pending messages per poll buffer
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// Outbound queue depth per push connection
    #[serde(default = "default_outbound_buffer_size")]
    pub outbound_buffer_size: usize,
    /// Upper bound for enqueueing a single liveness probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_buffer_idle_timeout() -> u64 {
    300 // 5 minutes
}

fn default_max_buffer_size() -> usize {
    4096
}

fn default_outbound_buffer_size() -> usize {
    256
}

fn default_probe_timeout() -> u64 {
    1000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("relay.sweep_interval_secs", default_sweep_interval())?
            .set_default("relay.buffer_idle_timeout_secs", default_buffer_idle_timeout())?
            .set_default("relay.max_buffer_size", default_max_buffer_size() as u64)?
            .set_default("relay.outbound_buffer_size", default_outbound_buffer_size() as u64)?
            .set_default("relay.probe_timeout_ms", default_probe_timeout())?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // RELAY__SERVER__PORT, RELAY__RELAY__MAX_BUFFER_SIZE, ...
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain PORT wins over everything else
            .set_override_option("server.port", env::var("PORT").ok())?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.relay.validate()?;

        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RelayConfig {
    /// Reject values that would stop the sweeper or drop every message
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "relay.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.buffer_idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "relay.buffer_idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::Message(
                "relay.max_buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Never zero; a zero period would panic the interval timer
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn buffer_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.buffer_idle_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            buffer_idle_timeout_secs: default_buffer_idle_timeout(),
            max_buffer_size: default_max_buffer_size(),
            outbound_buffer_size: default_outbound_buffer_size(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}
