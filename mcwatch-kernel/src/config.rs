//! Startup configuration, read once from the environment.

use crate::error::ConfigError;
use crate::slp::DEFAULT_PORT;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v10";
pub const DEFAULT_MQTT_TOPIC: &str = "mcwatch/server/status@v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`; `default_port`
    /// applies when no port is given. A bare IPv6 literal is taken whole.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let port_of = |port: &str| {
            port.parse::<u16>()
                .map_err(|e| ConfigError::invalid("MC_HOST", raw, e.to_string()))
        };
        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| ConfigError::invalid("MC_HOST", raw, "unclosed '['"))?;
            match tail {
                "" => (host, default_port),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, port_of(port)?),
                    None => return Err(ConfigError::invalid("MC_HOST", raw, "junk after ']'")),
                },
            }
        } else {
            match raw.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, port_of(port)?),
                _ => (raw, default_port),
            }
        };
        if host.is_empty() {
            return Err(ConfigError::invalid("MC_HOST", raw, "empty host"));
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscordConf {
    pub token: String,
    pub api_base: String,
    pub guild_id: Option<String>,
    pub application_id: Option<String>,
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

/// Where transition notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifySink {
    /// `None` disables notifications; polling still runs.
    Discord { channel_id: Option<String> },
    Mqtt(MqttConf),
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub discord: DiscordConf,
    pub target: Target,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub sink: NotifySink,
    pub http_port: u16,
    pub public_url: Option<String>,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let discord = DiscordConf {
            token,
            api_base: get("DISCORD_API_BASE")
                .unwrap_or_else(|| DEFAULT_DISCORD_API.into())
                .trim_end_matches('/')
                .to_string(),
            guild_id: get("GUILD_ID"),
            application_id: get("DISCORD_APPLICATION_ID"),
            public_key: get("DISCORD_PUBLIC_KEY"),
        };

        let default_port = parse_or("MC_PORT", get("MC_PORT"), DEFAULT_PORT)?;
        let target = Target::parse(
            get("MC_HOST").as_deref().unwrap_or("localhost"),
            default_port,
        )?;

        let poll_seconds: u64 = parse_or("POLL_SECONDS", get("POLL_SECONDS"), 60)?;
        if poll_seconds == 0 {
            return Err(ConfigError::invalid("POLL_SECONDS", "0", "must be at least 1"));
        }
        let probe_timeout_ms: u64 = parse_or("PROBE_TIMEOUT_MS", get("PROBE_TIMEOUT_MS"), 2500)?;
        if probe_timeout_ms == 0 {
            return Err(ConfigError::invalid("PROBE_TIMEOUT_MS", "0", "must be at least 1"));
        }

        let sink = match get("NOTIFY_SINK").as_deref().unwrap_or("discord") {
            "discord" => NotifySink::Discord { channel_id: get("STATUS_CHANNEL_ID") },
            "mqtt" => NotifySink::Mqtt(MqttConf {
                host: get("MQTT_HOST").unwrap_or_else(|| "localhost".into()),
                port: parse_or("MQTT_PORT", get("MQTT_PORT"), 1883)?,
                topic: get("MQTT_TOPIC").unwrap_or_else(|| DEFAULT_MQTT_TOPIC.into()),
            }),
            other => {
                return Err(ConfigError::invalid("NOTIFY_SINK", other, "expected discord or mqtt"));
            }
        };

        Ok(Self {
            discord,
            target,
            poll_interval: Duration::from_secs(poll_seconds),
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            sink,
            http_port: parse_or("PORT", get("PORT"), 3000)?,
            public_url: get("RENDER_EXTERNAL_URL"),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}
