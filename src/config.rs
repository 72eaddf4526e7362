//! Configuration loaded from environment variables.
//!
//! Values are read with `figment::providers::Env::raw()` after `.env` has been
//! applied by `dotenvy`. Durations accept human strings such as `8s` or `2m`.

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default level for this crate's targets; other crates stay at `warn`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on graceful shutdown before the process exits anyway.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Deliver notifications to this URL instead of the notifications table.
    #[serde(default)]
    pub notify_webhook_url: Option<Url>,
    /// Notify organizers after each generation run that created suggestions.
    #[serde(default)]
    pub notify_on_generation: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Plain integers are seconds; strings go through `fundu`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .build();

pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let parsed = DURATION_PARSER
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::Serialized;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("8s").unwrap(), Duration::from_secs(8));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults_fill_missing_values() {
        let config: Config = Figment::new()
            .merge(Serialized::default("database_url", "postgres://localhost/test"))
            .extract()
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(8));
        assert!(config.notify_webhook_url.is_none());
        assert!(!config.notify_on_generation);
    }

    #[test]
    fn test_duration_from_string_and_integer() {
        let config: Config = Figment::new()
            .merge(Serialized::default("database_url", "postgres://localhost/test"))
            .merge(Serialized::default("shutdown_timeout", "2m"))
            .merge(Serialized::default("notify_webhook_url", "https://hooks.example.com/x"))
            .extract()
            .unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(120));
        assert_eq!(
            config.notify_webhook_url.map(|u| u.to_string()),
            Some("https://hooks.example.com/x".to_string())
        );

        let config: Config = Figment::new()
            .merge(Serialized::default("database_url", "postgres://localhost/test"))
            .merge(Serialized::default("shutdown_timeout", 3))
            .extract()
            .unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }
}
