use metering_api::config::Config as MeteringApiConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "metering".into()
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            sentry_dsn: None,
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub metering_api: Option<MeteringApiConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn metering_api_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            metering_api:
                listener:
                    host: 0.0.0.0
                    port: 9090
                engine:
                    url: http://metering-engine:8080
                    timeout_secs: 10
                identity:
                    user_header: X-Forwarded-User
                metering:
                    retention_day: 30
                    billing:
                        price_info:
                            currency_unit: CNY
                            cpu_per_core_per_hour: 0.05
                            mem_per_gigabytes_per_hour: 0.01
                            ingress_network_traffic_per_megabytes_per_hour: 0.001
                            egress_network_traffic_per_megabytes_per_hour: 0.001
                            pvc_per_gigabytes_per_hour: 0.002
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "metering");
        assert_eq!(config.common.logging, LoggingConfig::default());

        let api = config.metering_api.expect("metering api config");
        assert!(api.validate().is_ok());
        assert_eq!(api.engine.timeout_secs, 10);
        assert_eq!(api.identity.user_header, "X-Forwarded-User");
        assert_eq!(api.identity.group_header, "X-Remote-Group");
        assert_eq!(api.metering.retention_day, 30);
        assert_eq!(api.metering.billing.price_info.currency_unit, "CNY");
    }

    #[test]
    fn logging_only_config() {
        let tmp = write_tmp_file("logging:\n    sentry_dsn: https://key@sentry.example.com/1\n");
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.metering_api.is_none());
        assert_eq!(
            config.common.logging.sentry_dsn.as_deref(),
            Some("https://key@sentry.example.com/1")
        );
        assert_eq!(config.common.logging.level, "info");
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/metering.yaml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn invalid_yaml() {
        let tmp = write_tmp_file("metering_api: [not, a, map]\n");
        let err = Config::from_file(tmp.path()).expect_err("invalid config");
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
