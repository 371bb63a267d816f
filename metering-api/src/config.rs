use http::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Currency unit cannot be empty")]
    EmptyCurrency,

    #[error("Price {0} must be a finite, non-negative number")]
    InvalidPrice(&'static str),

    #[error("Invalid identity header name: {0}")]
    InvalidHeader(String),

    #[error("Engine timeout cannot be 0")]
    InvalidTimeout,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 9090,
        }
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 9091,
    }
}

/// Remote metering engine.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct EngineConfig {
    pub url: Url,
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

fn default_engine_timeout() -> u64 {
    30
}

/// Headers the authenticating proxy uses to pass the caller along.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_header: String,
    pub group_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            user_header: "X-Remote-User".into(),
            group_header: "X-Remote-Group".into(),
        }
    }
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for name in [&self.user_header, &self.group_header] {
            HeaderName::try_from(name.as_str())
                .map_err(|_| ValidationError::InvalidHeader(name.clone()))?;
        }
        Ok(())
    }
}

/// Unit cost schedule applied by the engine. Serialized in camel case when
/// sent to the engine.
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PriceInfo {
    pub currency_unit: String,
    pub cpu_per_core_per_hour: f64,
    pub mem_per_gigabytes_per_hour: f64,
    pub ingress_network_traffic_per_megabytes_per_hour: f64,
    pub egress_network_traffic_per_megabytes_per_hour: f64,
    pub pvc_per_gigabytes_per_hour: f64,
}

impl PriceInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.currency_unit.trim().is_empty() {
            return Err(ValidationError::EmptyCurrency);
        }

        let rates = [
            ("cpu_per_core_per_hour", self.cpu_per_core_per_hour),
            ("mem_per_gigabytes_per_hour", self.mem_per_gigabytes_per_hour),
            (
                "ingress_network_traffic_per_megabytes_per_hour",
                self.ingress_network_traffic_per_megabytes_per_hour,
            ),
            (
                "egress_network_traffic_per_megabytes_per_hour",
                self.egress_network_traffic_per_megabytes_per_hour,
            ),
            ("pvc_per_gigabytes_per_hour", self.pvc_per_gigabytes_per_hour),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ValidationError::InvalidPrice(name));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Billing {
    pub price_info: PriceInfo,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MeteringOptions {
    /// Days of raw metering data kept by the monitoring backend.
    #[serde(default = "default_retention_day")]
    pub retention_day: u32,
    pub billing: Billing,
}

fn default_retention_day() -> u32 {
    7
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    pub engine: EngineConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    pub metering: MeteringOptions,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        if self.engine.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.identity.validate()?;
        self.metering.billing.price_info.validate()?;
        Ok(())
    }
}
