//! Server Configuration

use chrono::FixedOffset;
use thiserror::Error;

use booking_core::AdmissionConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings read from the environment at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Offset of the wall clock salons schedule bookings in
    pub utc_offset: FixedOffset,

    /// Stripe endpoint secret; unsigned webhooks are accepted without it
    pub webhook_secret: Option<String>,

    /// Provision a free salon with this slug at startup
    pub demo_salon_slug: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let utc_offset = match non_empty("BOOKING_UTC_OFFSET_MINUTES") {
            None => FixedOffset::east_opt(0),
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(|minutes| minutes.checked_mul(60))
                .and_then(FixedOffset::east_opt),
        }
        .ok_or_else(|| ConfigError::Invalid {
            name: "BOOKING_UTC_OFFSET_MINUTES",
            value: lookup("BOOKING_UTC_OFFSET_MINUTES").unwrap_or_default(),
        })?;

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            utc_offset,
            webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            demo_salon_slug: non_empty("DEMO_SALON_SLUG"),
        })
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            utc_offset: self.utc_offset,
            ..Default::default()
        }
    }
}
