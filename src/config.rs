//! Cloud account configuration.

use crate::error::{Result, SonoffError};
use crate::types::Region;
use std::str::FromStr;

pub const ENV_USERNAME: &str = "SONOFF_USERNAME";
pub const ENV_PASSWORD: &str = "SONOFF_PASSWORD";
pub const ENV_APP_ID: &str = "SONOFF_APP_ID";
pub const ENV_APP_SECRET: &str = "SONOFF_APP_SECRET";
pub const ENV_REGION: &str = "SONOFF_REGION";

/// Credentials and application identity for the eWeLink cloud.
#[derive(Clone)]
pub struct CloudConfig {
    /// E-mail address or phone number
    pub username: String,
    pub password: String,
    pub app_id: String,
    pub app_secret: String,
    /// Initial region; may be corrected by the login redirect
    pub region: Region,
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("username", &self.username)
            .field("app_id", &self.app_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl CloudConfig {
    pub fn new<U, P, I, S>(username: U, password: P, app_id: I, app_secret: S) -> Self
    where
        U: Into<String>,
        P: Into<String>,
        I: Into<String>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            password: password.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            region: Region::default(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Read the configuration from `SONOFF_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SonoffError::InvalidArgument(format!("{} is not set", name)))
        };
        let config = Self::new(
            required(ENV_USERNAME)?,
            required(ENV_PASSWORD)?,
            required(ENV_APP_ID)?,
            required(ENV_APP_SECRET)?,
        );
        match lookup(ENV_REGION).filter(|v| !v.is_empty()) {
            Some(region) => Ok(config.with_region(Region::from_str(&region)?)),
            None => Ok(config),
        }
    }
}
