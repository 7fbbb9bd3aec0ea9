use crate::{
    env::EnvContext,
    settings::{error::SettingsError, retry::RetrySettings, validator::SettingsValidator},
};
use connectors::servicenow::{
    ServiceEndpoint, auth::Credentials, batch::coordinator::DEFAULT_MAX_ROUNDS,
    query::DisplayValue,
};
use model::pagination::window::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr, time::Duration};
use tracing::{debug, info};

pub mod error;
pub mod retry;
pub mod validator;

pub const ENV_ENDPOINT: &str = "SERVICENOW_ENDPOINT";
pub const ENV_CLIENT_ID: &str = "SERVICENOW_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SERVICENOW_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "SERVICENOW_USERNAME";
pub const ENV_PASSWORD: &str = "SERVICENOW_PASSWORD";
pub const ENV_PAGE_SIZE: &str = "SERVICENOW_PAGE_SIZE";
pub const ENV_BATCH_SIZE: &str = "SERVICENOW_BATCH_SIZE";
pub const ENV_MAX_BATCH_ROUNDS: &str = "SERVICENOW_MAX_BATCH_ROUNDS";

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Connection and tuning settings for one service instance.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub value_type: DisplayValue,
    /// Rows per page read.
    pub page_size: usize,
    /// Records buffered before a batch write is flushed.
    pub batch_size: usize,
    /// Upper bound on rounds in a single batch submission.
    pub max_batch_rounds: usize,
    pub request_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            endpoint: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            value_type: DisplayValue::default(),
            page_size: MAX_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_rounds: DEFAULT_MAX_ROUNDS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry: RetrySettings::default(),
        }
    }
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("value_type", &self.value_type)
            .field("page_size", &self.page_size)
            .field("batch_size", &self.batch_size)
            .field("max_batch_rounds", &self.max_batch_rounds)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ServiceSettings {
    /// Reads a file, applies environment overrides and validates the result.
    pub fn load(path: impl AsRef<Path>, env: &EnvContext) -> Result<Self, SettingsError> {
        let mut settings = Self::from_file(path)?;
        settings.apply_env(env)?;
        settings.validate()?;
        info!(
            "Loaded settings for {} (page size {}, batch size {})",
            settings.endpoint, settings.page_size, settings.batch_size
        );
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overrides fields from `SERVICENOW_*` variables that are set.
    pub fn apply_env(&mut self, env: &EnvContext) -> Result<(), SettingsError> {
        let strings = [
            (ENV_ENDPOINT, &mut self.endpoint),
            (ENV_CLIENT_ID, &mut self.client_id),
            (ENV_CLIENT_SECRET, &mut self.client_secret),
            (ENV_USERNAME, &mut self.username),
            (ENV_PASSWORD, &mut self.password),
        ];
        for (key, field) in strings {
            if let Some(value) = env.get(key) {
                debug!("Overriding setting from {key}");
                *field = value.to_string();
            }
        }

        override_number(env, ENV_PAGE_SIZE, &mut self.page_size)?;
        override_number(env, ENV_BATCH_SIZE, &mut self.batch_size)?;
        override_number(env, ENV_MAX_BATCH_ROUNDS, &mut self.max_batch_rounds)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        SettingsValidator::new(self).validate()
    }

    pub fn service_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(&self.endpoint)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn override_number<T: FromStr>(
    env: &EnvContext,
    key: &str,
    field: &mut T,
) -> Result<(), SettingsError> {
    if let Some(raw) = env.get(key) {
        *field = raw.parse().map_err(|_| SettingsError::InvalidEnv {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        debug!("Overriding setting from {key}");
    }
    Ok(())
}
