use crate::settings::{ServiceSettings, error::SettingsError, retry::RetryConfig};
use model::pagination::window::validate_page_size;
use reqwest::Url;
use tracing::warn;

/// Checks loaded settings and reports every violation at once.
pub struct SettingsValidator<'a> {
    settings: &'a ServiceSettings,
}

impl<'a> SettingsValidator<'a> {
    pub fn new(settings: &'a ServiceSettings) -> Self {
        Self { settings }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_endpoint(&mut errors);
        self.validate_credentials(&mut errors);
        self.validate_sizes(&mut errors);
        self.validate_retry(&mut errors);

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }
        Ok(())
    }

    fn validate_endpoint(&self, errors: &mut Vec<String>) {
        let endpoint = self.settings.endpoint.trim();
        if endpoint.is_empty() {
            errors.push("endpoint is required".to_string());
            return;
        }

        match Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if url.scheme() == "http" {
                    warn!("Endpoint {endpoint} is not using TLS");
                }
            }
            Ok(url) => errors.push(format!(
                "endpoint must use http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("endpoint '{endpoint}' is not a valid URL: {e}")),
        }
    }

    fn validate_credentials(&self, errors: &mut Vec<String>) {
        let required = [
            ("client_id", &self.settings.client_id),
            ("client_secret", &self.settings.client_secret),
            ("username", &self.settings.username),
            ("password", &self.settings.password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                errors.push(format!("{name} is required"));
            }
        }
    }

    fn validate_sizes(&self, errors: &mut Vec<String>) {
        if let Err(e) = validate_page_size(self.settings.page_size) {
            errors.push(format!("page_size: {e}"));
        }
        if self.settings.batch_size == 0 {
            errors.push("batch_size must be at least 1".to_string());
        }
        if self.settings.max_batch_rounds == 0 {
            errors.push("max_batch_rounds must be at least 1".to_string());
        }
        if self.settings.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be at least 1".to_string());
        }
    }

    fn validate_retry(&self, errors: &mut Vec<String>) {
        let retry = &self.settings.retry;
        let configs: [(&str, &RetryConfig); 3] = [
            ("retry.auth", &retry.auth),
            ("retry.fetch", &retry.fetch),
            ("retry.batch", &retry.batch),
        ];
        for (name, config) in configs {
            if config.max_attempts == 0 {
                errors.push(format!("{name}.max_attempts must be at least 1"));
            }
        }
    }
}
