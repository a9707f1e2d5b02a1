use super::http::{LazyClient, endpoint, error_message};
use pglet_domain::SettingsGateway;
use std::collections::HashMap;
use std::time::Duration;

const SETTINGS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings resource served by another pglet instance at `{base_url}/api/settings`.
pub struct HttpSettingsGateway {
    base_url: String,
    http: LazyClient,
}

impl HttpSettingsGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: LazyClient::new(SETTINGS_REQUEST_TIMEOUT),
        }
    }
}

/// Remote values are usually strings; anything else is kept as its JSON text.
fn into_string_map(raw: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

impl SettingsGateway for HttpSettingsGateway {
    fn load_settings(&self) -> Result<HashMap<String, String>, String> {
        let response = self
            .http
            .get()?
            .get(endpoint(&self.base_url, "/api/settings"))
            .send()
            .map_err(|err| format!("failed to load settings: {err}"))?;
        if !response.status().is_success() {
            return Err(error_message(response));
        }
        let raw: HashMap<String, serde_json::Value> = response
            .json()
            .map_err(|err| format!("invalid settings response: {err}"))?;
        Ok(into_string_map(raw))
    }

    fn save_settings(&self, settings: HashMap<String, String>) -> Result<(), String> {
        let response = self
            .http
            .get()?
            .put(endpoint(&self.base_url, "/api/settings"))
            .json(&settings)
            .send()
            .map_err(|err| format!("failed to save settings: {err}"))?;
        if !response.status().is_success() {
            return Err(error_message(response));
        }
        Ok(())
    }
}
