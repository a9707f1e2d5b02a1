use pglet_api::ErrorResponse;
use reqwest::blocking::{Client, Response};
use std::sync::OnceLock;
use std::time::Duration;

/// Blocking HTTP client built on first use. Construction has to happen off the async
/// runtime, so it is deferred until a request runs on a blocking thread.
pub(super) struct LazyClient {
    timeout: Duration,
    client: OnceLock<Client>,
}

impl LazyClient {
    pub(super) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    pub(super) fn get(&self) -> Result<&Client, String> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        let _ = self.client.set(client);
        self.client
            .get()
            .ok_or_else(|| "failed to initialize http client".to_owned())
    }
}

pub(super) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

/// Turns a non-success response into the server's `{ "error": … }` message when present.
pub(super) fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>() {
        Ok(body) if !body.error.trim().is_empty() => body.error,
        _ => format!("request failed with status {status}"),
    }
}
