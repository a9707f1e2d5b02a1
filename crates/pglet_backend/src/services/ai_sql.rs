use super::http::{LazyClient, endpoint, error_message};
use pglet_api::{AiChatMessage, AiGenerateRequest, AiGenerateResponse};
use pglet_domain::{AiSqlRequest, AiSqlResponse, AiSqlService};
use std::time::Duration;

const GENERATE_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Text-to-SQL generation through the `/api/ai/generate` endpoint.
pub struct HttpAiSqlService {
    base_url: String,
    database: Option<String>,
    http: LazyClient,
}

impl HttpAiSqlService {
    pub fn new(base_url: impl Into<String>, database: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database,
            http: LazyClient::new(GENERATE_REQUEST_TIMEOUT),
        }
    }

    fn request_body(&self, request: AiSqlRequest) -> AiGenerateRequest {
        AiGenerateRequest {
            prompt: request.prompt,
            database: self.database.clone(),
            messages: request
                .messages
                .into_iter()
                .map(|message| AiChatMessage {
                    role: message.role.as_str().to_owned(),
                    content: message.content,
                })
                .collect(),
        }
    }
}

impl AiSqlService for HttpAiSqlService {
    fn generate_sql(&self, request: AiSqlRequest) -> Result<AiSqlResponse, String> {
        let body = self.request_body(request);
        let response = self
            .http
            .get()?
            .post(endpoint(&self.base_url, "/api/ai/generate"))
            .json(&body)
            .send()
            .map_err(|err| format!("AI request failed: {err}"))?;
        if !response.status().is_success() {
            return Err(error_message(response));
        }

        let generated: AiGenerateResponse = response
            .json()
            .map_err(|err| format!("invalid AI response: {err}"))?;
        if generated.sql.trim().is_empty() {
            return Err("AI response did not contain SQL".to_owned());
        }
        Ok(AiSqlResponse {
            sql: generated.sql,
            explanation: generated.explanation,
        })
    }
}

/// Used when no generation endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledAiSqlService;

impl AiSqlService for DisabledAiSqlService {
    fn generate_sql(&self, _request: AiSqlRequest) -> Result<AiSqlResponse, String> {
        Err("AI generation is not configured; set PGLET_AI_URL".to_owned())
    }
}
