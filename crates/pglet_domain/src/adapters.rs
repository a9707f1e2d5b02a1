use crate::AiMessage;
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AiSqlRequest {
    pub prompt: String,
    pub messages: Vec<AiMessage>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AiSqlResponse {
    pub sql: String,
    pub explanation: String,
}

/// String-keyed settings resource the session is persisted into.
pub trait SettingsGateway: Send + Sync {
    fn load_settings(&self) -> Result<HashMap<String, String>, String>;

    /// Upserts the given keys; keys not present are left untouched.
    fn save_settings(&self, settings: HashMap<String, String>) -> Result<(), String>;
}

pub trait AiSqlService: Send + Sync {
    fn generate_sql(&self, request: AiSqlRequest) -> Result<AiSqlResponse, String>;
}
