/// Settings key holding the serialized session.
pub const TABS_SETTINGS_KEY: &str = "tabs";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Stored session shape. Versionless: every field except a tab's `id` is optional on read and
/// unknown fields are ignored. Aliases accept the field names used by older frontends.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub tabs: Vec<PersistedTab>,
    #[serde(default)]
    pub active_tab_id: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTab {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "sql")]
    pub sql_text: String,
    #[serde(default, alias = "savedQueryId", skip_serializing_if = "Option::is_none")]
    pub saved_query_ref: Option<String>,
    #[serde(default, alias = "tableName", skip_serializing_if = "Option::is_none")]
    pub table_ref: Option<String>,
    #[serde(default, alias = "functionName", skip_serializing_if = "Option::is_none")]
    pub function_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_view: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub user_renamed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ai_renamed: bool,
    #[serde(default, alias = "aiTurns", skip_serializing_if = "Vec::is_empty")]
    pub ai_conversation: Vec<PersistedAiTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_current_turn_index: Option<usize>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PersistedAiTurn {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
}
