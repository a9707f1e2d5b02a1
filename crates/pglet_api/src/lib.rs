use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const PROTOCOL_VERSION: u32 = 1;

/// Flat string settings resource served at `/api/settings`.
pub type SettingsMap = BTreeMap<String, String>;

/// Settings keys the HTTP surface never writes.
pub const RESERVED_SETTINGS_KEYS: [&str; 2] = ["ai_api_key", "ai_api_key_set"];

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub rev: u64,
    pub initialized: bool,
    pub active_tab_id: TabId,
    pub tabs: Vec<TabSnapshot>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabKind {
    Query,
    Table,
    Function,
    Ai,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableView {
    Rows,
    Structure,
    Indexes,
    Constraints,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub kind: TabKind,
    pub title: String,
    pub is_preview: bool,
    #[serde(default)]
    pub user_renamed: bool,
    #[serde(default)]
    pub ai_renamed: bool,
    #[serde(default)]
    pub sql_text: String,
    #[serde(default)]
    pub saved_query_id: Option<String>,
    #[serde(default)]
    pub table_ref: Option<String>,
    #[serde(default)]
    pub function_ref: Option<String>,
    #[serde(default)]
    pub active_view: Option<TableView>,
    #[serde(default)]
    pub ai: Option<AiTabSnapshot>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AiTabSnapshot {
    #[serde(default)]
    pub turns: Vec<AiTurnSnapshot>,
    #[serde(default)]
    pub current_turn_index: Option<usize>,
    #[serde(default)]
    pub draft_prompt: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub generating: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AiTurnSnapshot {
    pub prompt: String,
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SavedQueryRef {
    pub id: String,
    pub title: String,
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TabPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub saved_query_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_view: Option<TableView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_error: Option<Option<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    AddQueryTab,
    AddAiTab,
    AddTableTab {
        table: String,
        #[serde(default)]
        preview: bool,
    },
    AddFunctionTab {
        function: String,
        #[serde(default)]
        preview: bool,
    },
    PinTab {
        tab_id: TabId,
    },
    CloseTab {
        tab_id: TabId,
    },
    SetActiveTab {
        tab_id: TabId,
    },
    UpdateTab {
        tab_id: TabId,
        patch: TabPatch,
    },
    RenameTab {
        tab_id: TabId,
        title: String,
    },
    ReorderTabs {
        from_index: usize,
        to_index: usize,
    },
    OpenSql {
        sql: String,
        #[serde(default)]
        saved_query: Option<SavedQueryRef>,
    },
    AppendAiTurn {
        tab_id: TabId,
        turn: AiTurnSnapshot,
    },
    SetAiTurnIndex {
        tab_id: TabId,
        index: usize,
    },
    AiPromptChanged {
        tab_id: TabId,
        prompt: String,
    },
    AiPromptSubmit {
        tab_id: TabId,
    },
    AiTitleSuggested {
        tab_id: TabId,
        title: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    Hello {
        protocol_version: u32,
        #[serde(default)]
        last_seen_rev: Option<u64>,
    },
    Action {
        request_id: String,
        action: Box<ClientAction>,
    },
    Ping,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Hello {
        protocol_version: u32,
        current_rev: u64,
    },
    Ack {
        request_id: String,
        rev: u64,
    },
    Event {
        rev: u64,
        event: Box<ServerEvent>,
    },
    Error {
        request_id: Option<String>,
        message: String,
    },
    Pong,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    SessionChanged { snapshot: Box<SessionSnapshot> },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AiChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST {ai_url}/api/ai/generate`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AiGenerateRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<AiChatMessage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AiGenerateResponse {
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RevResponse {
    pub rev: u64,
}
