use crate::{AiTurn, SavedQueryRef, TabId, TabPatch};

#[derive(Clone, Debug)]
pub enum Action {
    AppStarted,

    SessionLoaded {
        tabs_json: Option<String>,
    },
    SessionLoadFailed {
        message: String,
    },

    AddQueryTab,
    AddAiTab,
    AddTableTab {
        table: String,
        preview: bool,
    },
    AddFunctionTab {
        function: String,
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
        saved_query: Option<SavedQueryRef>,
    },

    AppendAiTurn {
        tab_id: TabId,
        turn: AiTurn,
    },
    SetAiTurnIndex {
        tab_id: TabId,
        index: usize,
    },
    AiPromptChanged {
        tab_id: TabId,
        prompt: String,
    },
    SubmitAiPrompt {
        tab_id: TabId,
    },
    AiSqlGenerated {
        tab_id: TabId,
        turn: AiTurn,
    },
    AiSqlGenerationFailed {
        tab_id: TabId,
        message: String,
    },
    AiTitleSuggested {
        tab_id: TabId,
        title: String,
    },
}
