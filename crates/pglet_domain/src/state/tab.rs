use super::{AiConversation, TabId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TabKind {
    Query,
    Table,
    Function,
    Ai,
}

impl TabKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Table => "table",
            Self::Function => "function",
            Self::Ai => "ai",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "query" => Some(Self::Query),
            "table" => Some(Self::Table),
            "function" => Some(Self::Function),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum TableView {
    #[default]
    Rows,
    Structure,
    Indexes,
    Constraints,
}

impl TableView {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Structure => "structure",
            Self::Indexes => "indexes",
            Self::Constraints => "constraints",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "rows" => Some(Self::Rows),
            "structure" => Some(Self::Structure),
            "indexes" => Some(Self::Indexes),
            "constraints" => Some(Self::Constraints),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AiTab {
    pub sql: String,
    pub conversation: AiConversation,
    pub draft_prompt: String,
    pub error: Option<String>,
    pub generating: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TabContent {
    Query {
        sql: String,
        saved_query_id: Option<String>,
    },
    Table {
        table: String,
        view: TableView,
        sql: String,
    },
    Function {
        function: String,
        sql: String,
    },
    Ai(AiTab),
}

impl TabContent {
    pub fn empty_query() -> Self {
        Self::Query {
            sql: String::new(),
            saved_query_id: None,
        }
    }

    pub fn kind(&self) -> TabKind {
        match self {
            Self::Query { .. } => TabKind::Query,
            Self::Table { .. } => TabKind::Table,
            Self::Function { .. } => TabKind::Function,
            Self::Ai(_) => TabKind::Ai,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavedQueryRef {
    pub id: String,
    pub title: String,
}

/// Field-wise update of a tab. Fields that have no meaning for the tab's kind are ignored.
/// `preview` is resolved by the session, which owns the single-preview rule.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TabPatch {
    pub title: Option<String>,
    pub preview: Option<bool>,
    pub sql: Option<String>,
    pub saved_query_id: Option<Option<String>>,
    pub active_view: Option<TableView>,
    pub ai_prompt: Option<String>,
    pub ai_error: Option<Option<String>>,
}

impl TabPatch {
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub is_preview: bool,
    pub user_renamed: bool,
    pub ai_renamed: bool,
    pub content: TabContent,
}

impl Tab {
    pub fn new(id: TabId, title: impl Into<String>, content: TabContent) -> Self {
        Self {
            id,
            title: title.into(),
            is_preview: false,
            user_renamed: false,
            ai_renamed: false,
            content,
        }
    }

    pub fn kind(&self) -> TabKind {
        self.content.kind()
    }

    pub fn sql(&self) -> &str {
        match &self.content {
            TabContent::Query { sql, .. }
            | TabContent::Table { sql, .. }
            | TabContent::Function { sql, .. } => sql,
            TabContent::Ai(ai) => &ai.sql,
        }
    }

    pub(crate) fn sql_mut(&mut self) -> &mut String {
        match &mut self.content {
            TabContent::Query { sql, .. }
            | TabContent::Table { sql, .. }
            | TabContent::Function { sql, .. } => sql,
            TabContent::Ai(ai) => &mut ai.sql,
        }
    }

    pub fn table_ref(&self) -> Option<&str> {
        match &self.content {
            TabContent::Table { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn function_ref(&self) -> Option<&str> {
        match &self.content {
            TabContent::Function { function, .. } => Some(function),
            _ => None,
        }
    }

    pub fn saved_query_id(&self) -> Option<&str> {
        match &self.content {
            TabContent::Query { saved_query_id, .. } => saved_query_id.as_deref(),
            _ => None,
        }
    }

    pub fn active_view(&self) -> Option<TableView> {
        match &self.content {
            TabContent::Table { view, .. } => Some(*view),
            _ => None,
        }
    }

    pub fn ai(&self) -> Option<&AiTab> {
        match &self.content {
            TabContent::Ai(ai) => Some(ai),
            _ => None,
        }
    }

    pub(crate) fn ai_mut(&mut self) -> Option<&mut AiTab> {
        match &mut self.content {
            TabContent::Ai(ai) => Some(ai),
            _ => None,
        }
    }

    /// Returns whether anything changed. Editing the SQL of a preview tab pins it.
    pub(crate) fn apply_patch(&mut self, patch: TabPatch) -> bool {
        let mut changed = false;

        if let Some(title) = patch.title
            && title != self.title
        {
            self.title = title;
            changed = true;
        }

        if let Some(sql) = patch.sql
            && sql != self.sql()
        {
            *self.sql_mut() = sql;
            self.is_preview = false;
            changed = true;
        }

        match &mut self.content {
            TabContent::Query { saved_query_id, .. } => {
                if let Some(next) = patch.saved_query_id
                    && *saved_query_id != next
                {
                    *saved_query_id = next;
                    changed = true;
                }
            }
            TabContent::Table { view, .. } => {
                if let Some(next) = patch.active_view
                    && *view != next
                {
                    *view = next;
                    changed = true;
                }
            }
            TabContent::Function { .. } => {}
            TabContent::Ai(ai) => {
                if let Some(prompt) = patch.ai_prompt
                    && ai.draft_prompt != prompt
                {
                    ai.draft_prompt = prompt;
                    changed = true;
                }
                if let Some(error) = patch.ai_error
                    && ai.error != error
                {
                    ai.error = error;
                    changed = true;
                }
            }
        }

        changed
    }
}
