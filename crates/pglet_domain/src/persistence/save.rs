use crate::{PersistedAiTurn, PersistedSession, PersistedTab, Session, Tab, TabContent};

pub(crate) fn to_persisted_session(session: &Session) -> PersistedSession {
    let tabs: Vec<PersistedTab> = session
        .tabs
        .iter()
        .filter(|tab| !tab.is_preview)
        .map(to_persisted_tab)
        .collect();

    let active = session.active_tab.as_str();
    let active_tab_id = if tabs.iter().any(|tab| tab.id == active) {
        Some(active.to_owned())
    } else {
        tabs.first().map(|tab| tab.id.clone())
    };

    PersistedSession {
        tabs,
        active_tab_id,
    }
}

fn to_persisted_tab(tab: &Tab) -> PersistedTab {
    let mut persisted = PersistedTab {
        id: tab.id.as_str().to_owned(),
        title: tab.title.clone(),
        kind: Some(tab.kind().as_str().to_owned()),
        sql_text: tab.sql().to_owned(),
        user_renamed: tab.user_renamed,
        ai_renamed: tab.ai_renamed,
        ..PersistedTab::default()
    };

    match &tab.content {
        TabContent::Query { saved_query_id, .. } => {
            persisted.saved_query_ref = saved_query_id.clone();
        }
        TabContent::Table { table, view, .. } => {
            persisted.table_ref = Some(table.clone());
            persisted.active_view = Some(view.as_str().to_owned());
        }
        TabContent::Function { function, .. } => {
            persisted.function_ref = Some(function.clone());
        }
        TabContent::Ai(ai) => {
            persisted.ai_conversation = ai
                .conversation
                .turns()
                .iter()
                .map(|turn| PersistedAiTurn {
                    prompt: turn.prompt.clone(),
                    sql: turn.sql.clone(),
                    explanation: turn.explanation.clone(),
                })
                .collect();
            persisted.ai_current_turn_index = ai.conversation.current_index();
        }
    }

    persisted
}
