use crate::reducer::{AI_TITLE_PREFIX, QUERY_TITLE_PREFIX};
use crate::{
    AiConversation, AiTab, AiTurn, PersistedSession, PersistedTab, Session, Tab, TabContent, TabId,
    TabKind, TableView,
};
use std::collections::HashSet;

/// Parses a stored `tabs` value, rejecting shapes that cannot seed a session.
pub(crate) fn parse_persisted_session(raw: &str) -> Result<PersistedSession, String> {
    let persisted: PersistedSession =
        serde_json::from_str(raw).map_err(|err| format!("invalid saved session: {err}"))?;
    if persisted.tabs.is_empty() {
        return Err("saved session has no tabs".to_owned());
    }
    if persisted.tabs.iter().any(|tab| tab.id.trim().is_empty()) {
        return Err("saved session has a tab without an id".to_owned());
    }
    Ok(persisted)
}

/// Replaces the open tabs wholesale. Returns false when nothing usable was stored.
pub(crate) fn apply_persisted_session(session: &mut Session, persisted: PersistedSession) -> bool {
    let mut seen = HashSet::new();
    let tabs: Vec<Tab> = persisted
        .tabs
        .into_iter()
        .filter(|tab| seen.insert(tab.id.clone()))
        .map(restore_tab)
        .collect();

    let Some(first) = tabs.first() else {
        return false;
    };
    let active_tab = persisted
        .active_tab_id
        .map(TabId::new)
        .filter(|id| tabs.iter().any(|tab| tab.id == *id))
        .unwrap_or_else(|| first.id.clone());

    session.tabs = tabs;
    session.active_tab = active_tab;
    resync_counters(session);
    true
}

fn infer_kind(tab: &PersistedTab) -> TabKind {
    if let Some(kind) = tab.kind.as_deref().and_then(TabKind::parse) {
        return kind;
    }
    if !tab.ai_conversation.is_empty() {
        TabKind::Ai
    } else if tab.table_ref.is_some() {
        TabKind::Table
    } else if tab.function_ref.is_some() {
        TabKind::Function
    } else {
        TabKind::Query
    }
}

fn restore_tab(persisted: PersistedTab) -> Tab {
    let kind = infer_kind(&persisted);
    let PersistedTab {
        id,
        title,
        sql_text,
        saved_query_ref,
        table_ref,
        function_ref,
        active_view,
        user_renamed,
        ai_renamed,
        ai_conversation,
        ai_current_turn_index,
        ..
    } = persisted;

    let content = match kind {
        TabKind::Query => TabContent::Query {
            sql: sql_text,
            saved_query_id: saved_query_ref,
        },
        TabKind::Table => TabContent::Table {
            table: table_ref.unwrap_or_else(|| title.clone()),
            view: active_view
                .as_deref()
                .and_then(TableView::parse)
                .unwrap_or_default(),
            sql: sql_text,
        },
        TabKind::Function => TabContent::Function {
            function: function_ref.unwrap_or_else(|| title.clone()),
            sql: sql_text,
        },
        TabKind::Ai => {
            let turns = ai_conversation
                .into_iter()
                .map(|turn| AiTurn::new(turn.prompt, turn.sql, turn.explanation))
                .collect();
            TabContent::Ai(AiTab {
                sql: sql_text,
                conversation: AiConversation::from_turns(turns, ai_current_turn_index),
                ..AiTab::default()
            })
        }
    };

    let mut tab = Tab::new(TabId::new(id), title, content);
    tab.user_renamed = user_renamed;
    tab.ai_renamed = ai_renamed;
    tab
}

fn title_number(title: &str, prefix: &str) -> Option<u64> {
    title.strip_prefix(prefix)?.trim().parse().ok()
}

fn resync_counters(session: &mut Session) {
    for tab in &session.tabs {
        if let Some(value) = tab.id.counter_value() {
            session.next_tab_id = session.next_tab_id.max(value.saturating_add(1));
        }
        if let Some(n) = title_number(&tab.title, QUERY_TITLE_PREFIX) {
            session.next_query_number = session.next_query_number.max(n.saturating_add(1));
        }
        if let Some(n) = title_number(&tab.title, AI_TITLE_PREFIX) {
            session.next_ai_number = session.next_ai_number.max(n.saturating_add(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_structurally_invalid_sessions() {
        assert!(parse_persisted_session("malformed-json").is_err());
        assert!(parse_persisted_session(r#"{"tabs":[]}"#).is_err());
        assert!(parse_persisted_session(r#"{"tabs":[{"title":"x"}]}"#).is_err());
        assert!(parse_persisted_session(r#"{"tabs":[{"id":"  "}]}"#).is_err());
        assert!(parse_persisted_session(r#"{"tabs":[{"id":"a"}],"extra":1}"#).is_ok());
    }

    #[test]
    fn restores_tabs_and_infers_missing_kinds() {
        let raw = r#"{
            "tabs": [
                {"id": "q", "title": "Query 4", "sqlText": "select 1", "savedQueryRef": "sq-1"},
                {"id": "t", "title": "users", "tableRef": "public.users", "activeView": "indexes"},
                {"id": "f", "title": "touch", "type": "function", "functionName": "public.touch()"},
                {"id": "a", "title": "AI Query 2", "aiTurns": [{"prompt": "p", "sql": "select 2"}],
                 "aiCurrentTurnIndex": 9, "userRenamed": true}
            ],
            "activeTabId": "t"
        }"#;
        let mut session = Session::new();
        let persisted = parse_persisted_session(raw).unwrap();
        assert!(apply_persisted_session(&mut session, persisted));

        let kinds: Vec<_> = session.tabs().iter().map(Tab::kind).collect();
        assert_eq!(
            kinds,
            vec![TabKind::Query, TabKind::Table, TabKind::Function, TabKind::Ai]
        );
        assert_eq!(session.active_tab_id().as_str(), "t");

        let query = &session.tabs()[0];
        assert_eq!(query.sql(), "select 1");
        assert_eq!(query.saved_query_id(), Some("sq-1"));

        let table = &session.tabs()[1];
        assert_eq!(table.table_ref(), Some("public.users"));
        assert_eq!(table.active_view(), Some(TableView::Indexes));

        assert_eq!(session.tabs()[2].function_ref(), Some("public.touch()"));

        let ai = &session.tabs()[3];
        assert!(ai.user_renamed);
        let conversation = &ai.ai().unwrap().conversation;
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.current_index(), Some(0));
        assert!(session.tabs().iter().all(|tab| !tab.is_preview));
    }

    #[test]
    fn drops_duplicate_ids_and_repairs_active_tab() {
        let raw = r#"{"tabs":[{"id":"a","title":"one"},{"id":"a","title":"two"},{"id":"b"}],
                      "activeTabId":"gone"}"#;
        let mut session = Session::new();
        apply_persisted_session(&mut session, parse_persisted_session(raw).unwrap());

        let titles: Vec<_> = session.tabs().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["one", ""]);
        assert_eq!(session.active_tab_id().as_str(), "a");
    }

    #[test]
    fn counters_move_past_restored_names_and_ids() {
        let raw = r#"{"tabs":[{"id":"tab-7","title":"Query 3"},{"id":"x","title":"AI Query 5"}]}"#;
        let mut session = Session::new();
        apply_persisted_session(&mut session, parse_persisted_session(raw).unwrap());

        assert_eq!(session.next_tab_id, 8);
        assert_eq!(session.next_query_number, 4);
        assert_eq!(session.next_ai_number, 6);
    }
}
