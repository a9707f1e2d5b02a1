use crate::persistence;
use crate::{
    Action, AiSqlRequest, AiTab, AiTurn, Effect, PersistedSession, SavedQueryRef, Session, Tab,
    TabContent, TabId, TabKind, TabPatch, TableView, format_sql,
};

mod title;

pub use title::derive_tab_title;

pub(crate) const QUERY_TITLE_PREFIX: &str = "Query ";
pub(crate) const AI_TITLE_PREFIX: &str = "AI Query ";

/// A table or function opened from the schema browser.
#[derive(Clone, Copy, Debug)]
enum BrowseTarget<'a> {
    Table(&'a str),
    Function(&'a str),
}

impl BrowseTarget<'_> {
    fn matches(self, tab: &Tab) -> bool {
        match self {
            Self::Table(name) => tab.table_ref() == Some(name),
            Self::Function(name) => tab.function_ref() == Some(name),
        }
    }

    fn title(self) -> String {
        match self {
            Self::Table(name) | Self::Function(name) => name.to_owned(),
        }
    }

    fn content(self) -> TabContent {
        match self {
            Self::Table(name) => TabContent::Table {
                table: name.to_owned(),
                view: TableView::Rows,
                sql: String::new(),
            },
            Self::Function(name) => TabContent::Function {
                function: name.to_owned(),
                sql: String::new(),
            },
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A single empty `Query 1` tab, not yet hydrated.
    pub fn new() -> Self {
        let mut session = Self {
            tabs: Vec::new(),
            active_tab: TabId::from_counter(1),
            next_tab_id: 1,
            next_query_number: 1,
            next_ai_number: 1,
            initialized: false,
        };
        session.add_query_tab();
        session
    }

    pub fn apply(&mut self, action: Action) -> Vec<Effect> {
        let changed = match action {
            Action::AppStarted => {
                return if self.initialized {
                    Vec::new()
                } else {
                    vec![Effect::LoadSession]
                };
            }
            Action::SessionLoaded { tabs_json } => {
                self.hydrate(tabs_json.as_deref());
                return Vec::new();
            }
            Action::SessionLoadFailed { .. } => {
                self.initialized = true;
                return Vec::new();
            }

            Action::AddQueryTab => {
                self.add_query_tab();
                true
            }
            Action::AddAiTab => {
                self.add_ai_tab();
                true
            }
            Action::AddTableTab { table, preview } => {
                self.add_table_tab(&table, preview);
                true
            }
            Action::AddFunctionTab { function, preview } => {
                self.add_function_tab(&function, preview);
                true
            }
            Action::PinTab { tab_id } => self.pin_tab(&tab_id),
            Action::CloseTab { tab_id } => self.close_tab(&tab_id),
            Action::SetActiveTab { tab_id } => self.set_active_tab(&tab_id),
            Action::UpdateTab { tab_id, patch } => self.update_tab(&tab_id, patch),
            Action::RenameTab { tab_id, title } => self.rename_tab(&tab_id, title),
            Action::ReorderTabs {
                from_index,
                to_index,
            } => self.reorder_tabs(from_index, to_index),
            Action::OpenSql { sql, saved_query } => {
                self.open_sql(sql, saved_query);
                true
            }

            Action::AppendAiTurn { tab_id, turn } => self.append_ai_turn(&tab_id, turn),
            Action::SetAiTurnIndex { tab_id, index } => self.set_ai_turn_index(&tab_id, index),
            Action::AiPromptChanged { tab_id, prompt } => {
                if let Some(ai) = self.tab_mut(&tab_id).and_then(Tab::ai_mut) {
                    ai.draft_prompt = prompt;
                }
                return Vec::new();
            }
            Action::SubmitAiPrompt { tab_id } => {
                return self.submit_ai_prompt(&tab_id).into_iter().collect();
            }
            Action::AiSqlGenerated { tab_id, turn } => {
                if let Some(ai) = self.tab_mut(&tab_id).and_then(Tab::ai_mut) {
                    ai.generating = false;
                }
                self.append_ai_turn(&tab_id, turn)
            }
            Action::AiSqlGenerationFailed { tab_id, message } => {
                if let Some(ai) = self.tab_mut(&tab_id).and_then(Tab::ai_mut) {
                    ai.generating = false;
                    ai.error = Some(message);
                }
                return Vec::new();
            }
            Action::AiTitleSuggested { tab_id, title } => self.apply_ai_title(&tab_id, title),
        };

        if changed && self.initialized {
            vec![Effect::SaveSession]
        } else {
            Vec::new()
        }
    }

    pub fn to_persisted(&self) -> PersistedSession {
        persistence::to_persisted_session(self)
    }

    /// Serialized form stored under the `tabs` settings key.
    pub fn to_settings_value(&self) -> Result<String, String> {
        serde_json::to_string(&self.to_persisted()).map_err(|err| err.to_string())
    }

    fn next_id(&mut self) -> TabId {
        let id = TabId::from_counter(self.next_tab_id);
        self.next_tab_id += 1;
        id
    }

    fn push_active(&mut self, tab: Tab) -> TabId {
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab = id.clone();
        id
    }

    fn hydrate(&mut self, tabs_json: Option<&str>) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let Some(raw) = tabs_json.filter(|raw| !raw.trim().is_empty()) else {
            return;
        };
        if let Ok(persisted) = persistence::parse_persisted_session(raw) {
            persistence::apply_persisted_session(self, persisted);
        }
    }

    pub fn add_query_tab(&mut self) -> TabId {
        let title = format!("{QUERY_TITLE_PREFIX}{}", self.next_query_number);
        self.next_query_number += 1;
        let id = self.next_id();
        self.push_active(Tab::new(id, title, TabContent::empty_query()))
    }

    pub fn add_ai_tab(&mut self) -> TabId {
        let title = format!("{AI_TITLE_PREFIX}{}", self.next_ai_number);
        self.next_ai_number += 1;
        let id = self.next_id();
        self.push_active(Tab::new(id, title, TabContent::Ai(AiTab::default())))
    }

    pub fn add_table_tab(&mut self, table: &str, preview: bool) -> TabId {
        self.open_browse_target(BrowseTarget::Table(table), preview)
    }

    pub fn add_function_tab(&mut self, function: &str, preview: bool) -> TabId {
        self.open_browse_target(BrowseTarget::Function(function), preview)
    }

    fn open_browse_target(&mut self, target: BrowseTarget<'_>, preview: bool) -> TabId {
        if let Some(tab) = self.tabs.iter_mut().find(|tab| target.matches(tab)) {
            if !preview {
                tab.is_preview = false;
            }
            self.active_tab = tab.id.clone();
            return tab.id.clone();
        }

        if preview && let Some(tab) = self.tabs.iter_mut().find(|tab| tab.is_preview) {
            tab.title = target.title();
            tab.content = target.content();
            tab.user_renamed = false;
            tab.ai_renamed = false;
            self.active_tab = tab.id.clone();
            return tab.id.clone();
        }

        let id = self.next_id();
        let mut tab = Tab::new(id, target.title(), target.content());
        tab.is_preview = preview;
        self.push_active(tab)
    }

    pub fn pin_tab(&mut self, tab_id: &TabId) -> bool {
        match self.tab_mut(tab_id) {
            Some(tab) if tab.is_preview => {
                tab.is_preview = false;
                true
            }
            _ => false,
        }
    }

    pub fn close_tab(&mut self, tab_id: &TabId) -> bool {
        let Some(index) = self.tab_index(tab_id) else {
            return false;
        };
        let was_active = self.active_tab == *tab_id;
        self.tabs.remove(index);

        if self.tabs.is_empty() {
            self.add_query_tab();
            return true;
        }

        if was_active && let Some(next) = self.tabs.get(index).or_else(|| self.tabs.first()) {
            self.active_tab = next.id.clone();
        }
        true
    }

    /// Activates a tab and drops every other preview tab.
    pub fn set_active_tab(&mut self, tab_id: &TabId) -> bool {
        if self.tab_index(tab_id).is_none() {
            return false;
        }
        let before = self.tabs.len();
        self.tabs.retain(|tab| !tab.is_preview || tab.id == *tab_id);

        let changed = before != self.tabs.len() || self.active_tab != *tab_id;
        self.active_tab = tab_id.clone();
        changed
    }

    pub fn update_tab(&mut self, tab_id: &TabId, mut patch: TabPatch) -> bool {
        let preview = patch.preview.take();
        let other_preview = self
            .tabs
            .iter()
            .any(|tab| tab.is_preview && tab.id != *tab_id);
        let Some(tab) = self.tab_mut(tab_id) else {
            return false;
        };

        let mut changed = false;
        match preview {
            Some(false) if tab.is_preview => {
                tab.is_preview = false;
                changed = true;
            }
            Some(true) if !tab.is_preview && !other_preview => {
                tab.is_preview = true;
                changed = true;
            }
            _ => {}
        }

        tab.apply_patch(patch) || changed
    }

    pub fn rename_tab(&mut self, tab_id: &TabId, title: String) -> bool {
        let Some(tab) = self.tab_mut(tab_id) else {
            return false;
        };
        if tab.user_renamed && tab.title == title {
            return false;
        }
        tab.title = title;
        tab.user_renamed = true;
        true
    }

    pub fn reorder_tabs(&mut self, from_index: usize, to_index: usize) -> bool {
        let len = self.tabs.len();
        if from_index == to_index || from_index >= len || to_index >= len {
            return false;
        }
        let tab = self.tabs.remove(from_index);
        self.tabs.insert(to_index, tab);
        true
    }

    /// Loads SQL into the active blank query tab, or a new query tab otherwise.
    pub fn open_sql(&mut self, sql: String, saved_query: Option<SavedQueryRef>) -> TabId {
        let reusable = self
            .active_tab()
            .filter(|tab| tab.kind() == TabKind::Query && tab.sql().trim().is_empty())
            .map(|tab| tab.id.clone());
        let tab_id = match reusable {
            Some(id) => id,
            None => self.add_query_tab(),
        };

        if let Some(tab) = self.tab_mut(&tab_id) {
            *tab.sql_mut() = sql;
            if let TabContent::Query { saved_query_id, .. } = &mut tab.content {
                *saved_query_id = saved_query.as_ref().map(|saved| saved.id.clone());
            }
            if let Some(saved) = saved_query
                && !tab.user_renamed
            {
                tab.title = saved.title;
            }
        }
        tab_id
    }

    /// Appends a turn to an AI tab and shows its SQL. The first turn names an unnamed tab.
    pub fn append_ai_turn(&mut self, tab_id: &TabId, turn: AiTurn) -> bool {
        let Some(tab) = self.tab_mut(tab_id) else {
            return false;
        };
        let auto_title = !tab.user_renamed && !tab.ai_renamed;
        let Some(ai) = tab.ai_mut() else {
            return false;
        };

        let title = if auto_title && ai.conversation.is_empty() {
            derive_tab_title(&turn.prompt)
        } else {
            None
        };
        ai.sql = format_sql(&turn.sql);
        ai.conversation.push(turn);

        if let Some(title) = title {
            tab.title = title;
        }
        true
    }

    pub fn set_ai_turn_index(&mut self, tab_id: &TabId, index: usize) -> bool {
        let Some(ai) = self.tab_mut(tab_id).and_then(Tab::ai_mut) else {
            return false;
        };
        let Some(turn) = ai.conversation.select(index) else {
            return false;
        };
        let sql = format_sql(&turn.sql);
        ai.sql = sql;
        true
    }

    fn submit_ai_prompt(&mut self, tab_id: &TabId) -> Option<Effect> {
        let ai = self.tab_mut(tab_id).and_then(Tab::ai_mut)?;
        let prompt = ai.draft_prompt.trim().to_owned();
        if prompt.is_empty() || ai.generating {
            return None;
        }

        let messages = ai.conversation.history_messages();
        ai.draft_prompt.clear();
        ai.error = None;
        ai.generating = true;

        Some(Effect::GenerateAiSql {
            tab_id: tab_id.clone(),
            request: AiSqlRequest { prompt, messages },
        })
    }

    fn apply_ai_title(&mut self, tab_id: &TabId, title: String) -> bool {
        let title = title.trim();
        let Some(tab) = self.tab_mut(tab_id) else {
            return false;
        };
        if tab.user_renamed || title.is_empty() {
            return false;
        }
        tab.title = title.to_owned();
        tab.ai_renamed = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AiRole;

    fn hydrated() -> Session {
        let mut session = Session::new();
        session.apply(Action::SessionLoaded { tabs_json: None });
        session
    }

    fn titles(session: &Session) -> Vec<&str> {
        session.tabs().iter().map(|tab| tab.title.as_str()).collect()
    }

    fn ids(session: &Session) -> Vec<&str> {
        session.tabs().iter().map(|tab| tab.id.as_str()).collect()
    }

    fn preview_count(session: &Session) -> usize {
        session.tabs().iter().filter(|tab| tab.is_preview).count()
    }

    fn assert_invariants(session: &Session) {
        assert!(!session.tabs().is_empty());
        assert!(preview_count(session) <= 1);
        assert!(session.active_tab().is_some());
    }

    #[test]
    fn new_session_has_one_query_tab() {
        let session = Session::new();
        assert_eq!(ids(&session), vec!["tab-1"]);
        assert_eq!(titles(&session), vec!["Query 1"]);
        assert_eq!(session.active_tab_id().as_str(), "tab-1");
        assert!(!session.is_initialized());
    }

    #[test]
    fn app_started_requests_load_until_hydrated() {
        let mut session = Session::new();
        assert_eq!(session.apply(Action::AppStarted), vec![Effect::LoadSession]);
        session.apply(Action::SessionLoaded { tabs_json: None });
        assert!(session.is_initialized());
        assert!(session.apply(Action::AppStarted).is_empty());
    }

    #[test]
    fn mutations_only_request_saves_after_hydration() {
        let mut session = Session::new();
        assert!(session.apply(Action::AddQueryTab).is_empty());

        session.apply(Action::SessionLoadFailed {
            message: "offline".to_owned(),
        });
        assert!(session.is_initialized());
        assert_eq!(session.apply(Action::AddQueryTab), vec![Effect::SaveSession]);
    }

    #[test]
    fn no_op_mutations_do_not_request_saves() {
        let mut session = hydrated();
        let unknown = TabId::new("missing");
        assert!(session.apply(Action::PinTab { tab_id: unknown.clone() }).is_empty());
        assert!(session.apply(Action::CloseTab { tab_id: unknown.clone() }).is_empty());
        assert!(
            session
                .apply(Action::SetActiveTab {
                    tab_id: unknown.clone()
                })
                .is_empty()
        );
        assert!(
            session
                .apply(Action::ReorderTabs {
                    from_index: 0,
                    to_index: 5
                })
                .is_empty()
        );
        assert_eq!(ids(&session), vec!["tab-1"]);
    }

    #[test]
    fn query_and_ai_titles_use_separate_monotonic_counters() {
        let mut session = hydrated();
        let second = session.add_query_tab();
        session.add_ai_tab();
        session.close_tab(&second);
        session.add_query_tab();
        session.add_ai_tab();

        assert_eq!(
            titles(&session),
            vec!["Query 1", "AI Query 1", "Query 3", "AI Query 2"]
        );
        assert_eq!(ids(&session), vec!["tab-1", "tab-3", "tab-4", "tab-5"]);
        assert_eq!(session.active_tab_id().as_str(), "tab-5");
    }

    #[test]
    fn preview_table_tab_is_overwritten_in_place() {
        let mut session = hydrated();
        let users = session.add_table_tab("public.users", true);
        assert_eq!(session.tabs().len(), 2);
        assert_eq!(session.tabs()[1].table_ref(), Some("public.users"));
        assert!(session.tabs()[1].is_preview);

        let orders = session.add_table_tab("public.orders", true);
        assert_eq!(orders, users);
        assert_eq!(session.tabs().len(), 2);
        assert_eq!(session.tabs()[1].table_ref(), Some("public.orders"));
        assert_eq!(session.tabs()[1].title, "public.orders");
        assert_eq!(session.active_tab_id(), &orders);
    }

    #[test]
    fn preview_overwrite_can_change_kind_and_resets_view() {
        let mut session = hydrated();
        let preview = session.add_table_tab("public.users", true);
        session.update_tab(
            &preview,
            TabPatch {
                active_view: Some(TableView::Structure),
                ..TabPatch::default()
            },
        );
        session.add_function_tab("public.touch()", true);
        let tab = session.tab(&preview).unwrap();
        assert_eq!(tab.kind(), TabKind::Function);
        assert_eq!(tab.function_ref(), Some("public.touch()"));

        session.add_table_tab("public.users", true);
        assert_eq!(
            session.tab(&preview).unwrap().active_view(),
            Some(TableView::Rows)
        );
    }

    #[test]
    fn activating_another_tab_evicts_the_preview() {
        let mut session = hydrated();
        session.add_table_tab("public.users", true);
        session.add_table_tab("public.orders", true);

        assert!(session.set_active_tab(&TabId::new("tab-1")));
        assert_eq!(ids(&session), vec!["tab-1"]);
        assert_eq!(session.active_tab_id().as_str(), "tab-1");
    }

    #[test]
    fn activating_the_preview_keeps_it() {
        let mut session = hydrated();
        let preview = session.add_table_tab("public.users", true);
        session.set_active_tab(&TabId::new("tab-1"));
        assert_eq!(session.tabs().len(), 1);

        let preview = {
            let id = session.add_table_tab("public.users", true);
            assert_ne!(id, preview);
            id
        };
        assert!(!session.set_active_tab(&preview));
        assert_eq!(session.tabs().len(), 2);
        assert!(session.tab(&preview).unwrap().is_preview);
    }

    #[test]
    fn reopening_an_open_target_activates_and_promotes() {
        let mut session = hydrated();
        let users = session.add_table_tab("public.users", true);
        session.add_query_tab();

        assert_eq!(session.add_table_tab("public.users", true), users);
        assert!(session.tab(&users).unwrap().is_preview);

        assert_eq!(session.add_table_tab("public.users", false), users);
        assert!(!session.tab(&users).unwrap().is_preview);
        assert_eq!(session.active_tab_id(), &users);
        assert_eq!(session.tabs().len(), 3);
    }

    #[test]
    fn permanent_open_leaves_existing_preview_alone() {
        let mut session = hydrated();
        let preview = session.add_table_tab("public.users", true);
        let pinned = session.add_table_tab("public.orders", false);

        assert_ne!(pinned, preview);
        assert!(session.tab(&preview).unwrap().is_preview);
        assert!(!session.tab(&pinned).unwrap().is_preview);
        assert_eq!(preview_count(&session), 1);
    }

    #[test]
    fn at_most_one_preview_across_browse_sequences() {
        let mut session = hydrated();
        let names = ["a", "b", "c", "d"];
        for step in 0..40usize {
            let name = names[step % names.len()];
            match step % 5 {
                0 => {
                    session.add_table_tab(name, true);
                }
                1 => {
                    session.add_function_tab(name, step % 2 == 0);
                }
                2 => {
                    let id = session.tabs()[step % session.tabs().len()].id.clone();
                    session.pin_tab(&id);
                }
                3 => {
                    let id = session.tabs()[0].id.clone();
                    session.set_active_tab(&id);
                }
                _ => {
                    session.add_function_tab(name, true);
                }
            }
            assert_invariants(&session);
        }
    }

    #[test]
    fn pin_tab_promotes_preview() {
        let mut session = hydrated();
        let preview = session.add_table_tab("public.users", true);
        assert!(session.pin_tab(&preview));
        assert!(!session.pin_tab(&preview));
        assert_eq!(preview_count(&session), 0);
    }

    #[test]
    fn closing_the_only_tab_creates_a_fresh_query_tab() {
        let mut session = hydrated();
        let extra = session.add_query_tab();
        session.close_tab(&extra);
        session.close_tab(&TabId::new("tab-1"));

        assert_eq!(session.tabs().len(), 1);
        let tab = &session.tabs()[0];
        assert_eq!(tab.kind(), TabKind::Query);
        assert_eq!(tab.title, "Query 3");
        assert_eq!(session.active_tab_id(), &tab.id);
        assert_ne!(tab.id.as_str(), "tab-1");
    }

    #[test]
    fn repeated_closes_never_empty_the_session() {
        let mut session = hydrated();
        session.add_ai_tab();
        session.add_table_tab("t", true);
        for _ in 0..10 {
            let id = session.tabs()[0].id.clone();
            session.close_tab(&id);
            assert_invariants(&session);
        }
    }

    fn three_tabs() -> Session {
        let mut session = hydrated();
        session.add_query_tab();
        session.add_query_tab();
        session
    }

    #[test]
    fn closing_active_tab_selects_next_then_first() {
        let mut first = three_tabs();
        first.set_active_tab(&TabId::new("tab-1"));
        first.close_tab(&TabId::new("tab-1"));
        assert_eq!(first.active_tab_id().as_str(), "tab-2");

        let mut middle = three_tabs();
        middle.set_active_tab(&TabId::new("tab-2"));
        middle.close_tab(&TabId::new("tab-2"));
        assert_eq!(middle.active_tab_id().as_str(), "tab-3");

        let mut last = three_tabs();
        last.close_tab(&TabId::new("tab-3"));
        assert_eq!(last.active_tab_id().as_str(), "tab-1");
        assert_eq!(ids(&last), vec!["tab-1", "tab-2"]);
    }

    #[test]
    fn closing_an_inactive_tab_keeps_active() {
        let mut session = three_tabs();
        session.close_tab(&TabId::new("tab-1"));
        assert_eq!(session.active_tab_id().as_str(), "tab-3");
    }

    #[test]
    fn reorder_moves_one_tab() {
        let mut session = three_tabs();
        assert!(session.reorder_tabs(0, 2));
        assert_eq!(ids(&session), vec!["tab-2", "tab-3", "tab-1"]);
        assert!(!session.reorder_tabs(1, 1));
        assert!(!session.reorder_tabs(3, 0));
        assert_eq!(ids(&session), vec!["tab-2", "tab-3", "tab-1"]);
    }

    #[test]
    fn update_patch_can_pin_but_not_add_a_second_preview() {
        let mut session = hydrated();
        let preview = session.add_table_tab("a", true);
        let other = session.add_table_tab("b", false);

        let make_preview = TabPatch {
            preview: Some(true),
            ..TabPatch::default()
        };
        assert!(!session.update_tab(&other, make_preview.clone()));
        assert_eq!(preview_count(&session), 1);

        assert!(session.update_tab(
            &preview,
            TabPatch {
                preview: Some(false),
                ..TabPatch::default()
            }
        ));
        assert!(session.update_tab(&other, make_preview));
        assert!(session.tab(&other).unwrap().is_preview);
    }

    #[test]
    fn editing_preview_sql_pins_it() {
        let mut session = hydrated();
        let preview = session.add_table_tab("public.users", true);
        let effects = session.apply(Action::UpdateTab {
            tab_id: preview.clone(),
            patch: TabPatch::sql("select * from public.users"),
        });
        assert_eq!(effects, vec![Effect::SaveSession]);
        assert!(!session.tab(&preview).unwrap().is_preview);
    }

    #[test]
    fn append_and_select_ai_turns() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.append_ai_turn(&tab_id, AiTurn::new("p1", "select 1", "e1"));
        session.append_ai_turn(&tab_id, AiTurn::new("p2", "select 2", "e2"));

        let ai = session.tab(&tab_id).unwrap().ai().unwrap();
        assert_eq!(ai.conversation.current_index(), Some(1));
        assert_eq!(ai.sql, format_sql("select 2"));

        assert!(session.set_ai_turn_index(&tab_id, 0));
        let ai = session.tab(&tab_id).unwrap().ai().unwrap();
        assert_eq!(ai.conversation.current_index(), Some(0));
        assert_eq!(ai.sql, format_sql("select 1"));

        session.set_ai_turn_index(&tab_id, 42);
        let ai = session.tab(&tab_id).unwrap().ai().unwrap();
        assert_eq!(ai.conversation.current_index(), Some(1));
    }

    #[test]
    fn ai_turn_operations_ignore_other_tabs() {
        let mut session = hydrated();
        let query = session.active_tab_id().clone();
        assert!(!session.append_ai_turn(&query, AiTurn::new("p", "select 1", "e")));
        assert!(!session.append_ai_turn(&TabId::new("gone"), AiTurn::default()));

        let ai = session.add_ai_tab();
        assert!(!session.set_ai_turn_index(&ai, 0));
        assert_eq!(session.tab(&ai).unwrap().ai().unwrap().conversation.current_index(), None);
    }

    #[test]
    fn first_turn_names_the_tab() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.append_ai_turn(&tab_id, AiTurn::new("top customers by revenue", "select 1", ""));
        session.append_ai_turn(&tab_id, AiTurn::new("only last month", "select 2", ""));
        assert_eq!(session.tab(&tab_id).unwrap().title, "top customers by revenue");
    }

    #[test]
    fn user_rename_suppresses_automatic_titles() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.apply(Action::RenameTab {
            tab_id: tab_id.clone(),
            title: "Revenue".to_owned(),
        });
        session.append_ai_turn(&tab_id, AiTurn::new("top customers", "select 1", ""));
        session.apply(Action::AiTitleSuggested {
            tab_id: tab_id.clone(),
            title: "Customer revenue".to_owned(),
        });
        session.open_sql(String::new(), None);

        let tab = session.tab(&tab_id).unwrap();
        assert_eq!(tab.title, "Revenue");
        assert!(tab.user_renamed);
        assert!(!tab.ai_renamed);
    }

    #[test]
    fn ai_suggested_title_wins_over_prompt_title() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        assert!(session.apply_ai_title(&tab_id, " Customer revenue ".to_owned()));
        session.append_ai_turn(&tab_id, AiTurn::new("top customers", "select 1", ""));

        let tab = session.tab(&tab_id).unwrap();
        assert_eq!(tab.title, "Customer revenue");
        assert!(tab.ai_renamed);
    }

    #[test]
    fn submit_prompt_requests_generation_with_history() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.append_ai_turn(&tab_id, AiTurn::new("p1", "select 1", "e1"));

        assert!(
            session
                .apply(Action::SubmitAiPrompt {
                    tab_id: tab_id.clone()
                })
                .is_empty()
        );

        assert!(
            session
                .apply(Action::AiPromptChanged {
                    tab_id: tab_id.clone(),
                    prompt: "  only active ones ".to_owned(),
                })
                .is_empty()
        );
        let effects = session.apply(Action::SubmitAiPrompt {
            tab_id: tab_id.clone(),
        });
        let [Effect::GenerateAiSql { tab_id: target, request }] = effects.as_slice() else {
            panic!("expected a generation request, got {effects:?}");
        };
        assert_eq!(target, &tab_id);
        assert_eq!(request.prompt, "only active ones");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, AiRole::User);
        assert_eq!(request.messages[1].content, "SQL: select 1\nExplanation: e1");

        let ai = session.tab(&tab_id).unwrap().ai().unwrap();
        assert!(ai.generating);
        assert!(ai.draft_prompt.is_empty());

        session.apply(Action::AiPromptChanged {
            tab_id: tab_id.clone(),
            prompt: "again".to_owned(),
        });
        assert!(
            session
                .apply(Action::SubmitAiPrompt {
                    tab_id: tab_id.clone()
                })
                .is_empty()
        );
    }

    #[test]
    fn generation_results_finish_the_request() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.apply(Action::AiPromptChanged {
            tab_id: tab_id.clone(),
            prompt: "count users".to_owned(),
        });
        session.apply(Action::SubmitAiPrompt {
            tab_id: tab_id.clone(),
        });

        let effects = session.apply(Action::AiSqlGenerationFailed {
            tab_id: tab_id.clone(),
            message: "rate limited".to_owned(),
        });
        assert!(effects.is_empty());
        let ai = session.tab(&tab_id).unwrap().ai().unwrap();
        assert!(!ai.generating);
        assert_eq!(ai.error.as_deref(), Some("rate limited"));

        session.apply(Action::AiPromptChanged {
            tab_id: tab_id.clone(),
            prompt: "count users".to_owned(),
        });
        session.apply(Action::SubmitAiPrompt {
            tab_id: tab_id.clone(),
        });
        let effects = session.apply(Action::AiSqlGenerated {
            tab_id: tab_id.clone(),
            turn: AiTurn::new("count users", "select count(*) from users", "counts rows"),
        });
        assert_eq!(effects, vec![Effect::SaveSession]);

        let tab = session.tab(&tab_id).unwrap();
        let ai = tab.ai().unwrap();
        assert!(!ai.generating);
        assert!(ai.error.is_none());
        assert_eq!(ai.conversation.len(), 1);
        assert_eq!(ai.sql, format_sql("select count(*) from users"));
        assert_eq!(tab.title, "count users");
    }

    #[test]
    fn generation_result_for_closed_tab_is_ignored() {
        let mut session = hydrated();
        let tab_id = session.add_ai_tab();
        session.close_tab(&tab_id);
        let effects = session.apply(Action::AiSqlGenerated {
            tab_id,
            turn: AiTurn::new("p", "select 1", ""),
        });
        assert!(effects.is_empty());
        assert_eq!(session.tabs().len(), 1);
    }

    #[test]
    fn open_sql_reuses_blank_active_query_tab() {
        let mut session = hydrated();
        let reused = session.open_sql("select 1".to_owned(), None);
        assert_eq!(reused.as_str(), "tab-1");
        assert_eq!(session.tabs().len(), 1);

        let saved = SavedQueryRef {
            id: "sq-9".to_owned(),
            title: "Active users".to_owned(),
        };
        let opened = session.open_sql("select 2".to_owned(), Some(saved));
        assert_ne!(opened, reused);
        let tab = session.tab(&opened).unwrap();
        assert_eq!(tab.sql(), "select 2");
        assert_eq!(tab.saved_query_id(), Some("sq-9"));
        assert_eq!(tab.title, "Active users");
        assert!(!tab.user_renamed);
        assert_eq!(session.active_tab_id(), &opened);
    }

    #[test]
    fn malformed_saved_session_keeps_default() {
        let mut session = Session::new();
        let effects = session.apply(Action::SessionLoaded {
            tabs_json: Some("malformed-json".to_owned()),
        });
        assert!(effects.is_empty());
        assert!(session.is_initialized());
        assert_eq!(ids(&session), vec!["tab-1"]);
        assert_eq!(titles(&session), vec!["Query 1"]);
    }

    #[test]
    fn saved_session_round_trips_and_late_loads_are_ignored() {
        let mut original = hydrated();
        let ai = original.add_ai_tab();
        original.append_ai_turn(&ai, AiTurn::new("p1", "select 1", "e1"));
        original.add_table_tab("public.users", false);
        original.add_function_tab("public.touch()", true);
        original.rename_tab(&TabId::new("tab-1"), "Scratch".to_owned());
        original.set_active_tab(&ai);
        let stored = original.to_settings_value().unwrap();

        let mut restored = Session::new();
        restored.apply(Action::SessionLoaded {
            tabs_json: Some(stored),
        });
        assert_eq!(ids(&restored), vec!["tab-1", "tab-2", "tab-3"]);
        assert_eq!(titles(&restored), vec!["Scratch", "p1", "public.users"]);
        assert_eq!(restored.active_tab_id(), &ai);
        assert!(restored.tabs()[0].user_renamed);
        assert_eq!(
            restored.tab(&ai).unwrap().ai().unwrap().sql,
            format_sql("select 1")
        );

        let fresh = restored.add_query_tab();
        assert_eq!(fresh.as_str(), "tab-4");
        assert_eq!(restored.tab(&fresh).unwrap().title, "Query 2");

        restored.apply(Action::SessionLoaded {
            tabs_json: Some(r#"{"tabs":[{"id":"other"}]}"#.to_owned()),
        });
        assert_eq!(restored.tabs().len(), 4);
    }
}
