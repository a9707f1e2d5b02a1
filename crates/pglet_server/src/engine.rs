use anyhow::Context as _;
use pglet_api::{
    AiTabSnapshot, AiTurnSnapshot, ClientAction, ServerEvent, SessionSnapshot, TabSnapshot,
    WsServerMessage,
};
use pglet_domain::{
    Action, AiSqlService, AiTurn, Effect, SavedQueryRef, Session, SettingsGateway,
    TABS_SETTINGS_KEY, Tab, TabId, TabKind, TabPatch, TableView,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Quiet period after the last mutation before the session is written.
    pub save_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
        }
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn current_rev(&self) -> anyhow::Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetRev { reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")?
    }

    pub async fn session_snapshot(&self) -> anyhow::Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetSessionSnapshot { reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")?
    }

    pub async fn apply_client_action(&self, action: ClientAction) -> Result<u64, String> {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(EngineCommand::ApplyClientAction { action, reply: tx })
            .await
            .is_err()
        {
            return Err("engine unavailable".to_owned());
        }
        rx.await
            .unwrap_or_else(|_| Err("engine stopped".to_owned()))
    }

    /// Writes a pending debounced save immediately.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Flush { reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")?
    }
}

pub enum EngineCommand {
    GetRev {
        reply: oneshot::Sender<anyhow::Result<u64>>,
    },
    GetSessionSnapshot {
        reply: oneshot::Sender<anyhow::Result<SessionSnapshot>>,
    },
    ApplyClientAction {
        action: ClientAction,
        reply: oneshot::Sender<Result<u64, String>>,
    },
    DispatchAction {
        action: Box<Action>,
    },
    FlushSave {
        generation: u64,
    },
    Flush {
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
}

pub struct Engine {
    session: Session,
    rev: u64,
    settings: Arc<dyn SettingsGateway>,
    ai: Arc<dyn AiSqlService>,
    events: broadcast::Sender<WsServerMessage>,
    tx: mpsc::Sender<EngineCommand>,
    config: EngineConfig,
    save_generation: u64,
    save_pending: bool,
    save_task: Option<tokio::task::JoinHandle<()>>,
}

impl Engine {
    pub fn start(
        settings: Arc<dyn SettingsGateway>,
        ai: Arc<dyn AiSqlService>,
        config: EngineConfig,
    ) -> (EngineHandle, broadcast::Sender<WsServerMessage>) {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(256);
        let (events, _) = broadcast::channel::<WsServerMessage>(256);

        let mut engine = Self {
            session: Session::new(),
            rev: 0,
            settings,
            ai,
            events: events.clone(),
            tx: tx.clone(),
            config,
            save_generation: 0,
            save_pending: false,
            save_task: None,
        };

        tokio::spawn(async move {
            engine.bootstrap().await;
            while let Some(cmd) = rx.recv().await {
                engine.handle(cmd).await;
            }
        });

        (EngineHandle { tx }, events)
    }

    async fn bootstrap(&mut self) {
        self.process_action_queue(Action::AppStarted).await;
        tracing::info!(tabs = self.session.tabs().len(), "session ready");
    }

    async fn handle(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::GetRev { reply } => {
                let _ = reply.send(Ok(self.rev));
            }
            EngineCommand::GetSessionSnapshot { reply } => {
                let _ = reply.send(Ok(self.session_snapshot()));
            }
            EngineCommand::ApplyClientAction { action, reply } => {
                self.process_action_queue(map_client_action(action)).await;
                let _ = reply.send(Ok(self.rev));
            }
            EngineCommand::DispatchAction { action } => {
                self.process_action_queue(*action).await;
            }
            EngineCommand::FlushSave { generation } => {
                if generation == self.save_generation && self.save_pending {
                    self.save_now();
                }
            }
            EngineCommand::Flush { reply } => {
                if self.save_pending {
                    self.save_now();
                }
                let previous = self.save_task.take();
                self.save_task = Some(tokio::spawn(async move {
                    if let Some(previous) = previous {
                        let _ = previous.await;
                    }
                    let _ = reply.send(Ok(()));
                }));
            }
        }
    }

    async fn process_action_queue(&mut self, initial: Action) {
        let mut actions = VecDeque::from([initial]);

        while let Some(action) = actions.pop_front() {
            self.rev = self.rev.saturating_add(1);

            let effects = self.session.apply(action);
            self.publish_session_snapshot();

            for effect in effects {
                match self.run_effect(effect).await {
                    Ok(mut followups) => actions.append(&mut followups),
                    Err(err) => {
                        tracing::error!(error = %err, "effect failed");
                    }
                }
            }
        }
    }

    async fn run_effect(&mut self, effect: Effect) -> anyhow::Result<VecDeque<Action>> {
        match effect {
            Effect::LoadSession => {
                let settings = self.settings.clone();
                let loaded = tokio::task::spawn_blocking(move || settings.load_settings())
                    .await
                    .ok()
                    .unwrap_or_else(|| Err("failed to join load task".to_owned()));
                let action = match loaded {
                    Ok(mut values) => Action::SessionLoaded {
                        tabs_json: values.remove(TABS_SETTINGS_KEY),
                    },
                    Err(message) => {
                        tracing::warn!(error = %message, "failed to load saved session");
                        Action::SessionLoadFailed { message }
                    }
                };
                Ok(VecDeque::from([action]))
            }
            Effect::SaveSession => {
                self.schedule_save();
                Ok(VecDeque::new())
            }
            Effect::GenerateAiSql { tab_id, request } => {
                let ai = self.ai.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let prompt = request.prompt.clone();
                    let generated = tokio::task::spawn_blocking(move || ai.generate_sql(request))
                        .await
                        .ok()
                        .unwrap_or_else(|| Err("failed to join AI generation task".to_owned()));
                    let action = match generated {
                        Ok(response) => Action::AiSqlGenerated {
                            tab_id,
                            turn: AiTurn::new(prompt, response.sql, response.explanation),
                        },
                        Err(message) => {
                            tracing::warn!(
                                tab_id = %tab_id,
                                error = %message,
                                "AI generation failed"
                            );
                            Action::AiSqlGenerationFailed { tab_id, message }
                        }
                    };
                    let _ = tx
                        .send(EngineCommand::DispatchAction {
                            action: Box::new(action),
                        })
                        .await;
                });
                Ok(VecDeque::new())
            }
        }
    }

    /// Restarts the debounce window; only the newest timer writes.
    fn schedule_save(&mut self) {
        self.save_generation = self.save_generation.wrapping_add(1);
        self.save_pending = true;

        let generation = self.save_generation;
        let delay = self.config.save_debounce;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineCommand::FlushSave { generation }).await;
        });
    }

    /// Serializes the session and writes it on a detached task. Writes are chained so they land
    /// in order, and the engine keeps handling commands while one is in flight.
    fn save_now(&mut self) {
        self.save_pending = false;

        let value = match self.session.to_settings_value() {
            Ok(value) => value,
            Err(message) => {
                tracing::warn!(error = %message, "failed to serialize session");
                return;
            }
        };

        let settings = self.settings.clone();
        let previous = self.save_task.take();
        let rev = self.rev;
        self.save_task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let saved = tokio::task::spawn_blocking(move || {
                settings.save_settings(HashMap::from([(TABS_SETTINGS_KEY.to_owned(), value)]))
            })
            .await
            .ok()
            .unwrap_or_else(|| Err("failed to join save task".to_owned()));

            match saved {
                Ok(()) => tracing::debug!(rev, "session saved"),
                Err(message) => tracing::warn!(error = %message, "failed to save session"),
            }
        }));
    }

    fn publish_session_snapshot(&self) {
        let _ = self.events.send(WsServerMessage::Event {
            rev: self.rev,
            event: Box::new(ServerEvent::SessionChanged {
                snapshot: Box::new(self.session_snapshot()),
            }),
        });
    }

    fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            rev: self.rev,
            initialized: self.session.is_initialized(),
            active_tab_id: pglet_api::TabId(self.session.active_tab_id().as_str().to_owned()),
            tabs: self.session.tabs().iter().map(map_tab).collect(),
        }
    }
}

fn map_tab_kind(kind: TabKind) -> pglet_api::TabKind {
    match kind {
        TabKind::Query => pglet_api::TabKind::Query,
        TabKind::Table => pglet_api::TabKind::Table,
        TabKind::Function => pglet_api::TabKind::Function,
        TabKind::Ai => pglet_api::TabKind::Ai,
    }
}

fn map_table_view(view: TableView) -> pglet_api::TableView {
    match view {
        TableView::Rows => pglet_api::TableView::Rows,
        TableView::Structure => pglet_api::TableView::Structure,
        TableView::Indexes => pglet_api::TableView::Indexes,
        TableView::Constraints => pglet_api::TableView::Constraints,
    }
}

fn map_api_table_view(view: pglet_api::TableView) -> TableView {
    match view {
        pglet_api::TableView::Rows => TableView::Rows,
        pglet_api::TableView::Structure => TableView::Structure,
        pglet_api::TableView::Indexes => TableView::Indexes,
        pglet_api::TableView::Constraints => TableView::Constraints,
    }
}

fn map_tab(tab: &Tab) -> TabSnapshot {
    TabSnapshot {
        id: pglet_api::TabId(tab.id.as_str().to_owned()),
        kind: map_tab_kind(tab.kind()),
        title: tab.title.clone(),
        is_preview: tab.is_preview,
        user_renamed: tab.user_renamed,
        ai_renamed: tab.ai_renamed,
        sql_text: tab.sql().to_owned(),
        saved_query_id: tab.saved_query_id().map(str::to_owned),
        table_ref: tab.table_ref().map(str::to_owned),
        function_ref: tab.function_ref().map(str::to_owned),
        active_view: tab.active_view().map(map_table_view),
        ai: tab.ai().map(|ai| AiTabSnapshot {
            turns: ai
                .conversation
                .turns()
                .iter()
                .map(|turn| AiTurnSnapshot {
                    prompt: turn.prompt.clone(),
                    sql: turn.sql.clone(),
                    explanation: turn.explanation.clone(),
                })
                .collect(),
            current_turn_index: ai.conversation.current_index(),
            draft_prompt: ai.draft_prompt.clone(),
            error: ai.error.clone(),
            generating: ai.generating,
        }),
    }
}

fn map_patch(patch: pglet_api::TabPatch) -> TabPatch {
    TabPatch {
        title: patch.title,
        preview: patch.preview,
        sql: patch.sql_text,
        saved_query_id: patch.saved_query_id,
        active_view: patch.active_view.map(map_api_table_view),
        ai_prompt: patch.ai_prompt,
        ai_error: patch.ai_error,
    }
}

fn tab_id(id: pglet_api::TabId) -> TabId {
    TabId::new(id.0)
}

fn map_client_action(action: ClientAction) -> Action {
    match action {
        ClientAction::AddQueryTab => Action::AddQueryTab,
        ClientAction::AddAiTab => Action::AddAiTab,
        ClientAction::AddTableTab { table, preview } => Action::AddTableTab { table, preview },
        ClientAction::AddFunctionTab { function, preview } => {
            Action::AddFunctionTab { function, preview }
        }
        ClientAction::PinTab { tab_id: id } => Action::PinTab { tab_id: tab_id(id) },
        ClientAction::CloseTab { tab_id: id } => Action::CloseTab { tab_id: tab_id(id) },
        ClientAction::SetActiveTab { tab_id: id } => Action::SetActiveTab { tab_id: tab_id(id) },
        ClientAction::UpdateTab { tab_id: id, patch } => Action::UpdateTab {
            tab_id: tab_id(id),
            patch: map_patch(patch),
        },
        ClientAction::RenameTab { tab_id: id, title } => Action::RenameTab {
            tab_id: tab_id(id),
            title,
        },
        ClientAction::ReorderTabs {
            from_index,
            to_index,
        } => Action::ReorderTabs {
            from_index,
            to_index,
        },
        ClientAction::OpenSql { sql, saved_query } => Action::OpenSql {
            sql,
            saved_query: saved_query.map(|saved| SavedQueryRef {
                id: saved.id,
                title: saved.title,
            }),
        },
        ClientAction::AppendAiTurn { tab_id: id, turn } => Action::AppendAiTurn {
            tab_id: tab_id(id),
            turn: AiTurn::new(turn.prompt, turn.sql, turn.explanation),
        },
        ClientAction::SetAiTurnIndex { tab_id: id, index } => Action::SetAiTurnIndex {
            tab_id: tab_id(id),
            index,
        },
        ClientAction::AiPromptChanged { tab_id: id, prompt } => Action::AiPromptChanged {
            tab_id: tab_id(id),
            prompt,
        },
        ClientAction::AiPromptSubmit { tab_id: id } => {
            Action::SubmitAiPrompt { tab_id: tab_id(id) }
        }
        ClientAction::AiTitleSuggested { tab_id: id, title } => Action::AiTitleSuggested {
            tab_id: tab_id(id),
            title,
        },
    }
}
