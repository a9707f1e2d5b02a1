#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AiTurn {
    pub prompt: String,
    pub sql: String,
    pub explanation: String,
}

impl AiTurn {
    pub fn new(
        prompt: impl Into<String>,
        sql: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            sql: sql.into(),
            explanation: explanation.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiRole {
    User,
    Assistant,
}

impl AiRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AiMessage {
    pub role: AiRole,
    pub content: String,
}

/// Append-only list of prompt/SQL turns with a cursor selecting the turn shown
/// in the editor. The cursor is always a valid index while turns exist.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AiConversation {
    turns: Vec<AiTurn>,
    current: usize,
}

impl AiConversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<AiTurn>, current: Option<usize>) -> Self {
        let last = turns.len().saturating_sub(1);
        let current = current.unwrap_or(last).min(last);
        Self { turns, current }
    }

    pub fn turns(&self) -> &[AiTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.turns.is_empty()).then_some(self.current)
    }

    pub(crate) fn push(&mut self, turn: AiTurn) -> &AiTurn {
        self.turns.push(turn);
        self.current = self.turns.len() - 1;
        &self.turns[self.current]
    }

    /// Moves the cursor, clamping into range. Returns `None` when there is nothing to select.
    pub(crate) fn select(&mut self, index: usize) -> Option<&AiTurn> {
        if self.turns.is_empty() {
            return None;
        }
        self.current = index.min(self.turns.len() - 1);
        self.turns.get(self.current)
    }

    /// Prior turns rendered as chat history for a follow-up generation request.
    pub fn history_messages(&self) -> Vec<AiMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [
                    AiMessage {
                        role: AiRole::User,
                        content: turn.prompt.clone(),
                    },
                    AiMessage {
                        role: AiRole::Assistant,
                        content: format!("SQL: {}\nExplanation: {}", turn.sql, turn.explanation),
                    },
                ]
            })
            .collect()
    }
}
