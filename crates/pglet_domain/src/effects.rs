use crate::{AiSqlRequest, TabId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    LoadSession,
    /// Request a (debounced) save of the current session.
    SaveSession,

    GenerateAiSql {
        tab_id: TabId,
        request: AiSqlRequest,
    },
}
