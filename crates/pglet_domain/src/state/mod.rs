mod conversation;
mod ids;
mod persisted;
mod session;
mod tab;

pub use conversation::{AiConversation, AiMessage, AiRole, AiTurn};
pub use ids::TabId;
pub use persisted::{PersistedAiTurn, PersistedSession, PersistedTab, TABS_SETTINGS_KEY};
pub use session::Session;
pub use tab::{AiTab, SavedQueryRef, Tab, TabContent, TabKind, TabPatch, TableView};
