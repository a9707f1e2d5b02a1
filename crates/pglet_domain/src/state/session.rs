use super::{Tab, TabId};

/// Ordered open tabs plus the active one. Only the reducer mutates it, which keeps the
/// sequence non-empty, `active_tab` pointing at a live tab and at most one preview tab.
#[derive(Clone, Debug)]
pub struct Session {
    pub(crate) tabs: Vec<Tab>,
    pub(crate) active_tab: TabId,
    pub(crate) next_tab_id: u64,
    pub(crate) next_query_number: u64,
    pub(crate) next_ai_number: u64,
    pub(crate) initialized: bool,
}

impl Session {
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> &TabId {
        &self.active_tab
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(&self.active_tab)
    }

    pub fn tab(&self, tab_id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == *tab_id)
    }

    pub fn tab_index(&self, tab_id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == *tab_id)
    }

    /// False until the saved session has been loaded (or found missing).
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn tab_mut(&mut self, tab_id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == *tab_id)
    }
}
