mod actions;
pub use actions::Action;
mod effects;
pub use effects::Effect;
mod adapters;
pub use adapters::{AiSqlRequest, AiSqlResponse, AiSqlService, SettingsGateway};
mod sql_format;
pub use sql_format::{SqlFormatError, format_sql, try_format_sql};

/// Longest automatic tab title, in characters, before an ellipsis is appended.
pub const TAB_TITLE_MAX_CHARS: usize = 40;

pub mod paths;
mod persistence;
mod state;
pub use state::*;

mod reducer;
pub use reducer::derive_tab_title;
