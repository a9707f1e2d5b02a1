mod env;
mod services;
mod sqlite_store;
#[cfg(test)]
mod test_support;
mod time;

pub use env::{optional_trimmed_path_from_env, optional_trimmed_string_from_env};
pub use services::{DisabledAiSqlService, HttpAiSqlService, HttpSettingsGateway, resolve_pglet_root};
pub use sqlite_store::SqliteStore;
