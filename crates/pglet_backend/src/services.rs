mod ai_sql;
mod http;
mod remote_settings;
mod roots;

pub use ai_sql::{DisabledAiSqlService, HttpAiSqlService};
pub use remote_settings::HttpSettingsGateway;
pub use roots::resolve_pglet_root;
