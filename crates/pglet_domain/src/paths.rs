use std::path::{Path, PathBuf};

pub const PGLET_ROOT_ENV: &str = "PGLET_ROOT";
pub const PGLET_SETTINGS_URL_ENV: &str = "PGLET_SETTINGS_URL";
pub const PGLET_AI_URL_ENV: &str = "PGLET_AI_URL";
pub const PGLET_DATABASE_ENV: &str = "PGLET_DATABASE";

pub fn sqlite_path(pglet_root: &Path) -> PathBuf {
    pglet_root.join("pglet.db")
}
