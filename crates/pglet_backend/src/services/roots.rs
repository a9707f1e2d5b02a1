use crate::env::optional_trimmed_path_from_env;
use anyhow::anyhow;
use pglet_domain::paths;
use std::path::PathBuf;

/// Data directory: `PGLET_ROOT` when set, otherwise `~/.pglet`.
pub fn resolve_pglet_root() -> anyhow::Result<PathBuf> {
    if let Some(root) = optional_trimmed_path_from_env(paths::PGLET_ROOT_ENV)? {
        return Ok(root);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(home).join(".pglet"))
}
