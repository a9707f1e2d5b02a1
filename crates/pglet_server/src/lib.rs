use anyhow::Context as _;
use axum::Router;
use pglet_domain::paths;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub mod engine;
pub mod server;

pub const SAVE_DEBOUNCE_ENV: &str = "PGLET_SAVE_DEBOUNCE_MS";
pub const AI_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory holding the local settings database.
    pub root: PathBuf,
    pub save_debounce: Duration,
    /// Remote settings service; the local SQLite store is used when unset.
    pub settings_url: Option<String>,
    /// Remote AI generation service; generation is disabled when unset.
    pub ai_url: Option<String>,
    pub database: Option<String>,
    pub ai_api_key_set: bool,
}

impl ServerConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            save_debounce: engine::DEFAULT_SAVE_DEBOUNCE,
            settings_url: None,
            ai_url: None,
            database: None,
            ai_api_key_set: false,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::with_root(pglet_backend::resolve_pglet_root()?);

        if let Some(raw) = pglet_backend::optional_trimmed_string_from_env(SAVE_DEBOUNCE_ENV)? {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("invalid {SAVE_DEBOUNCE_ENV}: {raw}"))?;
            out.save_debounce = Duration::from_millis(millis);
        }

        out.settings_url =
            pglet_backend::optional_trimmed_string_from_env(paths::PGLET_SETTINGS_URL_ENV)?;
        out.ai_url = pglet_backend::optional_trimmed_string_from_env(paths::PGLET_AI_URL_ENV)?;
        out.database = pglet_backend::optional_trimmed_string_from_env(paths::PGLET_DATABASE_ENV)?;
        out.ai_api_key_set =
            pglet_backend::optional_trimmed_string_from_env(AI_API_KEY_ENV)?.is_some();

        Ok(out)
    }
}

pub struct StartedServer {
    pub addr: SocketAddr,
    pub engine: engine::EngineHandle,
    handle: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
}

impl StartedServer {
    pub async fn wait(self) -> anyhow::Result<()> {
        let mut this = self;
        let handle = this.handle.take().context("server task already consumed")?;

        handle
            .await
            .context("server task panicked")?
            .context("server failed")?;
        Ok(())
    }
}

impl Drop for StartedServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub async fn start_server(addr: SocketAddr) -> anyhow::Result<StartedServer> {
    start_server_with_config(addr, ServerConfig::from_env()?).await
}

pub async fn start_server_with_config(
    addr: SocketAddr,
    config: ServerConfig,
) -> anyhow::Result<StartedServer> {
    let (app, engine): (Router, _) = server::router(&config)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let actual = listener.local_addr().context("failed to read local addr")?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.context("server failed")?;
        Ok(())
    });

    Ok(StartedServer {
        addr: actual,
        engine,
        handle: Some(handle),
    })
}
