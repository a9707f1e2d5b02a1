use crate::time::now_unix_seconds;
use anyhow::{Context as _, anyhow};
use pglet_domain::SettingsGateway;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/migrations/0001_init.sql"
    )),
)];

/// Local settings resource backed by a single SQLite file. All access goes through one
/// worker thread that owns the connection.
#[derive(Clone)]
pub struct SqliteStore {
    tx: mpsc::Sender<DbCommand>,
}

enum DbCommand {
    LoadSettings {
        reply: mpsc::Sender<anyhow::Result<HashMap<String, String>>>,
    },
    SaveSettings {
        settings: HashMap<String, String>,
        reply: mpsc::Sender<anyhow::Result<()>>,
    },
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<DbCommand>();

        std::thread::Builder::new()
            .name("pglet-sqlite".to_owned())
            .spawn(move || {
                let mut db = SqliteDatabase::open(&db_path);
                while let Ok(cmd) = rx.recv() {
                    match (&mut db, cmd) {
                        (Ok(db), DbCommand::LoadSettings { reply }) => {
                            let _ = reply.send(db.load_settings());
                        }
                        (Ok(db), DbCommand::SaveSettings { settings, reply }) => {
                            let _ = reply.send(db.save_settings(&settings));
                        }
                        (Err(err), cmd) => {
                            respond_db_open_error(err, cmd);
                        }
                    }
                }
            })
            .context("failed to spawn sqlite worker thread")?;

        Ok(Self { tx })
    }

    pub fn load_settings_map(&self) -> anyhow::Result<HashMap<String, String>> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(DbCommand::LoadSettings { reply: reply_tx })
            .context("sqlite worker is not running")?;
        reply_rx.recv().context("sqlite worker terminated")?
    }

    pub fn upsert_settings(&self, settings: HashMap<String, String>) -> anyhow::Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(DbCommand::SaveSettings {
                settings,
                reply: reply_tx,
            })
            .context("sqlite worker is not running")?;
        reply_rx.recv().context("sqlite worker terminated")?
    }
}

impl SettingsGateway for SqliteStore {
    fn load_settings(&self) -> Result<HashMap<String, String>, String> {
        self.load_settings_map().map_err(|e| format!("{e:#}"))
    }

    fn save_settings(&self, settings: HashMap<String, String>) -> Result<(), String> {
        self.upsert_settings(settings).map_err(|e| format!("{e:#}"))
    }
}

fn respond_db_open_error(err: &anyhow::Error, cmd: DbCommand) {
    let message = format!("{err:#}");
    match cmd {
        DbCommand::LoadSettings { reply } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::SaveSettings { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
    }
}

struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut conn = Connection::open(db_path)
            .with_context(|| format!("failed to open sqlite db {}", db_path.display()))?;

        configure_connection(&mut conn).context("failed to configure sqlite connection")?;
        apply_migrations(&mut conn).context("failed to apply sqlite migrations")?;

        Ok(Self { conn })
    }

    fn load_settings(&mut self) -> anyhow::Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, value);
        }
        Ok(settings)
    }

    fn save_settings(&mut self, settings: &HashMap<String, String>) -> anyhow::Result<()> {
        let now = now_unix_seconds();
        let tx = self.conn.transaction()?;
        for (key, value) in settings {
            tx.execute(
                "INSERT INTO settings (key, value, created_at, updated_at)
                 VALUES (?1, ?2, COALESCE((SELECT created_at FROM settings WHERE key = ?1), ?3), ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("failed to save setting {key}"))?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn configure_connection(conn: &mut Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )
    .context("failed to apply sqlite PRAGMAs")?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    let mut current: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .context("failed to read user_version")? as u32;

    if current > LATEST_SCHEMA_VERSION {
        return Err(anyhow!(
            "sqlite schema version is newer than this build: db={}, app={}",
            current,
            LATEST_SCHEMA_VERSION
        ));
    }

    if current == LATEST_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch("BEGIN IMMEDIATE;")
        .context("failed to begin migration transaction")?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration v{version:04}"))?;
        conn.pragma_update(None, "user_version", *version as i64)
            .context("failed to update user_version")?;
        current = *version;
    }

    conn.execute_batch("COMMIT;")
        .context("failed to commit migration transaction")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db(path: &Path) -> SqliteDatabase {
        SqliteDatabase::open(path).unwrap()
    }

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn migrations_create_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir.path().join("pglet.db"));

        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = 'settings'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn migrations_reopen_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pglet.db");
        {
            let _db = open_db(&path);
        }

        let db = open_db(&path);
        let version: i64 = db
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, LATEST_SCHEMA_VERSION as i64);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pglet.db");
        {
            let db = open_db(&path);
            db.conn.pragma_update(None, "user_version", 99i64).unwrap();
        }

        let err = SqliteDatabase::open(&path).err().unwrap();
        assert!(
            format!("{err:#}").contains("newer than this build"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn save_upserts_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("pglet.db")).unwrap();

        store
            .upsert_settings(settings(&[("theme", "dark"), ("tabs", "{}")]))
            .unwrap();
        store
            .upsert_settings(settings(&[("tabs", r#"{"tabs":[]}"#)]))
            .unwrap();

        let loaded = store.load_settings_map().unwrap();
        assert_eq!(
            loaded,
            settings(&[("theme", "dark"), ("tabs", r#"{"tabs":[]}"#)])
        );
    }

    #[test]
    fn upsert_preserves_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(&dir.path().join("pglet.db"));
        db.save_settings(&settings(&[("theme", "dark")])).unwrap();
        db.conn
            .execute("UPDATE settings SET created_at = 1 WHERE key = 'theme'", [])
            .unwrap();
        db.save_settings(&settings(&[("theme", "light")])).unwrap();

        let (value, created_at): (String, i64) = db
            .conn
            .query_row(
                "SELECT value, created_at FROM settings WHERE key = 'theme'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(value, "light");
        assert_eq!(created_at, 1);
    }

    #[test]
    fn open_failure_is_reported_per_command() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = SqliteStore::new(blocker.join("pglet.db")).unwrap();
        let err = SettingsGateway::load_settings(&store).unwrap_err();
        assert!(err.contains("failed to create"), "unexpected error: {err}");
        assert!(SettingsGateway::save_settings(&store, HashMap::new()).is_err());
    }
}
