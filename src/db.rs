use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the single portal connection.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }
}

pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.to_string_lossy()))?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL COLLATE NOCASE UNIQUE,
            email TEXT NOT NULL COLLATE NOCASE UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL,
            section_number INTEGER,
            group_name TEXT,
            role TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    ensure_users_last_login_at(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS verification_records(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            section_number INTEGER NOT NULL,
            group_name TEXT NOT NULL,
            student_id TEXT,
            email TEXT,
            is_registered INTEGER NOT NULL DEFAULT 0,
            registered_by TEXT,
            registered_at TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(registered_by) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_verification_identity
         ON verification_records(full_name, section_number, group_name)",
        [],
    )?;
    // One roster row per user; unregistered rows carry NULL and are exempt.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_verification_registered_by
         ON verification_records(registered_by) WHERE registered_by IS NOT NULL",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS articles(
            id TEXT PRIMARY KEY,
            title_en TEXT NOT NULL,
            title_ar TEXT NOT NULL,
            body_en TEXT NOT NULL,
            body_ar TEXT NOT NULL,
            category TEXT,
            is_published INTEGER NOT NULL DEFAULT 0,
            author_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            published_at TEXT,
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(is_published, published_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            group_name TEXT,
            section_number INTEGER,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(created_by) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS task_completions(
            user_id TEXT NOT NULL,
            task_id TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY(user_id, task_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(task_id) REFERENCES tasks(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_task_completions_task ON task_completions(task_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_entries(
            id TEXT PRIMARY KEY,
            group_name TEXT NOT NULL,
            section_number INTEGER,
            day_of_week TEXT NOT NULL,
            day_index INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            subject TEXT NOT NULL,
            subject_ar TEXT,
            location TEXT,
            instructor TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_group ON schedule_entries(group_name, day_index)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            audience TEXT NOT NULL,
            recipient_count INTEGER NOT NULL,
            sent_count INTEGER NOT NULL,
            failed_count INTEGER NOT NULL,
            created_by TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(created_by) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS page_views(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            user_id TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_page_views_created ON page_views(created_at)",
        [],
    )?;

    Ok(())
}

fn ensure_users_last_login_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "users", "last_login_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE users ADD COLUMN last_login_at TEXT", [])?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_and_migrates_old_users_table() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute(
            "CREATE TABLE users(
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL COLLATE NOCASE UNIQUE,
                email TEXT NOT NULL COLLATE NOCASE UNIQUE,
                password_hash TEXT NOT NULL,
                full_name TEXT NOT NULL,
                section_number INTEGER,
                group_name TEXT,
                role TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )",
            [],
        )
        .expect("legacy users table");
        assert!(!table_has_column(&conn, "users", "last_login_at").expect("pragma"));

        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "users", "last_login_at").expect("pragma"));
        assert!(table_has_column(&conn, "verification_records", "registered_by").expect("pragma"));
    }

    #[test]
    fn open_db_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("portald-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("portal.sqlite3");
        let conn = open_db(&path).expect("open");
        drop(conn);
        assert!(path.is_file());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
