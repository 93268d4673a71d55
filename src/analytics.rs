use crate::db::now_rfc3339;
use crate::i18n::Msg;
use crate::roster::{self, RosterStats};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

pub const PATH_MAX: usize = 512;
pub const REGISTRATION_DAYS: i64 = 14;
pub const TOP_PAGES: i64 = 10;

pub fn check_path(raw: Option<&str>) -> Result<String, Msg> {
    let p = raw.map(str::trim).unwrap_or("");
    if !p.starts_with('/') || p.chars().count() > PATH_MAX {
        return Err(Msg::PathInvalid);
    }
    Ok(p.to_string())
}

pub fn track(conn: &Connection, path: &str, user_id: Option<&str>) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO page_views(path, user_id, created_at) VALUES(?, ?, ?)",
        (path, user_id, now_rfc3339()),
    )?;
    Ok(())
}

/// Deletes page views older than `retention_days`. Returns the rows removed.
pub fn prune_page_views(conn: &Connection, retention_days: u32) -> anyhow::Result<usize> {
    prune_page_views_before(conn, Utc::now() - Duration::days(i64::from(retention_days)))
}

pub fn prune_page_views_before(conn: &Connection, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
    let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(conn.execute("DELETE FROM page_views WHERE created_at < ?", [cutoff])?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: i64,
    pub students: i64,
    pub admins: i64,
    pub active: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounts {
    pub articles: i64,
    pub published_articles: i64,
    pub tasks: i64,
    pub schedule_entries: i64,
    pub notifications: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub completions: i64,
    /// Completed (student, task) pairs over all visible pairs, 0..=1.
    pub rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCount {
    pub path: String,
    pub views: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub users: UserCounts,
    pub roster: RosterStats,
    pub content: ContentCounts,
    pub task_completion: TaskCompletion,
    pub registrations_per_day: Vec<DayCount>,
    pub page_views: i64,
    pub top_pages: Vec<PageCount>,
}

fn count(conn: &Connection, sql: &str) -> anyhow::Result<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

pub fn summary(conn: &Connection) -> anyhow::Result<Summary> {
    summary_on(conn, Utc::now().date_naive())
}

pub fn summary_on(conn: &Connection, today: NaiveDate) -> anyhow::Result<Summary> {
    let users = UserCounts {
        total: count(conn, "SELECT COUNT(*) FROM users")?,
        students: count(conn, "SELECT COUNT(*) FROM users WHERE role = 'student'")?,
        admins: count(conn, "SELECT COUNT(*) FROM users WHERE role = 'admin'")?,
        active: count(conn, "SELECT COUNT(*) FROM users WHERE is_active = 1")?,
    };
    let content = ContentCounts {
        articles: count(conn, "SELECT COUNT(*) FROM articles")?,
        published_articles: count(conn, "SELECT COUNT(*) FROM articles WHERE is_published = 1")?,
        tasks: count(conn, "SELECT COUNT(*) FROM tasks")?,
        schedule_entries: count(conn, "SELECT COUNT(*) FROM schedule_entries")?,
        notifications: count(conn, "SELECT COUNT(*) FROM notifications")?,
    };

    let completions = count(
        conn,
        "SELECT COUNT(*) FROM task_completions c
         JOIN users u ON u.id = c.user_id
         WHERE u.role = 'student'",
    )?;
    let assigned = count(
        conn,
        "SELECT COUNT(*) FROM users u
         JOIN tasks t ON t.group_name IS NULL
           OR (t.group_name = u.group_name
               AND (t.section_number IS NULL OR t.section_number = u.section_number))
         WHERE u.role = 'student' AND u.is_active = 1",
    )?;
    let task_completion = TaskCompletion {
        completions,
        rate: if assigned > 0 {
            completions as f64 / assigned as f64
        } else {
            0.0
        },
    };

    let first_day = today - Duration::days(REGISTRATION_DAYS - 1);
    let mut per_day: HashMap<String, i64> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*)
             FROM users
             WHERE role = 'student' AND substr(created_at, 1, 10) >= ?
             GROUP BY day",
        )?;
        let mut rows = stmt.query([first_day.format("%Y-%m-%d").to_string()])?;
        while let Some(row) = rows.next()? {
            per_day.insert(row.get(0)?, row.get(1)?);
        }
    }
    let registrations_per_day = (0..REGISTRATION_DAYS)
        .map(|i| {
            let date = (first_day + Duration::days(i)).format("%Y-%m-%d").to_string();
            let count = per_day.get(&date).copied().unwrap_or(0);
            DayCount { date, count }
        })
        .collect();

    let mut stmt = conn.prepare(
        "SELECT path, COUNT(*) AS views FROM page_views
         GROUP BY path
         ORDER BY views DESC, path
         LIMIT ?",
    )?;
    let top_pages = stmt
        .query_map([TOP_PAGES], |r| {
            Ok(PageCount {
                path: r.get(0)?,
                views: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Summary {
        users,
        roster: roster::stats(conn)?,
        content,
        task_completion,
        registrations_per_day,
        page_views: count(conn, "SELECT COUNT(*) FROM page_views")?,
        top_pages,
    })
}
