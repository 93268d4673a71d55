//! Assignments targeted at everyone, a whole group, or one section of a
//! group, plus per-student completion marks.

use crate::db::now_rfc3339;
use crate::i18n::Msg;
use crate::model::GroupName;
use crate::users::User;
use crate::validate;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, title, description, due_date, group_name, section_number,
    created_by, created_at, updated_at";

/// Visibility predicate over `tasks`; binds the viewer's group then section.
const VISIBLE_TO: &str = "(group_name IS NULL
    OR (group_name = ?1 AND (section_number IS NULL OR section_number = ?2)))";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<String>,
    pub group_name: Option<GroupName>,
    pub section_number: Option<u8>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTask {
    #[serde(flatten)]
    pub task: Task,
    pub completed: bool,
    pub completed_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub group_name: Option<String>,
    pub section_number: Option<Value>,
}

struct Target {
    title: String,
    description: String,
    due_date: Option<String>,
    group_name: Option<GroupName>,
    section_number: Option<u8>,
}

fn check(input: &TaskInput) -> Result<Target, Msg> {
    let title = input.title.as_deref().map(str::trim).unwrap_or("");
    if title.is_empty() || title.chars().count() > 200 {
        return Err(Msg::TitleRequired);
    }
    let due_date = match input.due_date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => {
            let parsed = NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| Msg::InvalidDate)?;
            Some(parsed.format("%Y-%m-%d").to_string())
        }
        None => None,
    };
    let group_name = match input.group_name.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(g) => Some(validate::group(Some(g))?),
        None => None,
    };
    let section_number = match input.section_number.as_ref().filter(|v| !v.is_null()) {
        Some(v) => {
            let s = validate::section(Some(v))?;
            let g = group_name.ok_or(Msg::GroupInvalid)?;
            validate::partition(s, g)?;
            Some(s)
        }
        None => None,
    };
    Ok(Target {
        title: title.to_string(),
        description: input.description.as_deref().unwrap_or("").trim().to_string(),
        due_date,
        group_name,
        section_number,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let group: Option<String> = row.get(4)?;
    let section: Option<i64> = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        due_date: row.get(3)?,
        group_name: group.as_deref().and_then(GroupName::parse),
        section_number: section.and_then(|s| u8::try_from(s).ok()),
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn draft(input: &TaskInput, created_by: Option<&str>) -> Result<Task, Msg> {
    let t = check(input)?;
    let now = now_rfc3339();
    Ok(Task {
        id: Uuid::new_v4().to_string(),
        title: t.title,
        description: t.description,
        due_date: t.due_date,
        group_name: t.group_name,
        section_number: t.section_number,
        created_by: created_by.map(str::to_string),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// PUT semantics: every editable field is replaced.
pub fn apply(existing: Task, input: &TaskInput) -> Result<Task, Msg> {
    let t = check(input)?;
    Ok(Task {
        title: t.title,
        description: t.description,
        due_date: t.due_date,
        group_name: t.group_name,
        section_number: t.section_number,
        updated_at: now_rfc3339(),
        ..existing
    })
}

pub fn find(conn: &Connection, id: &str) -> anyhow::Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_task).optional()?)
}

pub fn list_all(conn: &Connection) -> anyhow::Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         ORDER BY due_date IS NULL, due_date, created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert(conn: &Connection, t: &Task) -> anyhow::Result<Task> {
    conn.execute(
        "INSERT INTO tasks(
           id, title, description, due_date, group_name, section_number,
           created_by, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &t.id,
            &t.title,
            &t.description,
            t.due_date.as_deref(),
            t.group_name.map(|g| g.as_str()),
            t.section_number.map(i64::from),
            t.created_by.as_deref(),
            &t.created_at,
            &t.updated_at,
        ),
    )?;
    find(conn, &t.id)?.ok_or_else(|| anyhow::anyhow!("inserted task {} not readable", t.id))
}

pub fn save(conn: &Connection, t: &Task) -> anyhow::Result<Task> {
    conn.execute(
        "UPDATE tasks
         SET title = ?, description = ?, due_date = ?, group_name = ?, section_number = ?,
             updated_at = ?
         WHERE id = ?",
        (
            &t.title,
            &t.description,
            t.due_date.as_deref(),
            t.group_name.map(|g| g.as_str()),
            t.section_number.map(i64::from),
            &t.updated_at,
            &t.id,
        ),
    )?;
    find(conn, &t.id)?.ok_or_else(|| anyhow::anyhow!("task {} vanished", t.id))
}

pub fn delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    Ok(conn.execute("DELETE FROM tasks WHERE id = ?", [id])? > 0)
}

/// Tasks the user can see, with their completion state, soonest due first.
pub fn list_for(conn: &Connection, user: &User) -> anyhow::Result<Vec<StudentTask>> {
    let sql = format!(
        "SELECT t.id, t.title, t.description, t.due_date, t.group_name, t.section_number,
                t.created_by, t.created_at, t.updated_at, c.completed_at
         FROM tasks t
         LEFT JOIN task_completions c ON c.task_id = t.id AND c.user_id = ?3
         WHERE {VISIBLE_TO}
         ORDER BY t.due_date IS NULL, t.due_date, t.created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                user.group_name.map(|g| g.as_str()),
                user.section_number.map(i64::from),
                &user.id,
            ),
            |row| {
                let completed_at: Option<String> = row.get(9)?;
                Ok(StudentTask {
                    task: row_to_task(row)?,
                    completed: completed_at.is_some(),
                    completed_at,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_visible(conn: &Connection, user: &User, id: &str) -> anyhow::Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE {VISIBLE_TO} AND id = ?3");
    Ok(conn
        .query_row(
            &sql,
            (
                user.group_name.map(|g| g.as_str()),
                user.section_number.map(i64::from),
                id,
            ),
            row_to_task,
        )
        .optional()?)
}

/// Idempotent; keeps the first completion time.
pub fn mark_complete(conn: &Connection, user_id: &str, task_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO task_completions(user_id, task_id, completed_at) VALUES(?, ?, ?)",
        (user_id, task_id, now_rfc3339()),
    )?;
    Ok(())
}

pub fn clear_complete(conn: &Connection, user_id: &str, task_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM task_completions WHERE user_id = ? AND task_id = ?",
        (user_id, task_id),
    )?;
    Ok(())
}
