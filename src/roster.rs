//! Verification roster: the pre-imported list of students allowed to
//! self-register.
//!
//! A record moves `Unregistered -> Registered` when a registration claims it
//! and back to `Unregistered` when its user is deleted or an admin
//! unregisters it. `is_registered = 1` always comes with a `registered_by`
//! pointing at an existing user.

use crate::db::now_rfc3339;
use crate::model::{section_column, GroupName};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, full_name, section_number, group_name, student_id, email,
    is_registered, registered_by, registered_at, created_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub id: String,
    pub full_name: String,
    pub section_number: u8,
    pub group_name: GroupName,
    pub student_id: Option<String>,
    pub email: Option<String>,
    pub is_registered: bool,
    pub registered_by: Option<String>,
    pub registered_at: Option<String>,
    pub created_at: String,
}

/// A validated row ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub full_name: String,
    pub section_number: u8,
    pub group_name: GroupName,
    pub student_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub group_name: Option<GroupName>,
    pub section_number: Option<u8>,
    pub registered: Option<bool>,
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub group_name: GroupName,
    pub total: i64,
    pub registered: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total: i64,
    pub registered: i64,
    pub unregistered: i64,
    pub by_group: Vec<GroupStats>,
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<VerificationRecord> {
    let section = section_column(row, 2)?.ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "section_number".to_string(), Type::Null)
    })?;
    let registered: i64 = row.get(6)?;
    Ok(VerificationRecord {
        id: row.get(0)?,
        full_name: row.get(1)?,
        section_number: section,
        group_name: row.get(3)?,
        student_id: row.get(4)?,
        email: row.get(5)?,
        is_registered: registered != 0,
        registered_by: row.get(7)?,
        registered_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn find_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<VerificationRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM verification_records WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_record).optional()?)
}

/// Exact, case-sensitive match on the trimmed name plus placement, limited to
/// rows nobody has claimed yet.
pub fn find_unregistered_match(
    conn: &Connection,
    full_name: &str,
    section_number: u8,
    group_name: GroupName,
) -> anyhow::Result<Option<VerificationRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM verification_records
         WHERE full_name = ? AND section_number = ? AND group_name = ? AND is_registered = 0
         ORDER BY created_at, rowid
         LIMIT 1"
    );
    Ok(conn
        .query_row(
            &sql,
            (full_name.trim(), section_number as i64, group_name.as_str()),
            row_to_record,
        )
        .optional()?)
}

/// Flips an unregistered row to registered for `user_id`. Returns `false`
/// when the row was already claimed, so two concurrent registrations can never
/// both win the same record.
pub fn claim(conn: &Connection, record_id: &str, user_id: &str) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE verification_records
         SET is_registered = 1, registered_by = ?, registered_at = ?
         WHERE id = ? AND is_registered = 0",
        (user_id, now_rfc3339(), record_id),
    )?;
    Ok(changed == 1)
}

pub fn insert(conn: &Connection, rec: &NewRecord) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO verification_records(
           id, full_name, section_number, group_name, student_id, email, is_registered, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, 0, ?)",
        (
            &id,
            &rec.full_name,
            rec.section_number as i64,
            rec.group_name.as_str(),
            rec.student_id.as_deref(),
            rec.email.as_deref(),
            now_rfc3339(),
        ),
    )?;
    Ok(id)
}

fn exists_exact(conn: &Connection, rec: &NewRecord) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM verification_records
             WHERE full_name = ? AND section_number = ? AND group_name = ?
               AND COALESCE(student_id, '') = COALESCE(?, '')
             LIMIT 1",
            (
                &rec.full_name,
                rec.section_number as i64,
                rec.group_name.as_str(),
                rec.student_id.as_deref(),
            ),
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Inserts all rows in one transaction, skipping rows identical to an
/// existing record (same name, placement and student id).
pub fn import(conn: &Connection, rows: &[NewRecord]) -> anyhow::Result<ImportOutcome> {
    let tx = conn.unchecked_transaction()?;
    let mut out = ImportOutcome::default();
    for rec in rows {
        if exists_exact(&tx, rec)? {
            out.duplicates += 1;
            continue;
        }
        insert(&tx, rec)?;
        out.inserted += 1;
    }
    tx.commit()?;
    Ok(out)
}

pub fn list(
    conn: &Connection,
    filter: &RecordFilter,
) -> anyhow::Result<(Vec<VerificationRecord>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(g) = filter.group_name {
        clauses.push("group_name = ?");
        params.push(Value::Text(g.as_str().to_string()));
    }
    if let Some(s) = filter.section_number {
        clauses.push("section_number = ?");
        params.push(Value::Integer(s as i64));
    }
    if let Some(r) = filter.registered {
        clauses.push("is_registered = ?");
        params.push(Value::Integer(r as i64));
    }
    if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        clauses.push("(full_name LIKE ? OR student_id LIKE ? OR email LIKE ?)");
        let pat = format!("%{q}%");
        params.push(Value::Text(pat.clone()));
        params.push(Value::Text(pat.clone()));
        params.push(Value::Text(pat));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM verification_records {where_sql}"),
        params_from_iter(params.iter()),
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM verification_records {where_sql}
         ORDER BY section_number, full_name
         LIMIT ? OFFSET ?"
    );
    params.push(Value::Integer(filter.limit));
    params.push(Value::Integer(filter.offset));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((rows, total))
}

pub fn stats(conn: &Connection) -> anyhow::Result<RosterStats> {
    let mut stmt = conn.prepare(
        "SELECT group_name, COUNT(*), COALESCE(SUM(is_registered), 0)
         FROM verification_records
         GROUP BY group_name
         ORDER BY group_name",
    )?;
    let by_group = stmt
        .query_map([], |row| {
            let group: String = row.get(0)?;
            Ok((group, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|(g, total, registered)| {
            GroupName::parse(&g).map(|group_name| GroupStats {
                group_name,
                total,
                registered,
            })
        })
        .collect::<Vec<_>>();
    let total: i64 = by_group.iter().map(|g| g.total).sum();
    let registered: i64 = by_group.iter().map(|g| g.registered).sum();
    Ok(RosterStats {
        total,
        registered,
        unregistered: total - registered,
        by_group,
    })
}

/// Returns the record to Unregistered and deletes the user that held it.
/// `Ok(None)` when the record does not exist.
pub fn unregister(conn: &Connection, record_id: &str) -> anyhow::Result<Option<Option<String>>> {
    let Some(rec) = find_by_id(conn, record_id)? else {
        return Ok(None);
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE verification_records
         SET is_registered = 0, registered_by = NULL, registered_at = NULL
         WHERE id = ?",
        [record_id],
    )?;
    if let Some(user_id) = rec.registered_by.as_deref() {
        tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    }
    tx.commit()?;
    Ok(Some(rec.registered_by))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    pub records_deleted: usize,
    pub users_deleted: usize,
}

/// Deletes the given records (or every record when `ids` is `None`) together
/// with the users registered against them.
pub fn bulk_delete(conn: &Connection, ids: Option<&[String]>) -> anyhow::Result<BulkDeleteOutcome> {
    let tx = conn.unchecked_transaction()?;
    let targets: Vec<(String, Option<String>)> = match ids {
        Some(ids) => {
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                let linked: Option<Option<String>> = tx
                    .query_row(
                        "SELECT registered_by FROM verification_records WHERE id = ?",
                        [id],
                        |r| r.get(0),
                    )
                    .optional()?;
                if let Some(linked) = linked {
                    out.push((id.clone(), linked));
                }
            }
            out
        }
        None => {
            let mut stmt = tx.prepare("SELECT id, registered_by FROM verification_records")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    let mut out = BulkDeleteOutcome::default();
    for (id, linked) in &targets {
        out.records_deleted += tx.execute("DELETE FROM verification_records WHERE id = ?", [id])?;
        if let Some(user_id) = linked {
            out.users_deleted += tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
        }
    }
    tx.commit()?;
    Ok(out)
}
