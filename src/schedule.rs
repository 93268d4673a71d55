use crate::db::now_rfc3339;
use crate::i18n::Msg;
use crate::model::{section_column, GroupName};
use crate::validate;
use chrono::{NaiveTime, Weekday};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, group_name, section_number, day_of_week, day_index,
    start_time, end_time, subject, subject_ar, location, instructor, created_at";

/// Week order used for display, Sunday first.
const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub group_name: GroupName,
    pub section_number: Option<u8>,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub subject_ar: Option<String>,
    pub location: Option<String>,
    pub instructor: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub group_name: Option<String>,
    pub section_number: Option<Value>,
    pub day: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub subject: Option<String>,
    pub subject_ar: Option<String>,
    pub location: Option<String>,
    pub instructor: Option<String>,
}

/// Accepts full or abbreviated English day names in any case.
pub fn parse_day(raw: &str) -> Option<(&'static str, u32)> {
    let day: Weekday = raw.trim().parse().ok()?;
    let idx = day.num_days_from_sunday();
    Some((DAY_NAMES[idx as usize], idx))
}

fn parse_time(raw: Option<&str>) -> Result<NaiveTime, Msg> {
    raw.map(str::trim)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .ok_or(Msg::InvalidTime)
}

fn optional_text(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: row.get(0)?,
        group_name: row.get(1)?,
        section_number: section_column(row, 2)?,
        day: row.get(3)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        subject: row.get(7)?,
        subject_ar: row.get(8)?,
        location: row.get(9)?,
        instructor: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Validates and builds an entry; `id`/`created_at` come from `existing` on
/// update.
pub fn prepare(
    input: &ScheduleInput,
    existing: Option<&ScheduleEntry>,
) -> Result<ScheduleEntry, Msg> {
    let group_name = validate::group(input.group_name.as_deref().map(str::trim))?;
    let section_number = match input.section_number.as_ref().filter(|v| !v.is_null()) {
        Some(v) => {
            let s = validate::section(Some(v))?;
            validate::partition(s, group_name)?;
            Some(s)
        }
        None => None,
    };
    let (day, _) = input
        .day
        .as_deref()
        .and_then(parse_day)
        .ok_or(Msg::InvalidDay)?;
    let start = parse_time(input.start_time.as_deref())?;
    let end = parse_time(input.end_time.as_deref())?;
    if end <= start {
        return Err(Msg::TimeRangeInvalid);
    }
    let subject = optional_text(input.subject.as_deref()).ok_or(Msg::SubjectRequired)?;
    Ok(ScheduleEntry {
        id: existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone()),
        group_name,
        section_number,
        day: day.to_string(),
        start_time: start.format("%H:%M").to_string(),
        end_time: end.format("%H:%M").to_string(),
        subject,
        subject_ar: optional_text(input.subject_ar.as_deref()),
        location: optional_text(input.location.as_deref()),
        instructor: optional_text(input.instructor.as_deref()),
        created_at: existing.map_or_else(now_rfc3339, |e| e.created_at.clone()),
    })
}

pub fn find(conn: &Connection, id: &str) -> anyhow::Result<Option<ScheduleEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM schedule_entries WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_entry).optional()?)
}

fn day_index(e: &ScheduleEntry) -> anyhow::Result<i64> {
    parse_day(&e.day)
        .map(|(_, idx)| i64::from(idx))
        .ok_or_else(|| anyhow::anyhow!("stored day {:?} is not a weekday", e.day))
}

pub fn insert(conn: &Connection, e: &ScheduleEntry) -> anyhow::Result<ScheduleEntry> {
    conn.execute(
        "INSERT INTO schedule_entries(
           id, group_name, section_number, day_of_week, day_index, start_time, end_time,
           subject, subject_ar, location, instructor, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &e.id,
            e.group_name.as_str(),
            e.section_number.map(i64::from),
            &e.day,
            day_index(e)?,
            &e.start_time,
            &e.end_time,
            &e.subject,
            e.subject_ar.as_deref(),
            e.location.as_deref(),
            e.instructor.as_deref(),
            &e.created_at,
        ),
    )?;
    find(conn, &e.id)?.ok_or_else(|| anyhow::anyhow!("inserted entry {} not readable", e.id))
}

pub fn save(conn: &Connection, e: &ScheduleEntry) -> anyhow::Result<ScheduleEntry> {
    conn.execute(
        "UPDATE schedule_entries
         SET group_name = ?, section_number = ?, day_of_week = ?, day_index = ?,
             start_time = ?, end_time = ?, subject = ?, subject_ar = ?, location = ?,
             instructor = ?
         WHERE id = ?",
        (
            e.group_name.as_str(),
            e.section_number.map(i64::from),
            &e.day,
            day_index(e)?,
            &e.start_time,
            &e.end_time,
            &e.subject,
            e.subject_ar.as_deref(),
            e.location.as_deref(),
            e.instructor.as_deref(),
            &e.id,
        ),
    )?;
    find(conn, &e.id)?.ok_or_else(|| anyhow::anyhow!("entry {} vanished", e.id))
}

pub fn delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    Ok(conn.execute("DELETE FROM schedule_entries WHERE id = ?", [id])? > 0)
}

/// Admin listing, optionally narrowed to one group.
pub fn list(conn: &Connection, group: Option<GroupName>) -> anyhow::Result<Vec<ScheduleEntry>> {
    let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM schedule_entries");
    let mut params: Vec<SqlValue> = Vec::new();
    if let Some(g) = group {
        sql.push_str(" WHERE group_name = ?");
        params.push(SqlValue::Text(g.as_str().to_string()));
    }
    sql.push_str(" ORDER BY group_name, day_index, start_time, section_number");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Week view for one student: group-wide entries plus those for their
/// section, Sunday through Saturday.
pub fn week_for(
    conn: &Connection,
    group: Option<GroupName>,
    section: Option<u8>,
) -> anyhow::Result<Vec<ScheduleEntry>> {
    let Some(group) = group else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM schedule_entries
         WHERE group_name = ? AND (section_number IS NULL OR section_number = ?)
         ORDER BY day_index, start_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((group.as_str(), section.map(i64::from)), row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
