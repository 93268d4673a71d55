use crate::config::BootstrapAdmin;
use crate::db::now_rfc3339;
use crate::model::{section_column, GroupName, Role};
use crate::password;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, section_number,
    group_name, role, is_active, created_at, updated_at, last_login_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub full_name: String,
    pub section_number: Option<u8>,
    pub group_name: Option<GroupName>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub section_number: Option<u8>,
    pub group_name: Option<GroupName>,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Username,
    Email,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let active: i64 = row.get(8)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        section_number: section_column(row, 5)?,
        group_name: row.get(6)?,
        role: row.get(7)?,
        is_active: active != 0,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        last_login_at: row.get(11)?,
    })
}

pub fn find_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_user).optional()?)
}

/// Looks a user up by username or email, both case-insensitively.
pub fn find_by_login(conn: &Connection, login: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = lower(?1) LIMIT 1");
    Ok(conn.query_row(&sql, [login.trim()], row_to_user).optional()?)
}

pub fn find_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(conn.query_row(&sql, [email.trim()], row_to_user).optional()?)
}

pub fn find_conflict(
    conn: &Connection,
    username: Option<&str>,
    email: Option<&str>,
    exclude_id: Option<&str>,
) -> anyhow::Result<Option<Conflict>> {
    let exclude = exclude_id.unwrap_or("");
    if let Some(username) = username {
        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ? AND id <> ?",
                (username, exclude),
                |r| r.get(0),
            )
            .optional()?;
        if hit.is_some() {
            return Ok(Some(Conflict::Username));
        }
    }
    if let Some(email) = email {
        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE email = ? AND id <> ?",
                (email, exclude),
                |r| r.get(0),
            )
            .optional()?;
        if hit.is_some() {
            return Ok(Some(Conflict::Email));
        }
    }
    Ok(None)
}

pub fn insert(conn: &Connection, new: &NewUser) -> anyhow::Result<User> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO users(
           id, username, email, password_hash, full_name, section_number,
           group_name, role, is_active, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.username,
            &new.email,
            &new.password_hash,
            &new.full_name,
            new.section_number.map(i64::from),
            new.group_name.map(|g| g.as_str()),
            new.role.as_str(),
            new.is_active as i64,
            &now,
            &now,
        ),
    )?;
    find_by_id(conn, &id)?.ok_or_else(|| anyhow::anyhow!("inserted user {id} not readable"))
}

/// Persists the editable fields of `user`.
pub fn save(conn: &Connection, user: &User) -> anyhow::Result<User> {
    conn.execute(
        "UPDATE users
         SET email = ?, full_name = ?, section_number = ?, group_name = ?, role = ?,
             is_active = ?, updated_at = ?
         WHERE id = ?",
        (
            &user.email,
            &user.full_name,
            user.section_number.map(i64::from),
            user.group_name.map(|g| g.as_str()),
            user.role.as_str(),
            user.is_active as i64,
            now_rfc3339(),
            &user.id,
        ),
    )?;
    find_by_id(conn, &user.id)?.ok_or_else(|| anyhow::anyhow!("user {} vanished", user.id))
}

pub fn set_password(conn: &Connection, id: &str, password_hash: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
        (password_hash, now_rfc3339(), id),
    )?;
    Ok(())
}

pub fn touch_login(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ? WHERE id = ?",
        (now_rfc3339(), id),
    )?;
    Ok(())
}

/// Deletes the user and returns its roster row, if any, to Unregistered in the
/// same transaction.
pub fn delete_with_roster_reset(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE verification_records
         SET is_registered = 0, registered_by = NULL, registered_at = NULL
         WHERE registered_by = ?",
        [id],
    )?;
    let deleted = tx.execute("DELETE FROM users WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

pub fn list(conn: &Connection, filter: &UserFilter) -> anyhow::Result<(Vec<User>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(role) = filter.role {
        clauses.push("role = ?");
        params.push(Value::Text(role.as_str().to_string()));
    }
    if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        clauses.push("(username LIKE ? OR email LIKE ? OR full_name LIKE ?)");
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
        &format!("SELECT COUNT(*) FROM users {where_sql}"),
        params_from_iter(params.iter()),
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users {where_sql} ORDER BY created_at DESC, username LIMIT ? OFFSET ?"
    );
    params.push(Value::Integer(filter.limit));
    params.push(Value::Integer(filter.offset));
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params_from_iter(params.iter()), row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((users, total))
}

/// Active users matching every provided audience constraint.
pub fn active_recipients(
    conn: &Connection,
    role: Option<Role>,
    group: Option<GroupName>,
    section: Option<u8>,
) -> anyhow::Result<Vec<User>> {
    let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1");
    let mut params: Vec<Value> = Vec::new();
    if let Some(role) = role {
        sql.push_str(" AND role = ?");
        params.push(Value::Text(role.as_str().to_string()));
    }
    if let Some(group) = group {
        sql.push_str(" AND group_name = ?");
        params.push(Value::Text(group.as_str().to_string()));
    }
    if let Some(section) = section {
        sql.push_str(" AND section_number = ?");
        params.push(Value::Integer(section as i64));
    }
    sql.push_str(" ORDER BY username");
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params_from_iter(params.iter()), row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Creates the configured admin when the portal has none yet.
pub fn ensure_admin(conn: &Connection, admin: &BootstrapAdmin) -> anyhow::Result<bool> {
    let admins: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |r| r.get(0),
    )?;
    if admins > 0 {
        return Ok(false);
    }
    password::check_strength(&admin.password)
        .map_err(|e| anyhow::anyhow!("ADMIN_PASSWORD rejected: {e}"))?;
    let user = insert(
        conn,
        &NewUser {
            username: admin.username.clone(),
            email: admin.email.trim().to_lowercase(),
            password_hash: password::hash_password(&admin.password)?,
            full_name: admin.username.clone(),
            section_number: None,
            group_name: None,
            role: Role::Admin,
            is_active: true,
        },
    )?;
    info!(event = "admin.bootstrap", user_id = %user.id, username = %user.username, "created initial admin");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn student(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "x".into(),
            full_name: "Omar Khalid".into(),
            section_number: Some(9),
            group_name: Some(GroupName::Two),
            role: Role::Student,
            is_active: true,
        }
    }

    #[test]
    fn unknown_stored_role_fails_the_read() {
        let conn = open_in_memory().expect("db");
        let u = insert(&conn, &student("rana_m", "rana@uni.edu")).expect("insert");
        conn.execute("UPDATE users SET role = 'superuser' WHERE id = ?", [&u.id])
            .expect("corrupt role");
        assert!(find_by_id(&conn, &u.id).is_err());

        conn.execute(
            "UPDATE users SET role = 'student', section_number = 0 WHERE id = ?",
            [&u.id],
        )
        .expect("corrupt section");
        assert!(find_by_id(&conn, &u.id).is_err());
    }

    #[test]
    fn conflicts_are_case_insensitive() {
        let conn = open_in_memory().expect("db");
        let u = insert(&conn, &student("omar_k", "omar@uni.edu")).expect("insert");
        assert_eq!(
            find_conflict(&conn, Some("OMAR_K"), None, None).expect("query"),
            Some(Conflict::Username)
        );
        assert_eq!(
            find_conflict(&conn, Some("someone"), Some("OMAR@uni.edu"), None).expect("query"),
            Some(Conflict::Email)
        );
        assert_eq!(
            find_conflict(&conn, Some("omar_k"), Some("omar@uni.edu"), Some(&u.id)).expect("query"),
            None
        );
        assert!(find_by_login(&conn, "Omar@Uni.edu").expect("login").is_some());
    }

    #[test]
    fn ensure_admin_only_creates_once() {
        let conn = open_in_memory().expect("db");
        let admin = BootstrapAdmin {
            username: "root".into(),
            email: "Root@Uni.edu".into(),
            password: "Sup3rSecret".into(),
        };
        assert!(ensure_admin(&conn, &admin).expect("first"));
        assert!(!ensure_admin(&conn, &admin).expect("second"));
        let found = find_by_login(&conn, "root@uni.edu").expect("q").expect("admin");
        assert_eq!(found.role, Role::Admin);
    }

    #[test]
    fn weak_bootstrap_password_is_refused() {
        let conn = open_in_memory().expect("db");
        let admin = BootstrapAdmin {
            username: "root".into(),
            email: "root@uni.edu".into(),
            password: "password".into(),
        };
        assert!(ensure_admin(&conn, &admin).is_err());
    }

    #[test]
    fn list_filters_and_counts() {
        let conn = open_in_memory().expect("db");
        insert(&conn, &student("omar_k", "omar@uni.edu")).expect("insert");
        insert(&conn, &student("huda_s", "huda@uni.edu")).expect("insert");
        let (rows, total) = list(
            &conn,
            &UserFilter {
                role: Some(Role::Student),
                query: Some("huda".into()),
                limit: 50,
                offset: 0,
            },
        )
        .expect("list");
        assert_eq!(total, 1);
        assert_eq!(rows[0].username, "huda_s");
    }
}
