use crate::db::now_rfc3339;
use crate::i18n::Msg;
use crate::mailer::{send_best_effort, Mailer, OutgoingEmail};
use crate::model::{GroupName, Role};
use crate::users::User;
use crate::validate;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub role: Option<Role>,
    pub group_name: Option<GroupName>,
    pub section_number: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceInput {
    pub role: Option<String>,
    pub group_name: Option<String>,
    pub section_number: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    pub subject: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub audience: AudienceInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub audience: Audience,
    pub recipient_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub body: String,
    pub audience: Audience,
}

pub fn check(input: &NotificationInput) -> Result<Message, Msg> {
    let subject = input.subject.as_deref().map(str::trim).unwrap_or("");
    if subject.is_empty() || subject.chars().count() > 200 {
        return Err(Msg::SubjectRequired);
    }
    let body = input.body.as_deref().map(str::trim).unwrap_or("");
    if body.is_empty() {
        return Err(Msg::MessageRequired);
    }
    let a = &input.audience;
    let role = match a.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => Some(Role::parse(r).ok_or(Msg::RoleInvalid)?),
        None => None,
    };
    let group_name = match a.group_name.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(g) => Some(validate::group(Some(g))?),
        None => None,
    };
    let section_number = match a.section_number.as_ref().filter(|v| !v.is_null()) {
        Some(v) => {
            let s = validate::section(Some(v))?;
            if let Some(g) = group_name {
                validate::partition(s, g)?;
            }
            Some(s)
        }
        None => None,
    };
    Ok(Message {
        subject: subject.to_string(),
        body: body.to_string(),
        audience: Audience {
            role,
            group_name,
            section_number,
        },
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: i64,
    pub failed: i64,
}

/// Mails every recipient. Individual failures are logged and counted only.
pub fn deliver(mailer: &dyn Mailer, recipients: &[User], msg: &Message) -> Delivery {
    let mut out = Delivery::default();
    for user in recipients {
        let email = OutgoingEmail {
            to: user.email.clone(),
            subject: msg.subject.clone(),
            body: msg.body.clone(),
        };
        if send_best_effort(mailer, &email) {
            out.sent += 1;
        } else {
            out.failed += 1;
        }
    }
    out
}

pub fn record(
    conn: &Connection,
    msg: &Message,
    recipients: usize,
    delivery: Delivery,
    created_by: Option<&str>,
) -> anyhow::Result<Notification> {
    let n = Notification {
        id: Uuid::new_v4().to_string(),
        subject: msg.subject.clone(),
        body: msg.body.clone(),
        audience: msg.audience.clone(),
        recipient_count: recipients as i64,
        sent_count: delivery.sent,
        failed_count: delivery.failed,
        created_by: created_by.map(str::to_string),
        created_at: now_rfc3339(),
    };
    conn.execute(
        "INSERT INTO notifications(
           id, subject, body, audience, recipient_count, sent_count, failed_count,
           created_by, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &n.id,
            &n.subject,
            &n.body,
            serde_json::to_string(&n.audience)?,
            n.recipient_count,
            n.sent_count,
            n.failed_count,
            n.created_by.as_deref(),
            &n.created_at,
        ),
    )?;
    Ok(n)
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let audience: String = row.get(3)?;
    let audience = serde_json::from_str(&audience)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(Notification {
        id: row.get(0)?,
        subject: row.get(1)?,
        body: row.get(2)?,
        audience,
        recipient_count: row.get(4)?,
        sent_count: row.get(5)?,
        failed_count: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn list(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, subject, body, audience, recipient_count, sent_count, failed_count,
                created_by, created_at
         FROM notifications
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
