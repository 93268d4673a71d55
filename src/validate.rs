//! Field rules shared by registration, admin user management and roster
//! import. Each check returns the [`Msg`] of the first rule that fails.

use crate::i18n::Msg;
use crate::model::{section_in_range, GroupName};
use crate::password;
use serde::Deserialize;
use serde_json::Value;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const EMAIL_MAX: usize = 254;
pub const FULL_NAME_MIN: usize = 2;
pub const FULL_NAME_MAX: usize = 100;

pub fn username(raw: Option<&str>) -> Result<String, Msg> {
    let v = raw.map(str::trim).unwrap_or("");
    let len = v.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len)
        || !v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Msg::UsernameInvalid);
    }
    Ok(v.to_string())
}

/// Trims and lowercases. Only a structural check: one `@`, a non-empty local
/// part and a dotted domain without empty labels.
pub fn email(raw: Option<&str>) -> Result<String, Msg> {
    let v = raw.map(str::trim).unwrap_or("").to_lowercase();
    if v.is_empty() || v.len() > EMAIL_MAX || v.chars().any(char::is_whitespace) {
        return Err(Msg::EmailInvalid);
    }
    let Some((local, domain)) = v.split_once('@') else {
        return Err(Msg::EmailInvalid);
    };
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.split('.').any(str::is_empty)
    {
        return Err(Msg::EmailInvalid);
    }
    Ok(v)
}

pub fn full_name(raw: Option<&str>) -> Result<String, Msg> {
    let v = raw.map(str::trim).unwrap_or("");
    let len = v.chars().count();
    if !(FULL_NAME_MIN..=FULL_NAME_MAX).contains(&len) {
        return Err(Msg::FullNameInvalid);
    }
    Ok(v.to_string())
}

/// Accepts a JSON integer or a numeric string.
pub fn section(raw: Option<&Value>) -> Result<u8, Msg> {
    let n = match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.and_then(section_in_range).ok_or(Msg::SectionOutOfRange)
}

pub fn group(raw: Option<&str>) -> Result<GroupName, Msg> {
    raw.and_then(GroupName::parse).ok_or(Msg::GroupInvalid)
}

pub fn partition(section: u8, group: GroupName) -> Result<(), Msg> {
    if group.contains(section) {
        Ok(())
    } else {
        Err(Msg::SectionGroupMismatch)
    }
}

/// Presence and length only; strength is a separate step.
pub fn password_shape(raw: Option<&str>) -> Result<String, Msg> {
    match raw {
        None | Some("") => Err(Msg::PasswordRequired),
        Some(p) if p.chars().count() > password::MAX_LEN => Err(Msg::PasswordTooLong),
        Some(p) => Ok(p.to_string()),
    }
}

pub fn new_password(raw: Option<&str>) -> Result<String, Msg> {
    let p = password_shape(raw)?;
    password::check_strength(&p).map_err(|e| e.msg())?;
    Ok(p)
}

/// Optional section/group pair. Students must carry both; admins may carry
/// neither. When both are present the section must belong to the group.
pub fn placement(
    section_raw: Option<&Value>,
    group_raw: Option<&str>,
    required: bool,
) -> Result<(Option<u8>, Option<GroupName>), Msg> {
    let section_raw = section_raw.filter(|v| !v.is_null());
    let group_raw = group_raw.filter(|g| !g.trim().is_empty());
    match (section_raw, group_raw) {
        (None, None) if !required => Ok((None, None)),
        (None, None) => Err(Msg::StudentPlacementRequired),
        (Some(s), Some(g)) => {
            let s = section(Some(s))?;
            let g = group(Some(g))?;
            partition(s, g)?;
            Ok((Some(s), Some(g)))
        }
        (Some(s), None) => {
            section(Some(s))?;
            Err(Msg::GroupInvalid)
        }
        (None, Some(g)) => {
            group(Some(g))?;
            Err(Msg::SectionOutOfRange)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub section_number: Option<Value>,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub section_number: u8,
    pub group_name: GroupName,
}

/// Shape rules in field order, then password strength, then the section/group
/// partition.
pub fn registration(form: &RegistrationForm) -> Result<Registration, Msg> {
    let username = username(form.username.as_deref())?;
    let email = email(form.email.as_deref())?;
    let full_name = full_name(form.full_name.as_deref())?;
    let section_number = section(form.section_number.as_ref())?;
    let group_name = group(form.group_name.as_deref())?;
    let password = password_shape(form.password.as_deref())?;
    password::check_strength(&password).map_err(|e| e.msg())?;
    partition(section_number, group_name)?;
    Ok(Registration {
        username,
        email,
        password,
        full_name,
        section_number,
        group_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> RegistrationForm {
        serde_json::from_value(json!({
            "username": "sara_ali",
            "email": " Sara@Uni.EDU ",
            "password": "Passw0rdX",
            "fullName": "  Sara Ali ",
            "sectionNumber": 3,
            "groupName": "Group 1"
        }))
        .expect("form")
    }

    #[test]
    fn valid_registration_is_normalized() {
        let r = registration(&form()).expect("valid");
        assert_eq!(r.email, "sara@uni.edu");
        assert_eq!(r.full_name, "Sara Ali");
        assert_eq!(r.section_number, 3);
    }

    #[test]
    fn first_failing_rule_wins() {
        let mut f = form();
        f.username = Some("a!".into());
        f.email = Some("nope".into());
        assert_eq!(registration(&f).unwrap_err(), Msg::UsernameInvalid);

        let mut f = form();
        f.password = Some("short".into());
        f.section_number = Some(json!(12));
        assert_eq!(registration(&f).unwrap_err(), Msg::PasswordTooShort);

        let mut f = form();
        f.section_number = Some(json!(12));
        assert_eq!(registration(&f).unwrap_err(), Msg::SectionGroupMismatch);

        let mut f = form();
        f.section_number = Some(json!(16));
        assert_eq!(registration(&f).unwrap_err(), Msg::SectionOutOfRange);

        let mut f = form();
        f.password = None;
        assert_eq!(registration(&f).unwrap_err(), Msg::PasswordRequired);
    }

    #[test]
    fn email_shapes() {
        assert!(email(Some("a@b.co")).is_ok());
        for bad in ["", "a@", "@b.co", "a@b", "a b@c.d", "a@b..c", "a@@b.c"] {
            assert_eq!(email(Some(bad)), Err(Msg::EmailInvalid), "{bad}");
        }
    }

    #[test]
    fn placement_rules() {
        assert_eq!(placement(None, None, false), Ok((None, None)));
        assert_eq!(placement(None, None, true), Err(Msg::StudentPlacementRequired));
        assert_eq!(
            placement(Some(&json!("9")), Some("Group 2"), true),
            Ok((Some(9), Some(GroupName::Two)))
        );
        assert_eq!(
            placement(Some(&json!(9)), Some("Group 1"), true),
            Err(Msg::SectionGroupMismatch)
        );
        assert_eq!(placement(Some(&json!(9)), None, false), Err(Msg::GroupInvalid));
    }
}
