use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const MIN_SECTION: u8 = 1;
pub const MAX_SECTION: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role {s:?}").into()))
    }
}

/// The two fixed student groups. Each owns a contiguous block of sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupName {
    #[serde(rename = "Group 1")]
    One,
    #[serde(rename = "Group 2")]
    Two,
}

impl GroupName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "Group 1",
            Self::Two => "Group 2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Group 1" => Some(Self::One),
            "Group 2" => Some(Self::Two),
            _ => None,
        }
    }

    pub fn sections(self) -> RangeInclusive<u8> {
        match self {
            Self::One => 1..=7,
            Self::Two => 8..=15,
        }
    }

    pub fn contains(self, section: u8) -> bool {
        self.sections().contains(&section)
    }

    pub fn for_section(section: u8) -> Option<Self> {
        [Self::One, Self::Two]
            .into_iter()
            .find(|g| g.contains(section))
    }
}

impl FromSql for GroupName {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown group {s:?}").into()))
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

pub fn section_in_range(section: i64) -> Option<u8> {
    if (MIN_SECTION as i64..=MAX_SECTION as i64).contains(&section) {
        Some(section as u8)
    } else {
        None
    }
}

/// Reads a stored section number, failing the row when it left the 1..=15 range.
pub fn section_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<u8>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(raw) => section_in_range(raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Integer,
                format!("section {raw} out of range").into(),
            )
        }),
    }
}
