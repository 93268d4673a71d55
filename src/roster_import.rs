//! Turns admin-supplied roster rows (JSON objects or pasted CSV/TSV text)
//! into validated [`NewRecord`]s, collecting a per-line error for every row
//! that cannot be used.

use crate::i18n::Msg;
use crate::roster::NewRecord;
use crate::validate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub full_name: Option<String>,
    pub section_number: Option<Value>,
    pub group_name: Option<String>,
    pub student_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based JSON index or text line number.
    pub line: usize,
    pub msg: Msg,
}

#[derive(Debug, Default)]
pub struct ParsedRoster {
    pub records: Vec<NewRecord>,
    pub errors: Vec<RowError>,
}

impl ParsedRoster {
    fn push(&mut self, line: usize, raw: &RawRecord) {
        match validate_record(raw) {
            Ok(rec) => self.records.push(rec),
            Err(msg) => self.errors.push(RowError { line, msg }),
        }
    }
}

pub fn validate_record(raw: &RawRecord) -> Result<NewRecord, Msg> {
    let full_name = validate::full_name(raw.full_name.as_deref())?;
    let section_number = validate::section(raw.section_number.as_ref())?;
    let group_name = validate::group(raw.group_name.as_deref().map(str::trim))?;
    validate::partition(section_number, group_name)?;
    let email = match raw.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => Some(validate::email(Some(e))?),
        None => None,
    };
    let student_id = raw
        .student_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(NewRecord {
        full_name,
        section_number,
        group_name,
        student_id,
        email,
    })
}

pub fn from_json(rows: &[RawRecord]) -> ParsedRoster {
    let mut out = ParsedRoster::default();
    for (i, raw) in rows.iter().enumerate() {
        out.push(i + 1, raw);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    FullName,
    Section,
    Group,
    StudentId,
    Email,
}

const DEFAULT_COLUMNS: [Column; 5] = [
    Column::FullName,
    Column::Section,
    Column::Group,
    Column::StudentId,
    Column::Email,
];

fn header_column(name: &str) -> Option<Column> {
    let key: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    match key.as_str() {
        "fullname" | "name" | "studentname" => Some(Column::FullName),
        "section" | "sectionnumber" => Some(Column::Section),
        "group" | "groupname" => Some(Column::Group),
        "studentid" | "id" => Some(Column::StudentId),
        "email" => Some(Column::Email),
        _ => None,
    }
}

/// Comma- or tab-separated text. The delimiter is taken from the first
/// non-blank line; a header row is recognised when at least two of its cells
/// name known columns, and then decides the column order.
pub fn from_text(text: &str) -> ParsedRoster {
    let mut out = ParsedRoster::default();
    let mut delimiter: Option<char> = None;
    let mut columns: Vec<Option<Column>> = DEFAULT_COLUMNS.iter().copied().map(Some).collect();
    let mut seen_first = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let t = raw.trim_start_matches('\u{feff}');
        if t.trim().is_empty() {
            continue;
        }
        let delim = *delimiter.get_or_insert(if t.contains('\t') { '\t' } else { ',' });
        let cells = split_line(t, delim);

        if !seen_first {
            seen_first = true;
            let mapped: Vec<Option<Column>> = cells.iter().map(|c| header_column(c)).collect();
            if mapped.iter().filter(|c| c.is_some()).count() >= 2 {
                columns = mapped;
                continue;
            }
        }

        let mut rec = RawRecord::default();
        for (cell, col) in cells.into_iter().zip(columns.iter()) {
            let Some(col) = col else {
                continue;
            };
            match col {
                Column::FullName => rec.full_name = Some(cell),
                Column::Section => rec.section_number = Some(Value::String(cell)),
                Column::Group => rec.group_name = Some(cell),
                Column::StudentId => rec.student_id = Some(cell),
                Column::Email => rec.email = Some(cell),
            }
        }
        out.push(line_no, &rec);
    }
    out
}

/// Splits one line, honouring double-quoted cells with `""` escapes.
fn split_line(line: &str, delim: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => {
                cells.push(cur.trim().to_string());
                cur.clear();
            }
            c => cur.push(c),
        }
    }
    cells.push(cur.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupName;

    #[test]
    fn csv_with_header_and_quotes() {
        let text = "Group Name,Full Name,Section Number,Email\n\
                    Group 1,\"Ali, Mona\",3,MONA@uni.edu\n\
                    \n\
                    Group 2,Karim Nabil,12,\n";
        let parsed = from_text(text);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].full_name, "Ali, Mona");
        assert_eq!(parsed.records[0].email.as_deref(), Some("mona@uni.edu"));
        assert_eq!(parsed.records[1].group_name, GroupName::Two);
        assert_eq!(parsed.records[1].email, None);
    }

    #[test]
    fn tsv_without_header_uses_default_order() {
        let parsed = from_text("Sara Ali\t2\tGroup 1\tS-001\n");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].student_id.as_deref(), Some("S-001"));
    }

    #[test]
    fn bad_rows_are_reported_by_line() {
        let text = "full_name,section_number,group_name\n\
                    Sara Ali,9,Group 1\n\
                    Omar,x,Group 2\n\
                    Huda Salem,10,Group 2\n";
        let parsed = from_text(text);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(
            parsed.errors,
            vec![
                RowError { line: 2, msg: Msg::SectionGroupMismatch },
                RowError { line: 3, msg: Msg::SectionOutOfRange },
            ]
        );
    }

    #[test]
    fn json_rows_are_numbered_from_one() {
        let rows: Vec<RawRecord> = serde_json::from_value(serde_json::json!([
            {"fullName": "Sara Ali", "sectionNumber": 2, "groupName": "Group 1"},
            {"fullName": "S", "sectionNumber": 2, "groupName": "Group 1"}
        ]))
        .expect("rows");
        let parsed = from_json(&rows);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.errors, vec![RowError { line: 2, msg: Msg::FullNameInvalid }]);
    }
}
