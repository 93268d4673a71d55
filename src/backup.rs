use anyhow::{anyhow, Context};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT: &str = "portal-export-v1";

/// Exported tables and the columns left out of each snapshot.
const TABLES: &[(&str, &[&str])] = &[
    ("verification_records", &[]),
    ("users", &["password_hash"]),
    ("articles", &[]),
    ("tasks", &[]),
    ("task_completions", &[]),
    ("schedule_entries", &[]),
    ("notifications", &[]),
];

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub rows: BTreeMap<String, usize>,
}

fn entry_name(table: &str) -> String {
    format!("data/{table}.json")
}

fn to_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn table_snapshot(conn: &Connection, table: &str, skip: &[&str]) -> anyhow::Result<Vec<Value>> {
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))
        .with_context(|| format!("failed to read table {table}"))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut obj = Map::new();
        for (i, name) in names.iter().enumerate() {
            if skip.contains(&name.as_str()) {
                continue;
            }
            obj.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        out.push(Value::Object(obj));
    }
    Ok(out)
}

/// Builds an in-memory zip with one JSON snapshot per table and a manifest
/// holding the SHA-256 of every entry. Password hashes are never exported.
pub fn export_portal_bundle(conn: &Connection) -> anyhow::Result<(Vec<u8>, ExportSummary)> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut checksums = Map::new();
    let mut rows = BTreeMap::new();
    for (table, skip) in TABLES {
        let snapshot = table_snapshot(conn, table, skip)?;
        rows.insert(table.to_string(), snapshot.len());
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .with_context(|| format!("failed to serialize {table}"))?;
        let name = entry_name(table);
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write entry {name}"))?;
        checksums.insert(
            name,
            json!({
                "sha256": hex::encode(Sha256::digest(&bytes)),
                "rows": snapshot.len(),
            }),
        );
    }

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": crate::db::now_rfc3339(),
        "entries": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    let cursor = zip.finish().context("failed to finalize zip bundle")?;
    Ok((
        cursor.into_inner(),
        ExportSummary {
            bundle_format: BUNDLE_FORMAT.to_string(),
            entry_count: TABLES.len() + 1,
            rows,
        },
    ))
}

/// Re-reads a bundle and checks its format and every entry checksum.
pub fn verify_bundle(bytes: &[u8]) -> anyhow::Result<ExportSummary> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let entries = manifest
        .get("entries")
        .and_then(|v| v.as_object())
        .ok_or_else(|| anyhow!("manifest has no entries"))?;

    let mut rows = BTreeMap::new();
    for (name, meta) in entries {
        let expected = meta.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
        let mut data = Vec::new();
        archive
            .by_name(name)
            .with_context(|| format!("bundle missing {name}"))?
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {name}"))?;
        if hex::encode(Sha256::digest(&data)) != expected {
            return Err(anyhow!("checksum mismatch for {name}"));
        }
        let parsed: Vec<Value> =
            serde_json::from_slice(&data).with_context(|| format!("{name} is invalid JSON"))?;
        let table = name
            .trim_start_matches("data/")
            .trim_end_matches(".json")
            .to_string();
        rows.insert(table, parsed.len());
    }

    Ok(ExportSummary {
        bundle_format: format.to_string(),
        entry_count: entries.len() + 1,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn tampered_entries_fail_verification() {
        let conn = open_in_memory().expect("db");
        let (bytes, _) = export_portal_bundle(&conn).expect("export");

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).expect("zip");
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::default();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).expect("entry");
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).expect("read");
            if name == "data/users.json" {
                data = b"[{\"id\":\"forged\"}]".to_vec();
            }
            zip.start_file(name.as_str(), opts).expect("start");
            zip.write_all(&data).expect("write");
        }
        let forged = zip.finish().expect("finish").into_inner();
        let err = verify_bundle(&forged).expect_err("tampered");
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
