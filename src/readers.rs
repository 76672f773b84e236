//! Built-in source readers.
//!
//! | Reader | Extensions | Notes |
//! |--------|------------|-------|
//! | [`CsvReader`] | `.csv` | UTF-8 with Latin-1 fallback; `;` or `,` delimited; ragged rows allowed |
//! | [`JsonReader`] | `.json`, `.jsonl`, `.ndjson` | array, object holding an array, single object, or one object per line |
//! | [`SqliteReader`] | `.sqlite`, `.sqlite3`, `.db` | every user table, opened read-only |
//!
//! Column names are trimmed and lower-cased; empty cells become
//! [`RawValue::Null`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::db;
use crate::discover::DiscoveredFile;
use crate::models::{RawRecord, RawTable, RawValue};
use crate::traits::{extension_of, SourceReader};

fn column_name(raw: &str) -> String {
    raw.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

// ═══════════════════════════════════════════════════════════════════════
// CSV
// ═══════════════════════════════════════════════════════════════════════

pub struct CsvReader;

#[async_trait]
impl SourceReader for CsvReader {
    fn name(&self) -> &str {
        "csv"
    }

    fn handles(&self, path: &Path) -> bool {
        extension_of(path) == "csv"
    }

    async fn read(&self, file: &DiscoveredFile) -> Result<Vec<RawTable>> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let text = decode_text(&bytes);
        let records = parse_csv(&text)?;
        Ok(vec![RawTable::new(file.source_tag.clone(), records)])
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte is one code point).
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

pub fn parse_csv(text: &str) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(column_name)
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("Malformed CSV row")?;
        let mut record = RawRecord::new();
        for (name, cell) in headers.iter().zip(row.iter()) {
            if name.is_empty() {
                continue;
            }
            let value = if cell.is_empty() {
                RawValue::Null
            } else {
                RawValue::Text(cell.to_string())
            };
            record.entry(name.clone()).or_insert(value);
        }
        records.push(record);
    }

    Ok(records)
}

// ═══════════════════════════════════════════════════════════════════════
// JSON / NDJSON
// ═══════════════════════════════════════════════════════════════════════

pub struct JsonReader;

#[async_trait]
impl SourceReader for JsonReader {
    fn name(&self) -> &str {
        "json"
    }

    fn handles(&self, path: &Path) -> bool {
        matches!(extension_of(path).as_str(), "json" | "jsonl" | "ndjson")
    }

    async fn read(&self, file: &DiscoveredFile) -> Result<Vec<RawTable>> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let text = decode_text(&bytes);
        let line_delimited = matches!(extension_of(&file.path).as_str(), "jsonl" | "ndjson");
        let records = parse_json(&text, line_delimited)?;
        Ok(vec![RawTable::new(file.source_tag.clone(), records)])
    }
}

/// Parse a JSON document in any of the accepted shapes. When the whole
/// text is not one JSON value it is read as newline-delimited objects.
pub fn parse_json(text: &str, line_delimited: bool) -> Result<Vec<RawRecord>> {
    if !line_delimited {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return records_from_document(value);
        }
    }
    parse_ndjson(text)
}

fn records_from_document(value: Value) -> Result<Vec<RawRecord>> {
    match value {
        Value::Array(items) => Ok(objects_to_records(items)),
        Value::Object(map) => {
            let nested = map.values().find_map(|v| match v {
                Value::Array(items) if items.iter().any(Value::is_object) => Some(items.clone()),
                _ => None,
            });
            match nested {
                Some(items) => Ok(objects_to_records(items)),
                None => Ok(objects_to_records(vec![Value::Object(map)])),
            }
        }
        _ => bail!("JSON document is neither an object nor an array"),
    }
}

fn parse_ndjson(text: &str) -> Result<Vec<RawRecord>> {
    let mut objects = Vec::new();
    let mut bad_lines = 0usize;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => objects.push(value),
            _ => bad_lines += 1,
        }
    }
    if objects.is_empty() && bad_lines > 0 {
        bail!("No JSON objects found ({} unparseable lines)", bad_lines);
    }
    if bad_lines > 0 {
        debug!(bad_lines, "skipped unparseable JSON lines");
    }
    Ok(objects_to_records(objects))
}

fn objects_to_records(items: Vec<Value>) -> Vec<RawRecord> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(
                map.into_iter()
                    .map(|(k, v)| (column_name(&k), json_to_raw(v)))
                    .filter(|(k, _)| !k.is_empty())
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

fn json_to_raw(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Text(b.to_string()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Integer(i),
            None => n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Null),
        },
        Value::String(s) if s.trim().is_empty() => RawValue::Null,
        Value::String(s) => RawValue::Text(s),
        nested => RawValue::Text(nested.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SQLite
// ═══════════════════════════════════════════════════════════════════════

pub struct SqliteReader;

#[async_trait]
impl SourceReader for SqliteReader {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn handles(&self, path: &Path) -> bool {
        matches!(extension_of(path).as_str(), "sqlite" | "sqlite3" | "db")
    }

    async fn read(&self, file: &DiscoveredFile) -> Result<Vec<RawTable>> {
        let pool = db::connect_read_only(&file.path).await?;

        let table_names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .with_context(|| format!("Not a readable SQLite database: {}", file.path.display()))?;

        let mut tables = Vec::new();
        for name in table_names {
            match read_table(&pool, &name).await {
                Ok(records) => {
                    debug!(table = %name, rows = records.len(), "read sqlite table");
                    let mut table = RawTable::new(file.source_tag.clone(), records);
                    table.table = Some(name);
                    tables.push(table);
                }
                Err(e) => {
                    warn!(file = %file.source_tag, table = %name, error = %e, "skipping unreadable table");
                }
            }
        }

        pool.close().await;
        Ok(tables)
    }
}

async fn read_table(pool: &sqlx::SqlitePool, name: &str) -> Result<Vec<RawRecord>> {
    let sql = format!("SELECT * FROM \"{}\"", name.replace('"', "\"\""));
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut record = RawRecord::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let key = column_name(column.name());
            if key.is_empty() {
                continue;
            }
            record.entry(key).or_insert_with(|| decode_cell(row, idx));
        }
        records.push(record);
    }
    Ok(records)
}

/// SQLite is dynamically typed, so each cell is tried as text, integer,
/// then real. Blobs decode as null.
pub(crate) fn decode_cell(row: &sqlx::sqlite::SqliteRow, idx: usize) -> RawValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(RawValue::Text).unwrap_or(RawValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(RawValue::Integer).unwrap_or(RawValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(RawValue::Float).unwrap_or(RawValue::Null);
    }
    RawValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_csv_headers_lowercased_and_trimmed() {
        let records = parse_csv("Titulo , PRECO,url\n Pneu A , 199 ,\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("titulo"), Some(&text("Pneu A")));
        assert_eq!(records[0].get("preco"), Some(&text("199")));
        assert_eq!(records[0].get("url"), Some(&RawValue::Null));
    }

    #[test]
    fn test_csv_semicolon_delimited() {
        let records = parse_csv("titulo;preco\nPneu A;199,90\nPneu B;210,00\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("preco"), Some(&text("210,00")));
    }

    #[test]
    fn test_csv_ragged_rows() {
        let records = parse_csv("title,price,url\nA,1\nB,2,http://x/1,extra\n").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].get("url").is_none());
        assert_eq!(records[1].get("url"), Some(&text("http://x/1")));
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"titulo\nPneu Refor\xe7ado\n";
        let decoded = decode_text(bytes);
        assert!(decoded.contains("Reforçado"));
        assert_eq!(decode_text("ação".as_bytes()), "ação");
    }

    #[test]
    fn test_json_array() {
        let records =
            parse_json(r#"[{"Title": "A", "price": 100}, {"title": "B", "price": 99.5}]"#, false)
                .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("title"), Some(&text("A")));
        assert_eq!(records[0].get("price"), Some(&RawValue::Integer(100)));
        assert_eq!(records[1].get("price"), Some(&RawValue::Float(99.5)));
    }

    #[test]
    fn test_json_object_holding_array() {
        let records = parse_json(
            r#"{"meta": {"site": "x"}, "items": [{"title": "A"}, {"title": "B"}]}"#,
            false,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_json_single_object() {
        let records = parse_json(r#"{"title": "A", "tags": ["x"], "ok": true}"#, false).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("ok"), Some(&text("true")));
        assert_eq!(records[0].get("tags"), Some(&text(r#"["x"]"#)));
    }

    #[test]
    fn test_ndjson_lines() {
        let text = "{\"title\": \"A\"}\n\n{\"title\": \"B\"}\nnot json\n";
        let records = parse_json(text, true).unwrap();
        assert_eq!(records.len(), 2);
        // Also detected when the extension says .json.
        assert_eq!(parse_json(text, false).unwrap().len(), 2);
    }

    #[test]
    fn test_garbage_json_is_an_error() {
        assert!(parse_json("not json at all", false).is_err());
        assert!(parse_json("42", false).is_err());
    }

    #[tokio::test]
    async fn test_sqlite_reader_reads_every_table() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("scrape.sqlite");
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("CREATE TABLE anuncios (titulo TEXT, preco REAL, qtd INTEGER, foto BLOB)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO anuncios VALUES ('Pneu A', 199.9, 4, x'00'), (NULL, NULL, NULL, NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE vazia (x TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let file = DiscoveredFile {
            path: PathBuf::from(&path),
            source_tag: "ml/scrape.sqlite".into(),
        };
        let tables = SqliteReader.read(&file).await.unwrap();
        assert_eq!(tables.len(), 2);
        let anuncios = tables
            .iter()
            .find(|t| t.table.as_deref() == Some("anuncios"))
            .unwrap();
        assert_eq!(anuncios.source_file, "ml/scrape.sqlite");
        assert_eq!(anuncios.records.len(), 2);
        let first = &anuncios.records[0];
        assert_eq!(first.get("titulo"), Some(&text("Pneu A")));
        assert_eq!(first.get("preco"), Some(&RawValue::Float(199.9)));
        assert_eq!(first.get("qtd"), Some(&RawValue::Integer(4)));
        assert_eq!(anuncios.records[1].get("titulo"), Some(&RawValue::Null));
    }

    #[tokio::test]
    async fn test_sqlite_reader_rejects_non_database() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("fake.db");
        std::fs::write(&path, "this is not sqlite").unwrap();
        let file = DiscoveredFile {
            path,
            source_tag: "fake.db".into(),
        };
        assert!(SqliteReader.read(&file).await.is_err());
    }
}
