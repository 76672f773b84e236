//! Export output tables as JSON or CSV.
//!
//! Writes the rows of `unified_listings` or `canonical_summary` to a file,
//! or to stdout for piping. JSON is an array of objects keyed by column
//! name; CSV has a header row.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{Map, Value};
use sqlx::{Column, Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::models::RawValue;
use crate::readers::decode_cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportTable {
    Listings,
    Summary,
}

impl ExportTable {
    fn query(&self) -> &'static str {
        match self {
            ExportTable::Listings => {
                "SELECT * FROM unified_listings ORDER BY canonical_key, marketplace, listing_id"
            }
            ExportTable::Summary => {
                "SELECT * FROM canonical_summary \
                 ORDER BY computed_at, run_id, brand, model, size, n_listings DESC, canonical_key"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Column names and decoded values of every row, in query order.
pub async fn fetch_rows(
    pool: &SqlitePool,
    table: ExportTable,
) -> Result<(Vec<String>, Vec<Vec<RawValue>>)> {
    let rows = sqlx::query(table.query()).fetch_all(pool).await?;

    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };

    let values = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|i| decode_cell(row, i)).collect())
        .collect();

    Ok((columns, values))
}

fn to_json_value(value: &RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Text(s) => Value::String(s.clone()),
        RawValue::Integer(i) => Value::from(*i),
        RawValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

fn to_csv_field(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Text(s) => s.clone(),
        RawValue::Integer(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
    }
}

pub fn render_json(columns: &[String], rows: &[Vec<RawValue>]) -> Result<String> {
    let objects: Vec<Value> = rows
        .iter()
        .map(|row| {
            let map: Map<String, Value> = columns
                .iter()
                .zip(row)
                .map(|(c, v)| (c.clone(), to_json_value(v)))
                .collect();
            Value::Object(map)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&objects)?)
}

pub fn render_csv(columns: &[String], rows: &[Vec<RawValue>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !columns.is_empty() {
        writer.write_record(columns)?;
    }
    for row in rows {
        writer.write_record(row.iter().map(to_csv_field))?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    Ok(String::from_utf8(bytes)?)
}

/// Export one table.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(
    db_path: &Path,
    table: ExportTable,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let pool = db::connect_read_only(db_path).await?;
    let (columns, rows) = fetch_rows(&pool, table).await?;
    pool.close().await;

    let rendered = match format {
        ExportFormat::Json => render_json(&columns, &rows)?,
        ExportFormat::Csv => render_csv(&columns, &rows)?,
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => {
            print!("{}", rendered);
            if format == ExportFormat::Json {
                println!();
            }
        }
    }

    Ok(())
}
