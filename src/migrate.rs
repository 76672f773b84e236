use anyhow::Result;
use sqlx::SqliteConnection;

pub const LISTINGS_TABLE: &str = "unified_listings";
pub const SUMMARY_TABLE: &str = "canonical_summary";

/// Create the output tables if they do not exist yet.
pub async fn create_output_tables(conn: &mut SqliteConnection) -> Result<()> {
    // listing_id is a content hash, so re-inserting an identical row is a no-op
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unified_listings (
            listing_id TEXT PRIMARY KEY,
            marketplace TEXT NOT NULL,
            title TEXT NOT NULL,
            price REAL,
            url TEXT,
            brand_raw TEXT,
            model_raw TEXT,
            size_raw TEXT,
            seller TEXT,
            sku TEXT,
            collected_at TEXT,
            source_file TEXT NOT NULL,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            size TEXT NOT NULL,
            canonical_key TEXT NOT NULL,
            key_tier TEXT NOT NULL,
            product_id TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS canonical_summary (
            run_id TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            canonical_key TEXT NOT NULL,
            product_id TEXT NOT NULL,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            size TEXT NOT NULL,
            n_listings INTEGER NOT NULL,
            marketplaces TEXT NOT NULL,
            min_price REAL,
            max_price REAL,
            mean_price REAL,
            median_price REAL,
            p10 REAL,
            p90 REAL,
            trimmed_mean REAL,
            evidence_files TEXT NOT NULL,
            first_seen TEXT,
            last_seen TEXT,
            PRIMARY KEY (run_id, canonical_key)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_canonical_key ON unified_listings(canonical_key)",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_listings_marketplace ON unified_listings(marketplace)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Drop the output tables (replace mode).
pub async fn drop_output_tables(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS unified_listings")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS canonical_summary")
        .execute(&mut *conn)
        .await?;
    Ok(())
}
