//! Output store statistics.
//!
//! A quick summary of what a unify run produced: listing and product
//! counts, how many keys fell back to the text tier, and a per-marketplace
//! breakdown. Used by `tire-unify stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;

/// Per-marketplace breakdown of listings and products.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceStats {
    pub marketplace: String,
    pub listings: i64,
    pub products: i64,
    pub priced: i64,
    pub avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub listings: i64,
    pub products: i64,
    pub fallback_keys: i64,
    pub summary_rows: i64,
    pub runs: i64,
    pub last_run_at: Option<String>,
    pub by_marketplace: Vec<MarketplaceStats>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let listings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_listings")
        .fetch_one(pool)
        .await?;

    let products: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT canonical_key) FROM unified_listings")
            .fetch_one(pool)
            .await?;

    let fallback_keys: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM unified_listings WHERE key_tier = 'fallback'",
    )
    .fetch_one(pool)
    .await?;

    let summary_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM canonical_summary")
        .fetch_one(pool)
        .await?;

    let runs: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT run_id) FROM canonical_summary")
        .fetch_one(pool)
        .await?;

    let last_run_at: Option<String> =
        sqlx::query_scalar("SELECT MAX(computed_at) FROM canonical_summary")
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query(
        r#"
        SELECT
            marketplace,
            COUNT(*) AS listings,
            COUNT(DISTINCT canonical_key) AS products,
            COUNT(price) AS priced,
            AVG(price) AS avg_price
        FROM unified_listings
        GROUP BY marketplace
        ORDER BY listings DESC, marketplace
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_marketplace = rows
        .iter()
        .map(|row| MarketplaceStats {
            marketplace: row.get("marketplace"),
            listings: row.get("listings"),
            products: row.get("products"),
            priced: row.get("priced"),
            avg_price: row.get("avg_price"),
        })
        .collect();

    Ok(StoreStats {
        listings,
        products,
        fallback_keys,
        summary_rows,
        runs,
        last_run_at,
        by_marketplace,
    })
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(db_path: &Path) -> Result<()> {
    let pool = db::connect_read_only(db_path).await?;
    let stats = collect_stats(&pool).await?;
    pool.close().await;

    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Tire Unifier — Store Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Listings:    {}", stats.listings);
    println!("  Products:    {}", stats.products);
    println!(
        "  Fallback:    {} / {} ({}%)",
        stats.fallback_keys,
        stats.listings,
        percent(stats.fallback_keys, stats.listings)
    );
    println!(
        "  Summaries:   {} rows from {} run{}",
        stats.summary_rows,
        stats.runs,
        if stats.runs == 1 { "" } else { "s" }
    );
    if let Some(last) = &stats.last_run_at {
        println!("  Last run:    {}", last);
    }

    if !stats.by_marketplace.is_empty() {
        println!();
        println!("  By marketplace:");
        println!(
            "  {:<24} {:>8} {:>9} {:>7} {:>11}",
            "MARKETPLACE", "LISTINGS", "PRODUCTS", "PRICED", "AVG PRICE"
        );
        println!("  {}", "-".repeat(63));

        for m in &stats.by_marketplace {
            let name = if m.marketplace.is_empty() {
                "(unknown)"
            } else {
                m.marketplace.as_str()
            };
            let avg = m
                .avg_price
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {:>8} {:>9} {:>7} {:>11}",
                name, m.listings, m.products, m.priced, avg
            );
        }
    }

    println!();
    Ok(())
}

fn percent(part: i64, total: i64) -> i64 {
    if total > 0 {
        (part * 100) / total
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 0);
    }
}
