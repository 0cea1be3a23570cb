use crate::db::{parse_date, BIND_CHUNK};
use crate::models::BalanceSnapshot;
use chrono::NaiveDate;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

pub async fn upsert_balances(
    pool: &Pool<Sqlite>,
    snapshots: &[BalanceSnapshot],
) -> Result<(), sqlx::Error> {
    if snapshots.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for snapshot in snapshots {
        sqlx::query(
            r#"
            INSERT INTO wallet_balances (address, as_of_date, balance_ustx, funded, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(address, as_of_date) DO UPDATE SET
                balance_ustx = excluded.balance_ustx,
                funded = excluded.funded,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&snapshot.address)
        .bind(snapshot.as_of_date.to_string())
        .bind(snapshot.balance_ustx)
        .bind(snapshot.funded)
        .bind(snapshot.ingested_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Addresses among `addresses` that already have a snapshot for `as_of_date`.
/// A refresh run only fetches the gap.
pub async fn existing_snapshot_addresses(
    pool: &Pool<Sqlite>,
    as_of_date: NaiveDate,
    addresses: &[String],
) -> Result<HashSet<String>, sqlx::Error> {
    let mut existing = HashSet::new();
    let date = as_of_date.to_string();

    for chunk in addresses.chunks(BIND_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT address FROM wallet_balances WHERE as_of_date = ? AND address IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(&date);
        for address in chunk {
            query = query.bind(address);
        }
        for row in query.fetch_all(pool).await? {
            existing.insert(row.get::<String, _>("address"));
        }
    }

    Ok(existing)
}

/// All snapshots taken on any of the given dates.
pub async fn balances_for_dates(
    pool: &Pool<Sqlite>,
    dates: &[NaiveDate],
) -> Result<Vec<BalanceSnapshot>, sqlx::Error> {
    if dates.is_empty() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    let encoded: Vec<String> = dates.iter().map(|d| d.to_string()).collect();

    for chunk in encoded.chunks(BIND_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT address, as_of_date, balance_ustx, funded, ingested_at
             FROM wallet_balances WHERE as_of_date IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for date in chunk {
            query = query.bind(date);
        }
        for row in query.fetch_all(pool).await? {
            snapshots.push(BalanceSnapshot {
                address: row.get("address"),
                as_of_date: parse_date(row.get::<String, _>("as_of_date").as_str())?,
                balance_ustx: row.get("balance_ustx"),
                funded: row.get::<i64, _>("funded") != 0,
                ingested_at: row.get("ingested_at"),
            });
        }
    }

    Ok(snapshots)
}
