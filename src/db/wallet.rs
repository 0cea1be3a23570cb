use crate::models::FirstSeen;
use chrono::DateTime;
use sqlx::{Pool, Row, Sqlite};

/// Merge first-seen timestamps monotonically: the stored value only ever
/// moves backwards in time, never forwards.
pub async fn merge_first_seen(
    pool: &Pool<Sqlite>,
    entries: &[(String, i64)],
) -> Result<(), sqlx::Error> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for (address, first_seen) in entries {
        sqlx::query(
            r#"
            INSERT INTO wallet_first_seen (address, first_seen)
            VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET
                first_seen = MIN(wallet_first_seen.first_seen, excluded.first_seen)
            "#,
        )
        .bind(address)
        .bind(first_seen)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Load every wallet first seen at or after `floor` (the data-coverage start).
pub async fn load_first_seen(pool: &Pool<Sqlite>, floor: i64) -> Result<Vec<FirstSeen>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT address, first_seen FROM wallet_first_seen WHERE first_seen >= ? ORDER BY address",
    )
    .bind(floor)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let first_seen = DateTime::from_timestamp(row.get::<i64, _>("first_seen"), 0)?;
            Some(FirstSeen {
                address: row.get("address"),
                first_seen,
            })
        })
        .collect())
}
