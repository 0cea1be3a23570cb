use crate::models::SegmentedRetentionRow;
use sqlx::{Pool, Row, Sqlite};

/// Replace the persisted segmented panel wholesale; it is fully derived, so a
/// rebuild always starts from a clean slate.
pub async fn replace_segmented_panel(
    pool: &Pool<Sqlite>,
    rows: &[SegmentedRetentionRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM retention_segmented")
        .execute(&mut *tx)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO retention_segmented
            (window_days, segment, retained_users, eligible_users, retention_pct,
             anchor_window_days, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.window_days as i64)
        .bind(&row.segment)
        .bind(row.retained_users as i64)
        .bind(row.eligible_users as i64)
        .bind(row.retention_pct)
        .bind(row.anchor_window_days as i64)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

pub async fn load_segmented_panel(
    pool: &Pool<Sqlite>,
) -> Result<Vec<SegmentedRetentionRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT window_days, segment, retained_users, eligible_users, retention_pct,
                  anchor_window_days, updated_at
           FROM retention_segmented
           ORDER BY window_days, segment"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SegmentedRetentionRow {
            window_days: row.get::<i64, _>("window_days") as u32,
            segment: row.get("segment"),
            retained_users: row.get::<i64, _>("retained_users") as u64,
            eligible_users: row.get::<i64, _>("eligible_users") as u64,
            retention_pct: row.get("retention_pct"),
            anchor_window_days: row.get::<i64, _>("anchor_window_days") as u32,
            updated_at: row.get("updated_at"),
        })
        .collect())
}
