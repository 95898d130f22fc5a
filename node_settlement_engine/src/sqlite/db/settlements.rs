use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::{NewSettlement, Settlement}, traits::SettlementDbError};

/// Inserts the settlement, returning `false` in the second parameter if a settlement with the same
/// reference already exists. The UNIQUE constraint on `reference` backs this up even when two
/// finalization attempts race.
pub async fn idempotent_insert(
    settlement: NewSettlement,
    conn: &mut SqliteConnection,
) -> Result<(Settlement, bool), SettlementDbError> {
    let reference = settlement.reference.clone();
    let inserted: Result<Settlement, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO settlements (reference, kind, plan, final_total)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(settlement.reference)
    .bind(settlement.kind)
    .bind(settlement.plan)
    .bind(settlement.final_total)
    .fetch_one(&mut *conn)
    .await;
    match inserted {
        Ok(record) => {
            debug!("🗃️ Settlement [{}] inserted with id {}", record.reference, record.id);
            Ok((record, true))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_by_reference(&reference, conn)
                .await?
                .ok_or_else(|| SettlementDbError::SettlementNotFound(reference))?;
            Ok((existing, false))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Settlement>, sqlx::Error> {
    let settlement = sqlx::query_as("SELECT * FROM settlements WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(settlement)
}
