use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTrialClaim, TrialBlockReason, TrialClaim},
    traits::{SettlementDbError, TrialOutcome},
};

/// Atomically records a trial claim, or reports which identity key blocked it.
///
/// The decision rides entirely on the per-column UNIQUE constraints: the INSERT either lands (the
/// trial is consumed) or hits a constraint (some key was already used). There is deliberately no
/// check-then-insert here — that pattern is a race window under concurrent submission.
pub async fn try_claim(claim: NewTrialClaim, conn: &mut SqliteConnection) -> Result<TrialOutcome, SettlementDbError> {
    let inserted: Result<TrialClaim, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO trial_claims (operator_id, network_origin, device_fingerprint)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(&claim.operator_id)
    .bind(&claim.network_origin)
    .bind(&claim.device_fingerprint)
    .fetch_one(&mut *conn)
    .await;
    match inserted {
        Ok(record) => {
            debug!("🗃️ Trial claim recorded for operator {}", record.operator_id);
            Ok(TrialOutcome::Allowed(record))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let reason = blocking_key(&claim, conn).await?;
            debug!("🗃️ Trial claim blocked ({reason:?}) for operator {}", claim.operator_id);
            Ok(TrialOutcome::Blocked(reason))
        },
        Err(e) => Err(e.into()),
    }
}

/// Identifies which key blocked the insert, in check order: operator account, network origin,
/// device fingerprint.
async fn blocking_key(claim: &NewTrialClaim, conn: &mut SqliteConnection) -> Result<TrialBlockReason, sqlx::Error> {
    let by_operator: Option<i64> = sqlx::query_scalar("SELECT id FROM trial_claims WHERE operator_id = $1")
        .bind(&claim.operator_id)
        .fetch_optional(&mut *conn)
        .await?;
    if by_operator.is_some() {
        return Ok(TrialBlockReason::Identity);
    }
    let by_origin: Option<i64> = sqlx::query_scalar("SELECT id FROM trial_claims WHERE network_origin = $1")
        .bind(&claim.network_origin)
        .fetch_optional(&mut *conn)
        .await?;
    if by_origin.is_some() {
        return Ok(TrialBlockReason::Origin);
    }
    // The insert failed, so if neither of the first two keys matched it was the fingerprint
    Ok(TrialBlockReason::Device)
}
