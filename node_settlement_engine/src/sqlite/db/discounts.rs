use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DiscountTerm, NewDiscountTerm},
    traits::SettlementDbError,
};

/// Fetches a discount code by its canonical (upper-case) form.
pub async fn fetch_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<DiscountTerm>, sqlx::Error> {
    let term = sqlx::query_as("SELECT * FROM discount_codes WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(term)
}

pub async fn insert(term: NewDiscountTerm, conn: &mut SqliteConnection) -> Result<DiscountTerm, SettlementDbError> {
    let code = term.code.clone();
    let stored: DiscountTerm = sqlx::query_as(
        r#"
            INSERT INTO discount_codes (code, kind, value, scope, expires_at, usage_cap)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(term.code)
    .bind(term.kind)
    .bind(term.value)
    .bind(term.scope)
    .bind(term.expires_at)
    .bind(term.usage_cap)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => SettlementDbError::CodeAlreadyExists(code),
        _ => SettlementDbError::from(e),
    })?;
    debug!("🗃️ Discount code [{}] inserted", stored.code);
    Ok(stored)
}

/// Consumes one usage of the code. The cap check and the increment happen in a single UPDATE, so
/// concurrent redemptions cannot push `usage_count` past the cap.
pub async fn redeem(code: &str, conn: &mut SqliteConnection) -> Result<DiscountTerm, SettlementDbError> {
    let redeemed: Option<DiscountTerm> = sqlx::query_as(
        r#"
            UPDATE discount_codes
            SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP
            WHERE code = $1 AND (usage_cap IS NULL OR usage_count < usage_cap)
            RETURNING *;
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;
    match redeemed {
        Some(term) => {
            debug!("🗃️ Discount code [{}] redeemed, usage now {}", term.code, term.usage_count);
            Ok(term)
        },
        // The update matched nothing: the code is either missing or at its cap
        None => match fetch_by_code(code, conn).await? {
            Some(_) => Err(SettlementDbError::CodeExhausted(code.to_string())),
            None => Err(SettlementDbError::CodeNotFound(code.to_string())),
        },
    }
}
