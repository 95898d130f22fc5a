//! `SqliteDatabase` is the concrete [`SettlementDatabase`] backend.
//!
//! It composes the low-level functions in [`super::db`] under pool connections and transactions.
//! The atomicity guarantees the trait demands (trial claims, settlement idempotency) are carried
//! by the schema's UNIQUE constraints, not by application-level locking.
use std::fmt::Debug;

use sqlx::SqlitePool;

use super::db::{discounts, new_pool, settlements, trials};
use crate::{
    db_types::{DiscountTerm, NewDiscountTerm, NewSettlement, NewTrialClaim, Settlement},
    traits::{SettlementDatabase, SettlementDbError, TrialOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementDbError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Called once at server startup.
    pub async fn run_migrations(&self) -> Result<(), SettlementDbError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SettlementDbError::DatabaseError(e.to_string()))
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_discount_code(&self, code: &str) -> Result<Option<DiscountTerm>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        let term = discounts::fetch_by_code(code, &mut conn).await?;
        Ok(term)
    }

    async fn redeem_discount_code(&self, code: &str) -> Result<DiscountTerm, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let term = discounts::redeem(code, &mut tx).await?;
        tx.commit().await?;
        Ok(term)
    }

    async fn insert_discount_code(&self, term: NewDiscountTerm) -> Result<DiscountTerm, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let stored = discounts::insert(term, &mut tx).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn try_claim_trial(&self, claim: NewTrialClaim) -> Result<TrialOutcome, SettlementDbError> {
        // The conditional insert and the blocking-key lookup must see the same state
        let mut tx = self.pool.begin().await?;
        let outcome = trials::try_claim(claim, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert_settlement(&self, settlement: NewSettlement) -> Result<(Settlement, bool), SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let result = settlements::idempotent_insert(settlement, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn insert_settlement_redeeming_code(
        &self,
        settlement: NewSettlement,
        code: Option<&str>,
    ) -> Result<(Settlement, bool), SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let (record, inserted) = settlements::idempotent_insert(settlement, &mut tx).await?;
        if inserted {
            if let Some(code) = code {
                // A cap failure here rolls the settlement back with it
                discounts::redeem(code, &mut tx).await?;
            }
        }
        tx.commit().await?;
        Ok((record, inserted))
    }

    async fn fetch_settlement_by_reference(&self, reference: &str) -> Result<Option<Settlement>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        let settlement = settlements::fetch_by_reference(reference, &mut conn).await?;
        Ok(settlement)
    }

    async fn close(&mut self) -> Result<(), SettlementDbError> {
        self.pool.close().await;
        Ok(())
    }
}
