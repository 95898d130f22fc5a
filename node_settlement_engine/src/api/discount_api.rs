use chrono::Utc;
use log::*;

use crate::{
    api::errors::DiscountError,
    db_types::{canonical_code, DiscountKind, DiscountTerm, NewDiscountTerm, ServerClass},
    traits::SettlementDatabase,
};

/// The discount authority.
///
/// Validation happens server-side on every apply-click, so a client cannot sidestep expiry, usage
/// caps or scope by recomputing locally. Validation is idempotent: re-running it for an applied
/// code (for instance after the customer switches server class) yields the same answer or a scope
/// denial telling the customer which scope the code requires.
#[derive(Debug, Clone)]
pub struct DiscountApi<B> {
    db: B,
}

impl<B> DiscountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> DiscountApi<B>
where B: SettlementDatabase
{
    /// Validates a raw, user-entered code against the given plan context and returns the active
    /// term, or the denial to show the customer.
    pub async fn validate(&self, raw_code: &str, class: ServerClass) -> Result<DiscountTerm, DiscountError> {
        let code = canonical_code(raw_code);
        if code.is_empty() || code.len() > 64 {
            return Err(DiscountError::MalformedCode);
        }
        let term = self.db.fetch_discount_code(&code).await?.ok_or_else(|| {
            debug!("🏷️ Unknown discount code entered: {code}");
            DiscountError::NotFound(code.clone())
        })?;
        if term.is_expired(Utc::now()) {
            debug!("🏷️ Code {code} is expired");
            return Err(DiscountError::Expired(code));
        }
        if term.is_exhausted() {
            debug!("🏷️ Code {code} has reached its usage cap");
            return Err(DiscountError::UsageCapReached(code));
        }
        if !term.scope.covers(class) {
            debug!("🏷️ Code {code} requires scope {}, plan is {class}", term.scope);
            return Err(DiscountError::ScopeMismatch { code, required: term.scope });
        }
        trace!("🏷️ Code {code} validated for {class} plans");
        Ok(term)
    }

    /// Re-checks an already-applied term after a plan change. On a scope mismatch the caller must
    /// clear the term and tell the customer which scope it required; silently re-pricing is not an
    /// option.
    pub fn revalidate_for_class(&self, term: &DiscountTerm, class: ServerClass) -> Result<(), DiscountError> {
        if term.scope.covers(class) {
            Ok(())
        } else {
            info!("🏷️ Applied code {} no longer matches plan scope; it must be cleared", term.code);
            Err(DiscountError::ScopeMismatch { code: term.code.clone(), required: term.scope })
        }
    }

    /// Consumes one usage of the code. Called at finalization time, never at apply time, so an
    /// abandoned flow does not burn a usage. The cap check and the increment are a single atomic
    /// statement in the backend.
    pub async fn redeem(&self, code: &str) -> Result<DiscountTerm, DiscountError> {
        let code = canonical_code(code);
        let term = self.db.redeem_discount_code(&code).await?;
        debug!("🏷️ Code {code} redeemed ({}/{:?} usages)", term.usage_count, term.usage_cap);
        Ok(term)
    }

    /// Stores a new code. This is the admin-tooling entry point; the storefront never creates
    /// codes.
    pub async fn insert(&self, term: NewDiscountTerm) -> Result<DiscountTerm, DiscountError> {
        match term.kind {
            DiscountKind::Percentage if !(1..=100).contains(&term.value) => {
                return Err(DiscountError::InvalidTerm(format!(
                    "percentage value must be in (0, 100], got {}",
                    term.value
                )));
            },
            DiscountKind::Flat if term.value < 0 => {
                return Err(DiscountError::InvalidTerm(format!("flat value must be non-negative, got {}", term.value)));
            },
            _ => {},
        }
        if canonical_code(&term.code).is_empty() {
            return Err(DiscountError::MalformedCode);
        }
        let stored = self.db.insert_discount_code(term).await?;
        info!("🏷️ New discount code {} stored", stored.code);
        Ok(stored)
    }
}
