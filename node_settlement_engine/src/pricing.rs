//! The price engine.
//!
//! [`PriceEngine::quote`] is a pure function from a plan selection and the discount layers to an
//! itemized [`PriceBreakdown`]. It performs no I/O and holds no state beyond its price table, so it
//! is safe to call on every keystroke of the plan configurator.
//!
//! Two business rules are encoded as explicit guards rather than UI ordering:
//! * A commitment-term discount and a manually entered code are mutually exclusive. Quoting with
//!   both present is an error; the storefront clears the applied code when a discounted term is
//!   selected.
//! * The `Daily` term is trial-only. The engine rejects it outright; the trial path constructs its
//!   zero-total breakdown via [`PriceBreakdown::zero_total`] without consulting the engine.

use nsg_common::Usd;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{CommitmentTerm, DiscountScope, DiscountTerm, HardwareTier, PlanSelection, ServerClass};

/// Fraction taken off each stake package at the 3-month commitment tier only.
const THREE_MONTH_STAKE_DISCOUNT: f64 = 0.10;
/// Referral reward: a flat fraction of the remainder after the code discount.
const REFERRAL_RATE: f64 = 0.10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Dedicated plans require a hardware tier")]
    MissingHardwareTier,
    #[error("Dedicated plans require a location")]
    MissingLocation,
    #[error("Unknown hardware tier: {0}")]
    UnknownHardwareTier(String),
    #[error("Stake packages and shred access are only available on dedicated plans")]
    AddonsRequireDedicated,
    #[error("At most {max} stake packages can be added, got {got}")]
    TooManyStakePackages { max: u8, got: u8 },
    #[error("The daily term is only available through a redeemed trial")]
    TrialOnlyTerm,
    #[error("A discount code cannot be combined with a discounted commitment term")]
    CodeConflictsWithCommitment,
    #[error("The applied code is only valid for {required} plans")]
    CodeScopeMismatch { required: DiscountScope },
}

//--------------------------------------     PriceTable      ---------------------------------------------------------
/// All fixed prices and rates the engine quotes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// Fixed monthly price for a shared node.
    pub shared_monthly: Usd,
    /// Fixed monthly price per dedicated hardware tier.
    pub dedicated_tiers: Vec<(HardwareTier, Usd)>,
    /// Price per stake package.
    pub stake_package: Usd,
    /// Flat price for the shred-stream add-on.
    pub shreds_addon: Usd,
    /// Rent-sharing surcharge rate for shared nodes.
    pub rent_rate_shared: f64,
    /// Rent-sharing surcharge rate for dedicated nodes.
    pub rent_rate_dedicated: f64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            shared_monthly: Usd::from_dollars(300),
            dedicated_tiers: vec![
                ("base".into(), Usd::from_dollars(450)),
                ("performance".into(), Usd::from_dollars(650)),
                ("ultra".into(), Usd::from_dollars(900)),
            ],
            stake_package: Usd::from_dollars(350),
            shreds_addon: Usd::from_dollars(250),
            rent_rate_shared: 0.10,
            rent_rate_dedicated: 0.05,
        }
    }
}

impl PriceTable {
    fn tier_price(&self, tier: &HardwareTier) -> Option<Usd> {
        self.dedicated_tiers.iter().find(|(t, _)| t == tier).map(|(_, p)| *p)
    }

    fn rent_rate(&self, class: ServerClass) -> f64 {
        match class {
            ServerClass::Shared => self.rent_rate_shared,
            ServerClass::Dedicated => self.rent_rate_dedicated,
        }
    }
}

//--------------------------------------   PriceBreakdown    ---------------------------------------------------------
/// The itemized result of a quote. `final_total` is fully determined by the other fields:
/// `max(0, discounted server price + add-ons + rent − code discount − referral discount)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// The undiscounted server price from the lookup table.
    pub base_server_price: Usd,
    /// The server price after the commitment-term discount.
    pub discounted_server_price: Usd,
    /// Add-on charges. Never subject to commitment or code discounts.
    pub addons_price: Usd,
    pub rent_surcharge: Usd,
    pub code_discount_amount: Usd,
    pub referral_discount_amount: Usd,
    pub final_total: Usd,
    /// The full, undiscounted total shown struck through next to the real price.
    pub original_total_for_display: Usd,
}

impl PriceBreakdown {
    /// The zero-cost breakdown used by the trial and 100%-code settlement paths. These paths skip
    /// the payment matcher entirely, so there is nothing to itemize.
    pub fn zero_total() -> Self {
        Self {
            base_server_price: Usd::default(),
            discounted_server_price: Usd::default(),
            addons_price: Usd::default(),
            rent_surcharge: Usd::default(),
            code_discount_amount: Usd::default(),
            referral_discount_amount: Usd::default(),
            final_total: Usd::default(),
            original_total_for_display: Usd::default(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.final_total.is_zero()
    }
}

//--------------------------------------     PriceEngine     ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct PriceEngine {
    table: PriceTable,
}

impl PriceEngine {
    pub fn new(table: PriceTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    /// Computes the full price breakdown for a plan selection.
    ///
    /// `code` is an already-validated discount term (the discount authority enforces expiry, usage
    /// cap and scope server-side); the engine still guards scope as an integrity check, since the
    /// plan may have changed after the code was applied.
    pub fn quote(
        &self,
        selection: &PlanSelection,
        code: Option<&DiscountTerm>,
        referral_active: bool,
    ) -> Result<PriceBreakdown, PricingError> {
        self.validate(selection)?;
        if let Some(term) = code {
            if selection.commitment_term.has_discount() {
                return Err(PricingError::CodeConflictsWithCommitment);
            }
            if !term.scope.covers(selection.server_class) {
                return Err(PricingError::CodeScopeMismatch { required: term.scope });
            }
        }

        let base_server_price = self.base_price(selection)?;
        let commitment_rate = selection.commitment_term.discount_rate();
        let discounted_server_price = base_server_price.scale_to_dollar(1.0 - commitment_rate);

        let addons_price = self.addons_price(selection, selection.commitment_term);
        let rent_rate = self.table.rent_rate(selection.server_class);
        let rent_surcharge = if selection.rent_sharing {
            (discounted_server_price + addons_price).scale_to_dollar(rent_rate)
        } else {
            Usd::default()
        };

        // Codes only ever discount the server charge: the discounted server price plus the rent
        // portion attributable to it. Add-ons are off limits.
        let code_discount_amount = match code {
            Some(term) => {
                let server_rent_portion = if selection.rent_sharing {
                    discounted_server_price.scale_to_dollar(rent_rate)
                } else {
                    Usd::default()
                };
                term.discount_against(discounted_server_price + server_rent_portion)
            },
            None => Usd::default(),
        };

        let remainder = discounted_server_price + addons_price + rent_surcharge - code_discount_amount;
        let referral_discount_amount =
            if referral_active { remainder.scale_to_dollar(REFERRAL_RATE) } else { Usd::default() };
        let final_total = (remainder - referral_discount_amount).clamped();

        let full_addons = self.addons_price(selection, CommitmentTerm::Monthly);
        let original_rent = if selection.rent_sharing {
            (base_server_price + full_addons).scale_to_dollar(rent_rate)
        } else {
            Usd::default()
        };
        let original_total_for_display = base_server_price + full_addons + original_rent;

        Ok(PriceBreakdown {
            base_server_price,
            discounted_server_price,
            addons_price,
            rent_surcharge,
            code_discount_amount,
            referral_discount_amount,
            final_total,
            original_total_for_display,
        })
    }

    fn validate(&self, selection: &PlanSelection) -> Result<(), PricingError> {
        if selection.commitment_term == CommitmentTerm::Daily {
            return Err(PricingError::TrialOnlyTerm);
        }
        if selection.server_class == ServerClass::Shared && selection.has_addons() {
            return Err(PricingError::AddonsRequireDedicated);
        }
        if selection.stake_packages > PlanSelection::MAX_STAKE_PACKAGES {
            return Err(PricingError::TooManyStakePackages {
                max: PlanSelection::MAX_STAKE_PACKAGES,
                got: selection.stake_packages,
            });
        }
        if selection.server_class == ServerClass::Dedicated {
            if selection.hardware_tier.is_none() {
                return Err(PricingError::MissingHardwareTier);
            }
            if selection.location.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(PricingError::MissingLocation);
            }
        }
        Ok(())
    }

    fn base_price(&self, selection: &PlanSelection) -> Result<Usd, PricingError> {
        match selection.server_class {
            ServerClass::Shared => Ok(self.table.shared_monthly),
            ServerClass::Dedicated => {
                // validate() has already established the tier is present
                let tier = selection.hardware_tier.as_ref().ok_or(PricingError::MissingHardwareTier)?;
                self.table.tier_price(tier).ok_or_else(|| PricingError::UnknownHardwareTier(tier.to_string()))
            },
        }
    }

    /// Add-on charges for the selection at the given term. Stake packages get a small per-package
    /// discount at the 3-month tier only; the commitment discount itself never touches add-ons.
    fn addons_price(&self, selection: &PlanSelection, term: CommitmentTerm) -> Usd {
        let per_package = if term == CommitmentTerm::ThreeMonth {
            self.table.stake_package.scale_to_dollar(1.0 - THREE_MONTH_STAKE_DISCOUNT)
        } else {
            self.table.stake_package
        };
        let mut addons = per_package * i64::from(selection.stake_packages);
        if selection.shreds_addon {
            addons = addons + self.table.shreds_addon;
        }
        addons
    }
}

#[cfg(test)]
mod test {
    use nsg_common::Usd;

    use super::*;
    use crate::db_types::{CommitmentTerm, DiscountScope, DiscountTerm, NewDiscountTerm, PlanSelection};

    fn engine() -> PriceEngine {
        PriceEngine::default()
    }

    fn term(new: NewDiscountTerm) -> DiscountTerm {
        let now = chrono::Utc::now();
        DiscountTerm {
            id: 1,
            code: new.code,
            kind: new.kind,
            value: new.value,
            scope: new.scope,
            expires_at: new.expires_at,
            usage_cap: new.usage_cap,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn shared_monthly_base_case() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let quote = engine().quote(&selection, None, false).unwrap();
        assert_eq!(quote.final_total, Usd::from_dollars(300));
        assert_eq!(quote.original_total_for_display, Usd::from_dollars(300));
        assert_eq!(quote.code_discount_amount, Usd::default());
    }

    #[test]
    fn quoting_is_deterministic() {
        let selection =
            PlanSelection::dedicated(CommitmentTerm::SixMonth, "performance", "ams").with_stake_packages(3).with_shreds();
        let a = engine().quote(&selection, None, true).unwrap();
        let b = engine().quote(&selection, None, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dedicated_three_month_with_stake_packages() {
        let selection = PlanSelection::dedicated(CommitmentTerm::ThreeMonth, "base", "fra").with_stake_packages(2);
        let quote = engine().quote(&selection, None, false).unwrap();
        // round(450 * 0.92) = 414, stake packages at 350 less the 3-month 10% = 315 each
        assert_eq!(quote.discounted_server_price, Usd::from_dollars(414));
        assert_eq!(quote.addons_price, Usd::from_dollars(630));
        assert_eq!(quote.final_total, Usd::from_dollars(1044));
        // the struck-through price carries no discounts at all
        assert_eq!(quote.original_total_for_display, Usd::from_dollars(450 + 700));
    }

    #[test]
    fn addons_immune_to_commitment_discount() {
        let base = PlanSelection::dedicated(CommitmentTerm::Monthly, "base", "fra").with_stake_packages(2).with_shreds();
        let monthly = engine().quote(&base, None, false).unwrap();
        for t in [CommitmentTerm::SixMonth, CommitmentTerm::OneYear] {
            let mut selection = base.clone();
            selection.commitment_term = t;
            let quote = engine().quote(&selection, None, false).unwrap();
            assert_eq!(quote.addons_price, monthly.addons_price, "add-ons changed at term {t}");
        }
    }

    #[test]
    fn flat_code_on_shared_monthly() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let code = term(NewDiscountTerm::flat("WELCOME50", 50, DiscountScope::Both));
        let quote = engine().quote(&selection, Some(&code), false).unwrap();
        assert_eq!(quote.code_discount_amount, Usd::from_dollars(50));
        assert_eq!(quote.final_total, Usd::from_dollars(250));
    }

    #[test]
    fn flat_code_capped_at_discountable_base() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let code = term(NewDiscountTerm::flat("BIGSPENDER", 5000, DiscountScope::Shared));
        let quote = engine().quote(&selection, Some(&code), false).unwrap();
        assert_eq!(quote.code_discount_amount, Usd::from_dollars(300));
        assert_eq!(quote.final_total, Usd::default());
    }

    #[test]
    fn code_never_touches_addons() {
        let selection = PlanSelection::dedicated(CommitmentTerm::Monthly, "base", "fra").with_stake_packages(2);
        let code = term(NewDiscountTerm::percentage("FULL", 100, DiscountScope::Dedicated));
        let quote = engine().quote(&selection, Some(&code), false).unwrap();
        // 100% off the server price, but the stake packages remain fully payable
        assert_eq!(quote.code_discount_amount, Usd::from_dollars(450));
        assert_eq!(quote.final_total, Usd::from_dollars(700));
    }

    #[test]
    fn percentage_code_includes_server_rent_portion() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly).with_rent_sharing();
        let code = term(NewDiscountTerm::percentage("TEN", 10, DiscountScope::Both));
        let quote = engine().quote(&selection, Some(&code), false).unwrap();
        assert_eq!(quote.rent_surcharge, Usd::from_dollars(30));
        // discountable base is 300 + 30 rent attributable to the server price
        assert_eq!(quote.code_discount_amount, Usd::from_dollars(33));
        assert_eq!(quote.final_total, Usd::from_dollars(297));
    }

    #[test]
    fn referral_applies_after_code() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let code = term(NewDiscountTerm::flat("WELCOME50", 50, DiscountScope::Both));
        let quote = engine().quote(&selection, Some(&code), true).unwrap();
        // referral is 10% of the post-code remainder, not of the pre-code total
        assert_eq!(quote.referral_discount_amount, Usd::from_dollars(25));
        assert_eq!(quote.final_total, Usd::from_dollars(225));
    }

    #[test]
    fn code_and_commitment_discount_are_exclusive() {
        let selection = PlanSelection::shared(CommitmentTerm::SixMonth);
        let code = term(NewDiscountTerm::flat("WELCOME50", 50, DiscountScope::Both));
        let err = engine().quote(&selection, Some(&code), false).unwrap_err();
        assert_eq!(err, PricingError::CodeConflictsWithCommitment);
    }

    #[test]
    fn scope_mismatch_is_an_integrity_error() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let code = term(NewDiscountTerm::flat("DEDI50", 50, DiscountScope::Dedicated));
        let err = engine().quote(&selection, Some(&code), false).unwrap_err();
        assert_eq!(err, PricingError::CodeScopeMismatch { required: DiscountScope::Dedicated });
    }

    #[test]
    fn invalid_plan_combinations_rejected() {
        let shared_with_stake = PlanSelection::shared(CommitmentTerm::Monthly).with_stake_packages(1);
        assert_eq!(engine().quote(&shared_with_stake, None, false).unwrap_err(), PricingError::AddonsRequireDedicated);

        let daily = PlanSelection::shared(CommitmentTerm::Daily);
        assert_eq!(engine().quote(&daily, None, false).unwrap_err(), PricingError::TrialOnlyTerm);

        let mut no_location = PlanSelection::dedicated(CommitmentTerm::Monthly, "base", "fra");
        no_location.location = Some("  ".into());
        assert_eq!(engine().quote(&no_location, None, false).unwrap_err(), PricingError::MissingLocation);

        let overstaked =
            PlanSelection::dedicated(CommitmentTerm::Monthly, "base", "fra").with_stake_packages(11);
        assert_eq!(
            engine().quote(&overstaked, None, false).unwrap_err(),
            PricingError::TooManyStakePackages { max: 10, got: 11 }
        );
    }

    #[test]
    fn final_total_never_negative() {
        let selection = PlanSelection::shared(CommitmentTerm::Monthly);
        let code = term(NewDiscountTerm::percentage("EVERYTHING", 100, DiscountScope::Both));
        let quote = engine().quote(&selection, Some(&code), true).unwrap();
        assert_eq!(quote.final_total, Usd::default());
    }
}
