use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "USD";

//--------------------------------------        Usd        -----------------------------------------------------------
/// A USD amount in integer cents.
///
/// All storefront prices are quoted in whole dollars, but discounts and surcharges are derived by
/// fractional scaling, so cents are kept as the base unit. Scaling helpers round to whole dollars,
/// which is the granularity every price computation works at.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Usd(i64);

op!(binary Usd, Add, add);
op!(binary Usd, Sub, sub);
op!(inplace Usd, SubAssign, sub_assign);
op!(unary Usd, Neg, neg);

impl std::ops::Mul<i64> for Usd {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in USD cents: {0}")]
pub struct UsdConversionError(String);

impl From<i64> for Usd {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<u64> for Usd {
    type Error = UsdConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(UsdConversionError(format!("Value {value} is too large to convert to Usd")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl PartialEq for Usd {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Usd {}

impl Display for Usd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "${}", self.0 / 100)
        } else {
            write!(f, "${:0.2}", self.0 as f64 / 100.0)
        }
    }
}

impl Usd {
    /// The amount in cents.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Scales the amount by `rate`, rounding to the nearest whole dollar.
    pub fn scale_to_dollar(&self, rate: f64) -> Self {
        let dollars = (self.0 as f64 / 100.0 * rate).round() as i64;
        Self(dollars * 100)
    }

    /// Takes `percentage` percent of the amount, rounded to the nearest whole dollar.
    pub fn percent_to_dollar(&self, percentage: i64) -> Self {
        self.scale_to_dollar(percentage as f64 / 100.0)
    }

    /// Clamps negative residues to zero. Totals are never allowed to go negative.
    pub fn clamped(self) -> Self {
        Self(self.0.max(0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}
