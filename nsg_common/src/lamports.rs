use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const SOL_CURRENCY_CODE: &str = "SOL";
pub const LAMPORTS_PER_SOL: i64 = 1_000_000_000;

//--------------------------------------     Lamports       ----------------------------------------------------------
/// A native-token amount in lamports, the base unit of SOL.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Lamports(i64);

op!(binary Lamports, Add, add);
op!(binary Lamports, Sub, sub);
op!(inplace Lamports, SubAssign, sub_assign);
op!(unary Lamports, Neg, neg);

impl std::ops::Mul<i64> for Lamports {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Lamports {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in lamports: {0}")]
pub struct LamportsConversionError(String);

impl From<i64> for Lamports {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Lamports {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Lamports {}

impl TryFrom<u64> for Lamports {
    type Error = LamportsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(LamportsConversionError(format!("Value {value} is too large to convert to Lamports")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Lamports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 1_000_000 {
            write!(f, "{} lamports", self.0)
        } else {
            let sol = self.0 as f64 / LAMPORTS_PER_SOL as f64;
            write!(f, "{sol:0.9} SOL")
        }
    }
}

impl Lamports {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_sol(sol: i64) -> Self {
        Self(sol * LAMPORTS_PER_SOL)
    }
}
