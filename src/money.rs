//! Fixed-point currency.
//!
//! Amounts are stored as an integer count of minor units (kobo), so repeated
//! splits never accumulate floating-point drift.

use std::fmt;
use std::ops::{Neg, Sub};

const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor_units: i64) -> Money {
        Money(minor_units)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Sum of `amounts`, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }

    /// Split the amount according to `percentages`, which must sum to 100.
    ///
    /// Every share first receives `floor(amount * percentage / 100)`. The
    /// residual left by the floors is then handed out one minor unit at a time
    /// to the shares with the largest fractional remainder; ties go to the
    /// share that comes first. The result always sums to `self`.
    ///
    /// Returns `None` when the percentages do not sum to 100.
    pub fn split_by_percentages(self, percentages: &[u32]) -> Option<Vec<Money>> {
        let total_percentage: u64 = percentages.iter().map(|&p| p as u64).sum();
        if total_percentage != 100 {
            return None;
        }

        // The floor/remainder scheme is defined on magnitudes, so negative
        // amounts are split by absolute value and the sign is put back.
        let sign: i128 = if self.0 < 0 { -1 } else { 1 };
        let magnitude = (self.0 as i128).abs();

        let mut shares = Vec::with_capacity(percentages.len());
        let mut remainders = Vec::with_capacity(percentages.len());
        for &percentage in percentages {
            let scaled = magnitude * percentage as i128;
            shares.push(scaled / 100);
            remainders.push(scaled % 100);
        }

        let allocated: i128 = shares.iter().sum();
        let residual = magnitude - allocated;

        // Stable sort keeps insertion order among equal remainders.
        let mut order: Vec<usize> = (0..percentages.len()).collect();
        order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]));
        for &index in order.iter().take(residual as usize) {
            shares[index] += 1;
        }

        Some(
            shares
                .into_iter()
                .map(|share| Money((share * sign) as i64))
                .collect(),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR as u64;
        write!(
            f,
            "{}{}.{:02}",
            sign,
            magnitude / per_major,
            magnitude % per_major
        )
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}
