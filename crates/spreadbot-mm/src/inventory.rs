//! Inventory skew from account balances.
//!
//! Skew measures how far the base asset's share of portfolio value sits
//! from the target share, normalized by `max_skew` and bounded to [-1, 1].
//! Positive = holding more base than targeted.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use spreadbot_core::Price;

use crate::config::StrategyConfig;
use crate::indicators::INDICATOR_DP;

/// Computes inventory skew for a single pair.
#[derive(Debug, Clone)]
pub struct InventoryModel {
    /// Target share of portfolio value held in base (0.0 – 1.0).
    target_base_pct: Decimal,
    /// Deviation from target that maps to |skew| = 1. Always > 0.
    max_skew: Decimal,
}

impl InventoryModel {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            target_base_pct: config.target_base_pct,
            max_skew: config.max_skew,
        }
    }

    /// Inventory skew in [-1, 1], rounded to 4 dp.
    ///
    /// Returns 0 when the portfolio has no value.
    pub fn skew(&self, base_balance: Decimal, quote_balance: Decimal, mid_price: Price) -> Decimal {
        let Some(current_ratio) = base_share(base_balance, quote_balance, mid_price.inner()) else {
            return Decimal::ZERO;
        };

        let deviation = current_ratio - self.target_base_pct;
        let raw = match deviation.checked_div(self.max_skew) {
            Some(raw) => raw,
            None if deviation.is_sign_negative() => dec!(-1),
            None => dec!(1),
        };

        raw.max(dec!(-1)).min(dec!(1)).round_dp(INDICATOR_DP)
    }
}

/// Base share of portfolio value in [0, 1], `None` when the portfolio is empty.
///
/// Values beyond the `Decimal` range are compared in `f64`.
fn base_share(base_balance: Decimal, quote_balance: Decimal, mid: Decimal) -> Option<Decimal> {
    let exact = base_balance
        .checked_mul(mid)
        .and_then(|base_value| Some((base_value, base_value.checked_add(quote_balance)?)));

    match exact {
        Some((_, total)) if total.is_zero() => None,
        Some((base_value, total)) => base_value.checked_div(total),
        None => {
            let base_value = base_balance.to_f64()? * mid.to_f64()?;
            let total = base_value + quote_balance.to_f64()?;
            warn!(
                base_balance = %base_balance,
                quote_balance = %quote_balance,
                mid = %mid,
                "Portfolio value exceeds decimal range, computing skew in f64"
            );
            if !(total.is_finite() && total > 0.0) {
                return None;
            }
            Decimal::from_f64(base_value / total)
        }
    }
}
