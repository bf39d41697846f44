//! Shared wallet data types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Amount in micro units (1 coin = 1,000,000 µT)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MicroTari(pub u64);

impl MicroTari {
    /// Micro units per whole coin
    pub const PRECISION: u64 = 1_000_000;

    /// Amount of whole coins, in micro units
    pub const fn from_tari(tari: u64) -> Self {
        Self(tari * Self::PRECISION)
    }

    #[cfg(test)]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Whole-coin value, for display
    pub fn to_tari(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(Self::PRECISION)
    }
}

impl std::fmt::Display for MicroTari {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} XTM", self.to_tari().normalize())
    }
}

/// Wallet balance as reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Spendable balance
    pub available: MicroTari,
    #[serde(default)]
    pub pending_incoming: MicroTari,
    #[serde(default)]
    pub pending_outgoing: MicroTari,
    #[serde(default)]
    pub time_locked: MicroTari,
}

impl BalanceInfo {
    pub fn available(available: MicroTari) -> Self {
        Self {
            available,
            ..Default::default()
        }
    }
}
