//! Staged wallet security
//!
//! As the wallet balance grows, the user is reminded to put stronger
//! safeguards in place:
//!
//! | Stage | Minimum balance | Condition | Recommendation |
//! |-------|-----------------|-----------|----------------|
//! | 1A | 10,000 XTM | seed phrase not verified | verify seed phrase |
//! | 1B | 10,000 XTM | backup disabled | enable backup |
//! | 2 | 100,000 XTM | no backup password | encrypt backup |
//! | 3 | 500,000,000 XTM | - | move funds to cold storage |
//!
//! A prompt is shown at most once every 7 days.

mod policy;

pub use policy::{SecuritySettings, StagedSecurityPolicy};

use crate::models::MicroTari;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINIMUM_STAGE_ONE_BALANCE: MicroTari = MicroTari::from_tari(10_000);
pub const STAGE_TWO_THRESHOLD_BALANCE: MicroTari = MicroTari::from_tari(100_000);
pub const SAFE_HOT_WALLET_BALANCE: MicroTari = MicroTari::from_tari(500_000_000);
/// Not used by the staging rules
#[allow(dead_code)]
pub const MAX_HOT_WALLET_BALANCE: MicroTari = MicroTari::from_tari(1_000_000_000);

/// How long prompts stay suppressed after one was shown
pub const PROMPT_COOLDOWN_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WalletSecurityStage {
    Stage1A,
    Stage1B,
    Stage2,
    Stage3,
}

impl std::fmt::Display for WalletSecurityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletSecurityStage::Stage1A => write!(f, "stage_1a"),
            WalletSecurityStage::Stage1B => write!(f, "stage_1b"),
            WalletSecurityStage::Stage2 => write!(f, "stage_2"),
            WalletSecurityStage::Stage3 => write!(f, "stage_3"),
        }
    }
}

impl std::str::FromStr for WalletSecurityStage {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage_1a" => Ok(WalletSecurityStage::Stage1A),
            "stage_1b" => Ok(WalletSecurityStage::Stage1B),
            "stage_2" => Ok(WalletSecurityStage::Stage2),
            "stage_3" => Ok(WalletSecurityStage::Stage3),
            _ => Err(SecurityError::UnknownStage(s.to_string())),
        }
    }
}

impl WalletSecurityStage {
    /// What the user is asked to do
    pub fn recommendation(&self) -> &'static str {
        match self {
            WalletSecurityStage::Stage1A => "Verify your seed phrase",
            WalletSecurityStage::Stage1B => "Enable wallet backup",
            WalletSecurityStage::Stage2 => "Protect your backup with a password",
            WalletSecurityStage::Stage3 => "Move funds to a cold wallet",
        }
    }
}

/// Outcome of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "stage", rename_all = "snake_case")]
pub enum SecurityDecision {
    NoPopup,
    ShowPopup(WalletSecurityStage),
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Security settings unavailable: {0}")]
    SettingsUnavailable(String),

    #[error("Unknown security stage: {0}")]
    UnknownStage(String),
}

pub type SecurityResult<T> = Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering_and_names() {
        assert!(WalletSecurityStage::Stage1A < WalletSecurityStage::Stage1B);
        assert!(WalletSecurityStage::Stage1B < WalletSecurityStage::Stage2);
        assert!(WalletSecurityStage::Stage2 < WalletSecurityStage::Stage3);

        for stage in [
            WalletSecurityStage::Stage1A,
            WalletSecurityStage::Stage1B,
            WalletSecurityStage::Stage2,
            WalletSecurityStage::Stage3,
        ] {
            assert_eq!(stage.to_string().parse::<WalletSecurityStage>().unwrap(), stage);
        }
        assert!("stage_4".parse::<WalletSecurityStage>().is_err());
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(MINIMUM_STAGE_ONE_BALANCE.as_u64(), 10_000_000_000);
        assert_eq!(STAGE_TWO_THRESHOLD_BALANCE.as_u64(), 100_000_000_000);
        assert_eq!(SAFE_HOT_WALLET_BALANCE.as_u64(), 500_000_000_000_000);
        assert!(MAX_HOT_WALLET_BALANCE > SAFE_HOT_WALLET_BALANCE);
    }
}
