//! Staged security prompt policy

use super::{
    SecurityDecision, SecurityError, SecurityResult, WalletSecurityStage,
    MINIMUM_STAGE_ONE_BALANCE, PROMPT_COOLDOWN_DAYS, SAFE_HOT_WALLET_BALANCE,
    STAGE_TWO_THRESHOLD_BALANCE,
};
use crate::db::Database;
use crate::models::BalanceInfo;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Persisted user security posture consulted by the policy
#[async_trait]
pub trait SecuritySettings: Send + Sync {
    async fn has_verified_seed_phrase(&self) -> anyhow::Result<bool>;

    async fn is_backup_enabled(&self) -> anyhow::Result<bool>;

    async fn is_backup_password_set(&self) -> anyhow::Result<bool>;

    /// Prompts are suppressed until this point in time
    async fn cooldown_until(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Store the new cooldown after `stage` was shown
    async fn record_prompt(
        &self,
        stage: WalletSecurityStage,
        cooldown_until: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl SecuritySettings for Database {
    async fn has_verified_seed_phrase(&self) -> anyhow::Result<bool> {
        self.has_verified_seed_words().await
    }

    async fn is_backup_enabled(&self) -> anyhow::Result<bool> {
        Database::is_backup_enabled(self).await
    }

    async fn is_backup_password_set(&self) -> anyhow::Result<bool> {
        Database::is_backup_password_set(self).await
    }

    async fn cooldown_until(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.get_security_cooldown().await
    }

    async fn record_prompt(
        &self,
        stage: WalletSecurityStage,
        cooldown_until: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.set_security_cooldown(cooldown_until).await?;
        self.set_last_prompted_stage(&stage.to_string()).await
    }
}

fn unavailable(e: anyhow::Error) -> SecurityError {
    SecurityError::SettingsUnavailable(e.to_string())
}

/// Decides whether a balance change should trigger a security prompt
pub struct StagedSecurityPolicy<S: SecuritySettings> {
    settings: S,
    /// Stage 3 (cold wallet) prompts are shown only when enabled
    cold_wallet_stage_enabled: bool,
    /// Serializes the cooldown read-modify-write
    decision_lock: Mutex<()>,
}

impl<S: SecuritySettings> StagedSecurityPolicy<S> {
    pub fn new(settings: S, cold_wallet_stage_enabled: bool) -> Self {
        Self {
            settings,
            cold_wallet_stage_enabled,
            decision_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Evaluate a balance change against the current time
    pub async fn handle_balance_change(
        &self,
        balance: &BalanceInfo,
    ) -> SecurityResult<SecurityDecision> {
        self.handle_balance_change_at(balance, Utc::now()).await
    }

    /// Evaluate a balance change at `now`.
    ///
    /// The cooldown is only written when a prompt is actually shown.
    pub async fn handle_balance_change_at(
        &self,
        balance: &BalanceInfo,
        now: DateTime<Utc>,
    ) -> SecurityResult<SecurityDecision> {
        let _guard = self.decision_lock.lock().await;

        let Some(stage) = self.select_stage(balance).await? else {
            return Ok(SecurityDecision::NoPopup);
        };

        if stage == WalletSecurityStage::Stage3 && !self.cold_wallet_stage_enabled {
            debug!(%stage, "Cold wallet stage disabled, prompt suppressed");
            return Ok(SecurityDecision::NoPopup);
        }

        if let Some(until) = self.settings.cooldown_until().await.map_err(unavailable)? {
            if until > now {
                debug!(%stage, cooldown_until = %until, "Security prompt in cooldown");
                return Ok(SecurityDecision::NoPopup);
            }
        }

        let cooldown_until = now + Duration::days(PROMPT_COOLDOWN_DAYS);
        self.settings
            .record_prompt(stage, cooldown_until)
            .await
            .map_err(unavailable)?;

        info!(
            %stage,
            balance = %balance.available,
            cooldown_until = %cooldown_until,
            "Security prompt due"
        );

        Ok(SecurityDecision::ShowPopup(stage))
    }

    /// First matching stage wins; settings are only read when the balance
    /// reaches the stage's threshold.
    async fn select_stage(
        &self,
        balance: &BalanceInfo,
    ) -> SecurityResult<Option<WalletSecurityStage>> {
        let available = balance.available;

        if available >= MINIMUM_STAGE_ONE_BALANCE {
            if !self.settings.has_verified_seed_phrase().await.map_err(unavailable)? {
                return Ok(Some(WalletSecurityStage::Stage1A));
            }
            if !self.settings.is_backup_enabled().await.map_err(unavailable)? {
                return Ok(Some(WalletSecurityStage::Stage1B));
            }
        }

        if available >= STAGE_TWO_THRESHOLD_BALANCE
            && !self.settings.is_backup_password_set().await.map_err(unavailable)?
        {
            return Ok(Some(WalletSecurityStage::Stage2));
        }

        if available >= SAFE_HOT_WALLET_BALANCE {
            return Ok(Some(WalletSecurityStage::Stage3));
        }

        Ok(None)
    }
}
