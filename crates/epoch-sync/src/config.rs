//! # Synchronizer Configuration
//!
//! Configuration for the epoch synchronizer. Loading it (file, env, flags) is
//! the embedding application's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{
    SyncError, DEFAULT_SLOTS_PER_EPOCH, DEFAULT_SYNC_EPOCH_COOLDOWN_SECS, RETRY_DELAY_SECS,
};

/// Epoch synchronizer configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Slots per epoch of the synchronized chain.
    pub slots_per_epoch: u64,

    /// Pause between two epochs, in seconds. Gives the finalized head time
    /// to advance; 0 only polls the stop signal.
    pub sync_epoch_cooldown_secs: u64,

    /// Delay before retrying a failed epoch, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            sync_epoch_cooldown_secs: DEFAULT_SYNC_EPOCH_COOLDOWN_SECS,
            retry_delay_secs: RETRY_DELAY_SECS,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (8-slot epochs, no cooldown).
    pub fn for_testing() -> Self {
        Self {
            slots_per_epoch: 8,
            sync_epoch_cooldown_secs: 0,
            retry_delay_secs: RETRY_DELAY_SECS,
        }
    }

    /// Inter-epoch cooldown.
    pub fn sync_epoch_cooldown(&self) -> Duration {
        Duration::from_secs(self.sync_epoch_cooldown_secs)
    }

    /// Failure backoff.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Reject configurations the slot arithmetic cannot work with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.slots_per_epoch == 0 {
            return Err(SyncError::InvalidConfig(
                "slots_per_epoch must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.slots_per_epoch, 32);
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = SyncConfig::for_testing();
        assert_eq!(config.slots_per_epoch, 8);
        assert!(config.sync_epoch_cooldown().is_zero());
    }

    #[test]
    fn test_zero_slots_rejected() {
        let config = SyncConfig {
            slots_per_epoch: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_deserializes() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"slots_per_epoch":32,"sync_epoch_cooldown_secs":2,"retry_delay_secs":10}"#,
        )
        .unwrap();
        assert_eq!(config.sync_epoch_cooldown(), Duration::from_secs(2));
    }
}
