//! Platform configuration, loaded from `{data_dir}/config.toml`.
//!
//! Every field has a default so a missing or partial file still yields a
//! usable configuration.

use serde::{Deserialize, Serialize};

/// Tunable policy parameters for the scheduling and messaging core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Minimum lead time (hours) under which a confirmed appointment can no
    /// longer be cancelled without the coach forcing it.
    pub cancellation_cutoff_hours: i64,

    /// Fixed length of a bookable slot.
    pub slot_duration_minutes: u32,

    /// Upper bound on message text length, in characters.
    pub max_message_chars: usize,

    /// Sync reconciler compensation poll interval, in seconds.
    pub poll_interval_secs: u64,

    /// Whether a participant who self-cancelled inside the cutoff window may
    /// immediately book again.
    pub allow_rebook_after_late_cancel: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            cancellation_cutoff_hours: 24,
            slot_duration_minutes: 120,
            max_message_chars: 2000,
            poll_interval_secs: 5,
            allow_rebook_after_late_cancel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.cancellation_cutoff_hours, 24);
        assert_eq!(config.slot_duration_minutes, 120);
        assert_eq!(config.max_message_chars, 2000);
        assert_eq!(config.poll_interval_secs, 5);
        assert!(config.allow_rebook_after_late_cancel);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: PlatformConfig =
            toml::from_str("cancellation_cutoff_hours = 48").unwrap();
        assert_eq!(config.cancellation_cutoff_hours, 48);
        assert_eq!(config.slot_duration_minutes, 120);
        assert!(config.allow_rebook_after_late_cancel);
    }

    #[test]
    fn test_full_toml_roundtrip() {
        let config = PlatformConfig {
            cancellation_cutoff_hours: 12,
            slot_duration_minutes: 60,
            max_message_chars: 500,
            poll_interval_secs: 3,
            allow_rebook_after_late_cancel: false,
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: PlatformConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.slot_duration_minutes, 60);
        assert!(!parsed.allow_rebook_after_late_cancel);
    }
}
