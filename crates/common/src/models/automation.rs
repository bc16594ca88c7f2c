//! Automation run configuration

use serde::{Deserialize, Serialize};

/// Operator-supplied settings for one automation run.
///
/// Held by the caller and passed to the scheduler on start; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Articles per day, 0 for no daily cap
    #[serde(default)]
    pub daily_limit: u32,

    /// Articles per hour, 0 drains everything immediately
    #[serde(default)]
    pub hourly_limit: u32,

    #[serde(default, alias = "autoIndexNow")]
    pub auto_index_notify: bool,

    /// Accepted for compatibility, sharing is not performed
    #[serde(default)]
    pub auto_social_share: bool,
}

impl AutomationConfig {
    /// Unbounded configuration, handy for tests and one-off drains
    pub fn unbounded() -> Self {
        Self {
            enabled: true,
            daily_limit: 0,
            hourly_limit: 0,
            auto_index_notify: false,
            auto_social_share: false,
        }
    }

    /// Rate-limited configuration
    pub fn rate_limited(hourly_limit: u32, daily_limit: u32) -> Self {
        Self {
            hourly_limit,
            daily_limit,
            ..Self::unbounded()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.hourly_limit == 0
    }

    /// Keywords allowed per tick, `None` in unbounded mode.
    ///
    /// `min(hourly, daily / 24)`, never below one so a small daily limit
    /// still makes progress.
    pub fn effective_quota(&self) -> Option<usize> {
        if self.is_unbounded() {
            return None;
        }

        let hourly = self.hourly_limit as usize;
        if self.daily_limit == 0 {
            return Some(hourly);
        }

        let daily_share = (self.daily_limit / 24).max(1) as usize;
        Some(hourly.min(daily_share))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_quota() {
        assert_eq!(AutomationConfig::unbounded().effective_quota(), None);
        assert_eq!(AutomationConfig::rate_limited(3, 100).effective_quota(), Some(3));
        assert_eq!(AutomationConfig::rate_limited(10, 48).effective_quota(), Some(2));
        assert_eq!(AutomationConfig::rate_limited(5, 10).effective_quota(), Some(1));
        assert_eq!(AutomationConfig::rate_limited(5, 0).effective_quota(), Some(5));
    }

    #[test]
    fn test_deserializes_admin_payload() {
        let config: AutomationConfig = serde_json::from_str(
            r#"{"enabled":true,"dailyLimit":50,"hourlyLimit":5,"autoIndexNow":true,"autoSocialShare":false}"#,
        )
        .unwrap();

        assert!(config.enabled);
        assert!(config.auto_index_notify);
        assert_eq!(config.effective_quota(), Some(2));
    }
}
