//! Facade configuration loaded from TOML.
//!
//! A [`CameraConfig`] captures the per-session defaults an application would
//! otherwise set imperatively: the default command timeout and the reusable
//! decorator chain. Durations use humantime notation (`"250ms"`, `"2s"`).
//!
//! ```toml
//! default-timeout = "2s"
//! audit-label = "studio-rig"
//!
//! [retry]
//! attempts = 3
//! delay = "50ms"
//! ```

use crate::command::decorator::{ReusableChain, RetryPolicy};
use crate::error::{CamError, CamResult};
use serde::Deserialize;
use std::time::Duration;

/// Per-session defaults for a [`Camera`](crate::Camera) facade.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CameraConfig {
    /// Timeout injected into commands that carry none.
    #[serde(default, with = "humantime_serde")]
    pub default_timeout: Option<Duration>,

    /// Retry step of the reusable chain.
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    /// Audit step of the reusable chain: execution start/finish are logged
    /// under this label.
    #[serde(default)]
    pub audit_label: Option<String>,
}

/// Retry configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetryConfig {
    /// Total tries, including the first.
    pub attempts: u32,

    /// Pause between tries.
    #[serde(default, with = "humantime_serde")]
    pub delay: Duration,
}

impl CameraConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `Composition` when the text is not valid configuration.
    pub fn from_toml_str(text: &str) -> CamResult<Self> {
        toml::from_str(text).map_err(|err| CamError::Composition(format!("invalid config: {err}")))
    }

    /// Builds the reusable decorator chain this configuration describes,
    /// or `None` when no decoration is configured.
    ///
    /// Steps are registered in a fixed order (retry, then audit) so the
    /// same configuration always produces the same chain.
    pub fn reusable_chain(&self) -> CamResult<Option<ReusableChain>> {
        if self.retry.is_none() && self.audit_label.is_none() {
            return Ok(None);
        }
        let mut builder = ReusableChain::builder();
        if let Some(retry) = &self.retry {
            builder = builder.retry(RetryPolicy::new(retry.attempts, retry.delay)?);
        }
        if let Some(label) = &self.audit_label {
            builder = builder.audit(label.clone());
        }
        Ok(Some(builder.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = CameraConfig::from_toml_str(
            r#"
            default-timeout = "2s"
            audit-label = "studio-rig"

            [retry]
            attempts = 3
            delay = "50ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.audit_label.as_deref(), Some("studio-rig"));
        let retry = config.retry.as_ref().unwrap();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay, Duration::from_millis(50));

        let chain = config.reusable_chain().unwrap().unwrap();
        assert_eq!(chain.steps().len(), 2);
    }

    #[test]
    fn empty_config_builds_no_chain() {
        let config = CameraConfig::from_toml_str("").unwrap();
        assert_eq!(config, CameraConfig::default());
        assert!(config.reusable_chain().unwrap().is_none());
    }

    #[test]
    fn zero_attempt_retry_fails_chain_construction() {
        let config = CameraConfig::from_toml_str(
            r#"
            [retry]
            attempts = 0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.reusable_chain(),
            Err(CamError::Composition(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CameraConfig::from_toml_str("shutter-count = 9").is_err());
    }
}
