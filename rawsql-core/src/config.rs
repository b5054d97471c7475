//! Configuration types

use crate::error::{ConfigError, RawSqlResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether query results are recorded in the session's change tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingBehavior {
    /// Results are identity-resolved and tracked.
    #[default]
    TrackAll,
    /// Results bypass the change tracker.
    NoTracking,
}

impl TrackingBehavior {
    pub fn is_tracking(&self) -> bool {
        matches!(self, Self::TrackAll)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "track_all" | "trackall" => Some(Self::TrackAll),
            "no_tracking" | "notracking" => Some(Self::NoTracking),
            _ => None,
        }
    }
}

/// Master configuration for a database handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSqlConfig {
    /// Maximum number of compiled shapes kept before LRU eviction.
    pub shape_cache_capacity: usize,
    /// Age after which a compiled shape is recompiled.
    pub shape_cache_ttl: Duration,
    /// Tracking applied when a query composes neither tracking directive.
    pub default_tracking: TrackingBehavior,
    /// Log parameter values instead of fingerprint digests.
    pub sensitive_data_logging: bool,
}

impl Default for RawSqlConfig {
    fn default() -> Self {
        Self {
            shape_cache_capacity: 10_000,
            shape_cache_ttl: Duration::from_secs(24 * 3600),
            default_tracking: TrackingBehavior::TrackAll,
            sensitive_data_logging: false,
        }
    }
}

impl RawSqlConfig {
    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(RawSqlError::Config) if invalid.
    pub fn validate(&self) -> RawSqlResult<()> {
        if self.shape_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "shape_cache_capacity".to_string(),
                value: self.shape_cache_capacity.to_string(),
                reason: "shape_cache_capacity must be greater than 0".to_string(),
            }
            .into());
        }

        if self.shape_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "shape_cache_ttl".to_string(),
                value: format!("{:?}", self.shape_cache_ttl),
                reason: "shape_cache_ttl must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `RAWSQL_SHAPE_CACHE_CAPACITY`: maximum cached shapes (default: 10000)
    /// - `RAWSQL_SHAPE_CACHE_TTL_SECS`: shape lifetime in seconds (default: 86400)
    /// - `RAWSQL_DEFAULT_TRACKING`: `track_all` or `no_tracking` (default: track_all)
    /// - `RAWSQL_SENSITIVE_DATA_LOGGING`: `true`/`1` to log parameter values
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            shape_cache_capacity: std::env::var("RAWSQL_SHAPE_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.shape_cache_capacity),
            shape_cache_ttl: std::env::var("RAWSQL_SHAPE_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shape_cache_ttl),
            default_tracking: std::env::var("RAWSQL_DEFAULT_TRACKING")
                .ok()
                .and_then(|s| TrackingBehavior::parse(&s))
                .unwrap_or(defaults.default_tracking),
            sensitive_data_logging: std::env::var("RAWSQL_SENSITIVE_DATA_LOGGING")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.sensitive_data_logging),
        }
    }

    pub fn with_default_tracking(mut self, tracking: TrackingBehavior) -> Self {
        self.default_tracking = tracking;
        self
    }

    pub fn with_shape_cache_capacity(mut self, capacity: usize) -> Self {
        self.shape_cache_capacity = capacity;
        self
    }

    pub fn with_shape_cache_ttl(mut self, ttl: Duration) -> Self {
        self.shape_cache_ttl = ttl;
        self
    }

    pub fn with_sensitive_data_logging(mut self, enabled: bool) -> Self {
        self.sensitive_data_logging = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawSqlError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RawSqlConfig::default().validate().is_ok());
        assert_eq!(RawSqlConfig::default().default_tracking, TrackingBehavior::TrackAll);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = RawSqlConfig::default()
            .with_shape_cache_capacity(0)
            .validate()
            .unwrap_err();
        match err {
            RawSqlError::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "shape_cache_capacity");
            }
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = RawSqlConfig::default().with_shape_cache_ttl(Duration::ZERO);
        assert!(matches!(config.validate(), Err(RawSqlError::Config(_))));
    }

    #[test]
    fn test_tracking_behavior_parse() {
        assert_eq!(TrackingBehavior::parse("no_tracking"), Some(TrackingBehavior::NoTracking));
        assert_eq!(TrackingBehavior::parse(" TrackAll "), Some(TrackingBehavior::TrackAll));
        assert_eq!(TrackingBehavior::parse("sometimes"), None);
    }

    #[test]
    fn test_config_serde_roundtrip_uses_snake_case_tracking() {
        let config = RawSqlConfig::default().with_default_tracking(TrackingBehavior::NoTracking);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"no_tracking\""));
        let back: RawSqlConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
