use std::time::Duration;
use thiserror::Error;

/// Configuration for a [`crate::Replicator`].
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    pub node_id: String,
    pub refresh_interval: Duration,
    /// Hard staleness bound: the periodic tick fetches when the register's
    /// value is older than this.
    pub fresh_enough_threshold: Duration,
    /// Soft staleness band: a request finding the cache this old (but still
    /// within `fresh_enough_threshold`) is answered from cache and triggers
    /// a fire-and-forget background refresh.
    pub background_refresh_threshold: Duration,
}

/// Raised when a [`ReplicatorConfig`] fails validation at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `background_refresh_threshold` must be strictly less than
    /// `fresh_enough_threshold`, or the soft-refresh band
    /// `(background_refresh_threshold, fresh_enough_threshold]` is empty
    /// and proactive refresh can never fire.
    #[error(
        "background_refresh_threshold ({background:?}) must be < fresh_enough_threshold ({fresh_enough:?})"
    )]
    BackgroundThresholdNotBelowFreshEnough {
        background: Duration,
        fresh_enough: Duration,
    },
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.background_refresh_threshold >= self.fresh_enough_threshold {
            return Err(ConfigError::BackgroundThresholdNotBelowFreshEnough {
                background: self.background_refresh_threshold,
                fresh_enough: self.fresh_enough_threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_background_threshold_not_below_fresh_enough() {
        let config = ReplicatorConfig {
            node_id: "node-a".into(),
            refresh_interval: Duration::from_secs(30),
            fresh_enough_threshold: Duration::from_secs(10),
            background_refresh_threshold: Duration::from_secs(10),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_background_threshold_below_fresh_enough() {
        let config = ReplicatorConfig {
            node_id: "node-a".into(),
            refresh_interval: Duration::from_secs(30),
            fresh_enough_threshold: Duration::from_secs(10),
            background_refresh_threshold: Duration::from_secs(5),
        };
        assert!(config.validate().is_ok());
    }
}
