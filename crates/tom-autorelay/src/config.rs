use std::time::Duration;

use crate::error::AutoRelayError;

/// Default number of relays to listen on.
pub const DEFAULT_MAX_LISTENERS: usize = 2;

/// Default upper bound for a single hop probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding [`DEFAULT_MAX_LISTENERS`].
pub const MAX_LISTENERS_ENV: &str = "TOM_AUTORELAY_MAX_LISTENERS";

/// Configuration for a [`RelayCoordinator`](crate::RelayCoordinator).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use std::time::Duration;
/// use tom_autorelay::AutoRelayConfig;
///
/// let config = AutoRelayConfig::new()
///     .max_listeners(3)
///     .probe_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct AutoRelayConfig {
    /// Maximum number of relays to listen on. Zero admits none.
    pub(crate) max_listeners: usize,
    /// Upper bound for one hop capability probe.
    pub(crate) probe_timeout: Duration,
    /// Capacity of the event broadcast channel.
    pub(crate) event_buffer: usize,
}

impl Default for AutoRelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoRelayConfig {
    /// Create a new config with defaults.
    ///
    /// If the `TOM_AUTORELAY_MAX_LISTENERS` environment variable holds a
    /// number it replaces the default. This can be overridden with
    /// [`.max_listeners()`](Self::max_listeners).
    pub fn new() -> Self {
        let max_listeners = std::env::var(MAX_LISTENERS_ENV)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_LISTENERS);

        Self {
            max_listeners,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            event_buffer: 64,
        }
    }

    /// Set the maximum number of relays (default: 2).
    pub fn max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Set the hop probe timeout (default: 10s).
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the event channel capacity (default: 64).
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn get_max_listeners(&self) -> usize {
        self.max_listeners
    }

    pub fn get_probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub(crate) fn validate(&self) -> Result<(), AutoRelayError> {
        if self.probe_timeout.is_zero() {
            return Err(AutoRelayError::Config(
                "probe_timeout must be non-zero".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(AutoRelayError::Config(
                "event_buffer must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides() {
        let config = AutoRelayConfig::new()
            .max_listeners(5)
            .probe_timeout(Duration::from_millis(250))
            .event_buffer(8);
        assert_eq!(config.get_max_listeners(), 5);
        assert_eq!(config.get_probe_timeout(), Duration::from_millis(250));
        assert_eq!(config.event_buffer, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_listeners_is_valid() {
        let config = AutoRelayConfig::new().max_listeners(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = AutoRelayConfig::new().probe_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AutoRelayError::Config(_)));
    }

    #[test]
    fn zero_event_buffer_rejected() {
        let config = AutoRelayConfig::new().event_buffer(0);
        assert!(config.validate().is_err());
    }
}
