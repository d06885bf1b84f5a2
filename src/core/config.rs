use std::time::Duration;

/// Reconnection and heartbeat policy for a link monitor.
///
/// Immutable until reconfigured through [`LinkConfigPatch`]; a live change
/// never affects an in-flight probe or a pending backoff timer, though a
/// changed heartbeat interval restarts the ticker immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// Cap on consecutive reconnect attempts before giving up.
    pub max_retries: u32,
    /// Backoff lower bound for the first reconnect attempt.
    pub base_delay: Duration,
    /// Backoff upper bound.
    pub max_delay: Duration,
    /// Interval between health probes while connected.
    pub heartbeat_interval: Duration,
    /// Per-probe deadline.
    pub probe_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl LinkConfig {
    /// Enforce `0 < base_delay <= max_delay` rather than erroring: callers
    /// select policy per deployment and a silently-widened bound beats a
    /// dead monitor.
    pub fn sanitized(mut self) -> Self {
        if self.base_delay.is_zero() {
            self.base_delay = Duration::from_millis(1);
        }
        if self.max_delay < self.base_delay {
            self.max_delay = self.base_delay;
        }
        self
    }

    /// Merge a partial update; unspecified fields retain previous values.
    pub fn patched(self, patch: LinkConfigPatch) -> Self {
        Self {
            max_retries: patch.max_retries.unwrap_or(self.max_retries),
            base_delay: patch.base_delay.unwrap_or(self.base_delay),
            max_delay: patch.max_delay.unwrap_or(self.max_delay),
            heartbeat_interval: patch.heartbeat_interval.unwrap_or(self.heartbeat_interval),
            probe_timeout: patch.probe_timeout.unwrap_or(self.probe_timeout),
        }
        .sanitized()
    }
}

/// Partial [`LinkConfig`] accepted by `configure`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkConfigPatch {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub heartbeat_interval: Option<Duration>,
    pub probe_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_retains_unspecified_fields() {
        let config = LinkConfig::default();
        let patched = config.patched(LinkConfigPatch {
            heartbeat_interval: Some(Duration::from_secs(10)),
            ..Default::default()
        });

        assert_eq!(patched.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(patched.max_retries, config.max_retries);
        assert_eq!(patched.base_delay, config.base_delay);
        assert_eq!(patched.max_delay, config.max_delay);
        assert_eq!(patched.probe_timeout, config.probe_timeout);
    }

    #[test]
    fn sanitize_enforces_backoff_bounds() {
        let config = LinkConfig {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        }
        .sanitized();

        assert!(config.base_delay > Duration::ZERO);
        assert!(config.max_delay >= config.base_delay);

        let inverted = LinkConfig::default().patched(LinkConfigPatch {
            max_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        assert_eq!(inverted.max_delay, inverted.base_delay);
    }
}
