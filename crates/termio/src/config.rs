// SPDX-License-Identifier: MIT
//
// Driver configuration.
//
// Two knobs: how long the resize poller sleeps between size queries, and
// which device node backs the terminal streams on Unix. Both have sane
// defaults and can be overridden from the environment. A malformed value is
// logged and ignored rather than failing startup.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding [`DriverConfig::resize_interval`], in
/// milliseconds.
pub const RESIZE_INTERVAL_VAR: &str = "TERMIO_RESIZE_INTERVAL_MS";

/// Environment variable overriding [`DriverConfig::terminal_device`].
pub const TERMINAL_DEVICE_VAR: &str = "TERMIO_TTY";

/// Timing and device configuration for a [`Driver`](crate::Driver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Debounce interval of the resize poller. Default: 100 ms.
    pub resize_interval: Duration,

    /// Controlling terminal device opened for the terminal streams on Unix.
    /// Ignored on Windows, which always uses `CONIN$`/`CONOUT$`.
    /// Default: `/dev/tty`.
    pub terminal_device: PathBuf,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            resize_interval: Duration::from_millis(100),
            terminal_device: PathBuf::from("/dev/tty"),
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by `TERMIO_RESIZE_INTERVAL_MS` and `TERMIO_TTY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(RESIZE_INTERVAL_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.resize_interval = Duration::from_millis(ms),
                _ => tracing::warn!(
                    var = RESIZE_INTERVAL_VAR,
                    value = %raw,
                    "ignoring invalid resize interval"
                ),
            }
        }

        if let Some(raw) = lookup(TERMINAL_DEVICE_VAR) {
            if raw.trim().is_empty() {
                tracing::warn!(var = TERMINAL_DEVICE_VAR, "ignoring empty terminal device");
            } else {
                config.terminal_device = PathBuf::from(raw);
            }
        }

        config
    }

    /// Replace the resize debounce interval.
    #[must_use]
    pub fn with_resize_interval(mut self, interval: Duration) -> Self {
        self.resize_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.resize_interval, Duration::from_millis(100));
        assert_eq!(config.terminal_device, PathBuf::from("/dev/tty"));
    }

    #[test]
    fn nothing_set_is_default() {
        assert_eq!(DriverConfig::from_lookup(lookup(&[])), DriverConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = DriverConfig::from_lookup(lookup(&[
            (RESIZE_INTERVAL_VAR, "250"),
            (TERMINAL_DEVICE_VAR, "/dev/pts/7"),
        ]));
        assert_eq!(config.resize_interval, Duration::from_millis(250));
        assert_eq!(config.terminal_device, PathBuf::from("/dev/pts/7"));
    }

    #[test_case("0" ; "zero")]
    #[test_case("-5" ; "negative")]
    #[test_case("fast" ; "not a number")]
    #[test_case("" ; "empty")]
    fn bad_interval_falls_back(value: &str) {
        let config = DriverConfig::from_lookup(lookup(&[(RESIZE_INTERVAL_VAR, value)]));
        assert_eq!(config.resize_interval, Duration::from_millis(100));
    }

    #[test]
    fn blank_device_falls_back() {
        let config = DriverConfig::from_lookup(lookup(&[(TERMINAL_DEVICE_VAR, "  ")]));
        assert_eq!(config.terminal_device, PathBuf::from("/dev/tty"));
    }

    #[test]
    fn builder_sets_interval() {
        let config = DriverConfig::default().with_resize_interval(Duration::from_millis(5));
        assert_eq!(config.resize_interval, Duration::from_millis(5));
    }
}
