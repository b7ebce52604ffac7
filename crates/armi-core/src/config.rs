//! Runtime configuration recognised by a context.
//!
//! A typed builder struct over a stringly-typed options map: `Duration`-typed timeout fields
//! at the public API, not raw milliseconds. `default_timeout`/`transient_timeout` are read by
//! [`crate::client::ClientContext::call`] directly; `framing` is read by whatever transport
//! adapter wires a context up (armi-transport's byte-stream adapters always need it, its
//! channel-based in-process adapter does not).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Enable the length-prefix framer beneath the transport. Most adapters require this.
    pub framing: bool,
    /// Applied to a call when the caller does not set a per-call timeout. Zero means unbounded.
    pub default_timeout: Duration,
    /// Consumed by the next request only, then reset; overrides `default_timeout` once.
    pub transient_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            framing: true,
            default_timeout: Duration::ZERO,
            transient_timeout: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolves the timeout to apply to the next call, consuming any transient override.
    pub fn take_effective_timeout(&mut self) -> Option<Duration> {
        if let Some(transient) = self.transient_timeout.take() {
            return Some(transient);
        }
        if self.default_timeout.is_zero() {
            None
        } else {
            Some(self.default_timeout)
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    framing: Option<bool>,
    default_timeout: Option<Duration>,
    transient_timeout: Option<Duration>,
}

impl ConfigBuilder {
    pub fn framing(mut self, framing: bool) -> Self {
        self.framing = Some(framing);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn transient_timeout(mut self, timeout: Duration) -> Self {
        self.transient_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            framing: self.framing.unwrap_or(defaults.framing),
            default_timeout: self.default_timeout.unwrap_or(defaults.default_timeout),
            transient_timeout: self.transient_timeout,
        }
    }
}
