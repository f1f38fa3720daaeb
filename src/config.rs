//! Run configuration.

use std::time::Duration;

use scraper::Selector;

use crate::error::{CheckError, Result};

/// Default math host selector: MathJax v3 containers, KaTeX output and
/// custom math widgets that keep their output in a shadow root.
pub const DEFAULT_HOSTS: &str = "mjx-container, .katex, math-renderer";

/// Default scope: the whole visible body.
pub const DEFAULT_SCOPE: &str = "body";

/// Which elements become text units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    /// Elements whose only child node is a text node.
    #[default]
    SingleTextChild,
    /// Every element, with its full visible text. Nested elements count again.
    InnerText,
}

/// First index assigned to text units and hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexBase {
    #[default]
    Zero,
    One,
}

impl IndexBase {
    #[must_use]
    pub fn offset(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// How a renderer decides the page has settled.
#[derive(Debug, Clone)]
pub struct SettleConfig {
    /// Fixed delay after every other wait condition is met.
    pub grace: Duration,
    /// Upper bound on each individual wait.
    pub timeout: Duration,
    /// Wait for the network-idle lifecycle event.
    pub wait_for_network_idle: bool,
    /// Await `MathJax.startup.promise` when the page defines it.
    pub await_mathjax: bool,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
            wait_for_network_idle: true,
            await_mathjax: true,
        }
    }
}

/// Configuration of one check run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub scope: String,
    pub hosts: String,
    pub granularity: Granularity,
    pub index_base: IndexBase,
    pub settle: SettleConfig,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            hosts: DEFAULT_HOSTS.to_string(),
            granularity: Granularity::default(),
            index_base: IndexBase::default(),
            settle: SettleConfig::default(),
        }
    }
}

impl CheckConfig {
    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    #[must_use]
    pub fn with_hosts(mut self, hosts: &str) -> Self {
        self.hosts = hosts.to_string();
        self
    }

    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    #[must_use]
    pub fn with_index_base(mut self, base: IndexBase) -> Self {
        self.index_base = base;
        self
    }

    #[must_use]
    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// Checks both selectors parse before anything is launched.
    pub fn validate(&self) -> Result<()> {
        parse_selector(&self.scope)?;
        parse_selector(&self.hosts)?;
        Ok(())
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    if selector.trim().is_empty() {
        return Err(CheckError::InvalidSelector {
            selector: selector.to_string(),
            reason: "empty selector".to_string(),
        });
    }
    Selector::parse(selector).map_err(|e| CheckError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
