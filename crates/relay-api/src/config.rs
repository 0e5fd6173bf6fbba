//! Service configuration from environment variables.

use relay_coordinator::CoordinatorConfig;
use relay_poller::{PollerConfig, TimeoutPolicy};
use std::time::Duration;

const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// How the callback url of a request is chosen when the request names none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRule {
    /// Every request is delivered to the same url.
    Fixed(String),
    /// `https://<host>/api/<credential>/callback`.
    PerCredential { host: String },
}

impl CallbackRule {
    pub fn resolve(&self, credential: &str) -> String {
        match self {
            CallbackRule::Fixed(url) => url.clone(),
            CallbackRule::PerCredential { host } => {
                format!("https://{}/api/{}/callback", host.trim_end_matches('/'), credential)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: String,
    pub coordinator: CoordinatorConfig,
    pub callback_rule: Option<CallbackRule>,
    pub callback_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            coordinator: CoordinatorConfig::default(),
            callback_rule: None,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup. Missing or invalid values keep the default;
    /// invalid ones are logged.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let dp = d.coordinator.poller.clone();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let poller = PollerConfig {
            max_attempts: parsed(&var, "RELAY_MAX_ATTEMPTS", dp.max_attempts, |s| {
                s.trim().parse::<u32>().ok().filter(|n| *n > 0)
            }),
            poll_interval: parsed(
                &var,
                "RELAY_POLL_INTERVAL_SECS",
                dp.poll_interval,
                parse_positive_secs,
            ),
            attempt_timeout: parsed(
                &var,
                "RELAY_ATTEMPT_TIMEOUT_SECS",
                dp.attempt_timeout,
                parse_positive_secs,
            ),
            retry_backoff: parsed(&var, "RELAY_RETRY_BACKOFF_SECS", dp.retry_backoff, parse_secs),
            timeout_policy: parsed(&var, "RELAY_TIMEOUT_POLICY", dp.timeout_policy, |s| {
                s.parse::<TimeoutPolicy>().ok()
            }),
        };
        let include_usage = parsed(&var, "RELAY_INCLUDE_USAGE", d.coordinator.include_usage, parse_bool);

        let callback_rule = match (var("RELAY_CALLBACK_URL"), var("RELAY_CALLBACK_HOST")) {
            (Some(url), _) => Some(CallbackRule::Fixed(url.trim().to_string())),
            (None, Some(host)) => Some(CallbackRule::PerCredential {
                host: host.trim().to_string(),
            }),
            (None, None) => None,
        };

        Self {
            listen: var("RELAY_LISTEN").unwrap_or(d.listen),
            coordinator: CoordinatorConfig {
                poller,
                include_usage,
            },
            callback_rule,
            callback_timeout: parsed(
                &var,
                "RELAY_CALLBACK_TIMEOUT_SECS",
                d.callback_timeout,
                parse_positive_secs,
            ),
        }
    }
}

/// Seconds as a non-negative decimal, e.g. `"0.5"`.
pub fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Like [`parse_secs`] but rejects zero, for intervals and timeouts.
pub fn parse_positive_secs(raw: &str) -> Option<Duration> {
    parse_secs(raw).filter(|d| !d.is_zero())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parsed<T: std::fmt::Debug>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    let Some(raw) = var(name) else {
        return default;
    };
    match parse(&raw) {
        Some(v) => v,
        None => {
            tracing::warn!(var = name, value = %raw, ?default, "invalid value, using default");
            default
        }
    }
}
