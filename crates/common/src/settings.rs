//! Runtime settings.
//!
//! Every value has a default and can be overridden through environment
//! variables. Invalid overrides are logged and ignored.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::retry::RetryPolicy;

const MERGE_PREFIX_VAR: &str = "ORDER_MERGE_PREFIX";
const SWITCH_RETRIES_VAR: &str = "ORDER_SWITCH_RETRIES";
const SWITCH_RETRY_DELAY_VAR: &str = "ORDER_SWITCH_RETRY_DELAY_MS";
const EXECUTOR_THREADS_VAR: &str = "ORDER_EXECUTOR_THREADS";
const EVENT_CAPACITY_VAR: &str = "ORDER_EVENT_CAPACITY";

/// Error parsing a setting override.
#[derive(Debug, Clone, Error)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ParseSettingError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Settings shared by the order engine and the position switcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Label prefix for orders produced by position merges.
    pub merge_label_prefix: String,
    /// Retry policy wrapped around a whole switch or close sequence.
    pub switch_retry: RetryPolicy,
    /// Maximum number of executor calls running at once.
    pub executor_threads: usize,
    /// Buffer size of the multicast order event stream.
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            merge_label_prefix: "MergedPosition_".to_string(),
            switch_retry: RetryPolicy::fixed(3, Duration::from_millis(1500)),
            executor_threads: 4,
            event_capacity: 1024,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let merge_label_prefix = lookup(MERGE_PREFIX_VAR)
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or(defaults.merge_label_prefix);

        let retries = override_or(&lookup, SWITCH_RETRIES_VAR, defaults.switch_retry.retries());
        let delay_ms = override_or(
            &lookup,
            SWITCH_RETRY_DELAY_VAR,
            defaults.switch_retry.delay_for(0).as_millis() as u64,
        );

        let executor_threads =
            override_or(&lookup, EXECUTOR_THREADS_VAR, defaults.executor_threads).max(1);
        let event_capacity =
            override_or(&lookup, EVENT_CAPACITY_VAR, defaults.event_capacity).max(1);

        Self {
            merge_label_prefix,
            switch_retry: RetryPolicy::fixed(retries, Duration::from_millis(delay_ms)),
            executor_threads,
            event_capacity,
        }
    }

    pub fn with_merge_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.merge_label_prefix = prefix.into();
        self
    }

    pub fn with_switch_retry(mut self, policy: RetryPolicy) -> Self {
        self.switch_retry = policy;
        self
    }

    pub fn with_executor_threads(mut self, threads: usize) -> Self {
        self.executor_threads = threads.max(1);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

fn parse_setting<T>(key: &'static str, value: &str) -> Result<T, ParseSettingError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ParseSettingError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn override_or<F, T>(lookup: &F, key: &'static str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_setting(key, &raw).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring setting override");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.merge_label_prefix, "MergedPosition_");
        assert_eq!(settings.switch_retry.retries(), 3);
        assert_eq!(settings.switch_retry.delay_for(0), Duration::from_millis(1500));
        assert_eq!(settings.executor_threads, 4);
        assert_eq!(settings.event_capacity, 1024);
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_overrides_applied() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("ORDER_MERGE_PREFIX", "M_"),
            ("ORDER_SWITCH_RETRIES", "5"),
            ("ORDER_SWITCH_RETRY_DELAY_MS", "20"),
            ("ORDER_EXECUTOR_THREADS", "2"),
            ("ORDER_EVENT_CAPACITY", " 64 "),
        ]));

        assert_eq!(settings.merge_label_prefix, "M_");
        assert_eq!(settings.switch_retry.retries(), 5);
        assert_eq!(settings.switch_retry.delay_for(0), Duration::from_millis(20));
        assert_eq!(settings.executor_threads, 2);
        assert_eq!(settings.event_capacity, 64);
    }

    #[test]
    fn test_invalid_override_falls_back() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("ORDER_SWITCH_RETRIES", "many"),
            ("ORDER_EXECUTOR_THREADS", "0"),
        ]));

        assert_eq!(settings.switch_retry.retries(), 3);
        assert_eq!(settings.executor_threads, 1);
    }

    #[test]
    fn test_parse_error_message() {
        let err = parse_setting::<u32>("ORDER_SWITCH_RETRIES", "x").unwrap_err();
        assert!(err.to_string().contains("ORDER_SWITCH_RETRIES"));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_builder_methods() {
        let settings = Settings::new()
            .with_merge_label_prefix("P_")
            .with_switch_retry(RetryPolicy::none())
            .with_executor_threads(0)
            .with_event_capacity(16);

        assert_eq!(settings.merge_label_prefix, "P_");
        assert_eq!(settings.switch_retry, RetryPolicy::none());
        assert_eq!(settings.executor_threads, 1);
        assert_eq!(settings.event_capacity, 16);
    }
}
