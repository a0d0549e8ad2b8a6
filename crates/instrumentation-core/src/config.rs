// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven configuration.
//!
//! Read once at startup and shared behind an `Arc`; nothing here is
//! re-evaluated at call time. Individual integrations are toggled with
//! `DD_INTEGRATION_<NAME>_ENABLED` variables, with each module supplying its
//! own default when no override is present.

use std::collections::HashMap;
use std::env;

use tracing::warn;

use crate::error::ConfigError;

const TRACE_ENABLED_KEY: &str = "DD_TRACE_ENABLED";
const SERVICE_KEY: &str = "DD_SERVICE";
const ENV_KEY: &str = "DD_ENV";
const INTEGRATION_PREFIX: &str = "DD_INTEGRATION_";
const INTEGRATION_SUFFIX: &str = "_ENABLED";

const DEFAULT_SERVICE_NAME: &str = "unnamed-app";

#[derive(Debug, Clone)]
pub struct Config {
    /// Service name applied to every span that does not set its own.
    pub service_name: String,
    /// Deployment environment tag (`DD_ENV`), if set.
    pub env: Option<String>,
    /// Master switch; when false the tracer produces inert spans.
    pub trace_enabled: bool,
    /// Per-integration overrides parsed from `DD_INTEGRATION_<NAME>_ENABLED`.
    /// Keys are normalized integration names (lowercase, dash-separated).
    pub(crate) integration_overrides: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            env: None,
            trace_enabled: true,
            integration_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Builds a config from the process environment.
    ///
    /// Unparseable values are logged and replaced by their defaults; this
    /// function never fails.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(service) = env::var(SERVICE_KEY) {
            if !service.is_empty() {
                config.service_name = service;
            }
        }
        if let Ok(env_name) = env::var(ENV_KEY) {
            if !env_name.is_empty() {
                config.env = Some(env_name);
            }
        }
        if let Ok(value) = env::var(TRACE_ENABLED_KEY) {
            match parse_bool(TRACE_ENABLED_KEY, &value) {
                Ok(enabled) => config.trace_enabled = enabled,
                Err(error) => warn!("{error}, keeping default"),
            }
        }

        for (key, value) in env::vars() {
            let Some(name) = key
                .strip_prefix(INTEGRATION_PREFIX)
                .and_then(|rest| rest.strip_suffix(INTEGRATION_SUFFIX))
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            match parse_bool(&key, &value) {
                Ok(enabled) => {
                    config
                        .integration_overrides
                        .insert(normalize_integration_name(name), enabled);
                }
                Err(error) => warn!("{error}, ignoring override"),
            }
        }

        config
    }

    /// Returns whether an integration should be installed, honoring the
    /// module's own default when no override is present.
    ///
    /// A disabled tracer disables every integration regardless of overrides.
    pub fn is_integration_enabled(&self, name: &str, default_enabled: bool) -> bool {
        if !self.trace_enabled {
            return false;
        }
        *self
            .integration_overrides
            .get(&normalize_integration_name(name))
            .unwrap_or(&default_enabled)
    }

    /// Records an integration override programmatically; primarily for
    /// embedders that do not configure through the environment.
    pub fn set_integration_enabled(&mut self, name: &str, enabled: bool) {
        self.integration_overrides
            .insert(normalize_integration_name(name), enabled);
    }
}

fn normalize_integration_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
