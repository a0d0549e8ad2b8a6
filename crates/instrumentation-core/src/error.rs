// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while reading configuration from the environment.
///
/// These never reach instrumented code; [`crate::Config::from_env`] logs the
/// offending variable and falls back to the default value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
}
