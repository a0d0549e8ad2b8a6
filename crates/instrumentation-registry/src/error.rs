// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while assembling the module registry at startup.
///
/// Registration happens once, before any application code is
/// instrumented, so these are allowed to surface to the embedder.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate instrumentation module name: {0}")]
    DuplicateModule(String),
}
