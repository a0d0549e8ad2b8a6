// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attribute population contract for integration modules.
//!
//! A decorator is the stateless piece of an integration that knows how to
//! read domain attributes (an HTTP method, a SQL statement, a queue name)
//! out of intercepted request/response objects and write them onto a span.
//! Integrations implement this trait next to their advice; the core only
//! fixes the shape and the baseline tags.

use std::any::Any;
use std::error::Error;

use crate::span::{Span, ERROR_MESSAGE_TAG};

pub const COMPONENT_TAG: &str = "component";
pub const SPAN_TYPE_TAG: &str = "span.type";

pub trait Decorator: Send + Sync {
    /// Name of the instrumented component, e.g. `"http-client"`.
    fn component(&self) -> &str;

    /// Span type classification, e.g. `"http"`, `"sql"`, `"queue"`.
    fn span_type(&self) -> Option<&str> {
        None
    }

    /// Applied once when the span is created.
    fn on_start(&self, span: &Span) {
        span.set_tag(COMPONENT_TAG, self.component());
        if let Some(span_type) = self.span_type() {
            span.set_tag(SPAN_TYPE_TAG, span_type);
        }
    }

    /// Applied with the intercepted call's request object; implementations
    /// downcast to the concrete library type they declared to match.
    fn on_request(&self, _span: &Span, _request: &dyn Any) {}

    /// Applied with the intercepted call's response object on success.
    fn on_response(&self, _span: &Span, _response: &dyn Any) {}

    /// Applied when the intercepted call fails.
    fn on_error(&self, span: &Span, error: &(dyn Error + 'static)) {
        span.set_error(true);
        span.set_tag(ERROR_MESSAGE_TAG, &error.to_string());
    }
}
