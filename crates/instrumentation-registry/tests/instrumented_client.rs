// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end: a module whose advice traces a client call, with nested
//! calls suppressed through the call-depth tracker.

use std::sync::Arc;

use instrumentation_core::{CallDepth, Config, MemorySink, Scope, Span, Tracer};
use instrumentation_registry::matcher::{
    extends_type, method_named, not_interface, takes_argument,
};
use instrumentation_registry::{
    dispatch, Advice, CallOutcome, EnterState, InstrumentationModule, InstrumentationPlan,
    MethodCall, MethodDescriptor, Registry, RegistryBuilder, TypeDescriptor, TypeIndex,
    TypeInstrumentation,
};

/// Marker scoping the nesting counter to this integration.
struct HttpClientMarker;

struct HttpClientAdvice {
    tracer: Tracer,
}

impl Advice for HttpClientAdvice {
    fn on_enter(&self, call: &mut MethodCall<'_>) -> Option<EnterState> {
        if CallDepth::<HttpClientMarker>::enter() > 0 {
            // Nested call of the same logical operation: no span.
            return None;
        }
        let span = self.tracer.start_span("http.request");
        if let Some(url) = call.arg_ref::<String>(0) {
            span.set_tag("http.url", url);
        }
        let scope = self.tracer.activate(&span);
        Some(Box::new((span, scope)))
    }

    fn on_exit(
        &self,
        _call: &mut MethodCall<'_>,
        enter: Option<EnterState>,
        outcome: &mut CallOutcome,
    ) {
        // Suppressed inner calls exit harmlessly without touching the
        // counter; the outermost exit resets it for the whole chain.
        let Some(enter) = enter else {
            return;
        };
        CallDepth::<HttpClientMarker>::reset();
        let Ok(state) = enter.downcast::<(Span, Scope)>() else {
            return;
        };
        let (span, scope) = *state;
        drop(scope);
        match outcome.error() {
            Some(error) => span.finish_with_error(&error.to_string()),
            None => span.finish(),
        }
    }
}

struct HttpClientModule {
    advice: Arc<HttpClientAdvice>,
}

impl InstrumentationModule for HttpClientModule {
    fn name(&self) -> &str {
        "http-client"
    }

    fn type_instrumentations(&self) -> Vec<TypeInstrumentation> {
        vec![TypeInstrumentation::new(
            not_interface().and(extends_type("client::HttpClient")),
        )
        .advise(
            method_named("execute").and(takes_argument(0, "alloc::string::String")),
            self.advice.clone(),
        )]
    }
}

#[derive(Debug, PartialEq)]
struct ClientError(String);

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ClientError {}

struct Harness {
    sink: Arc<MemorySink>,
    plan: InstrumentationPlan,
}

fn harness() -> Harness {
    let sink = Arc::new(MemorySink::default());
    let tracer = Tracer::new(Arc::new(Config::default()), sink.clone());
    let registry: Registry = RegistryBuilder::new(Arc::new(Config::default()))
        .with_module(Arc::new(HttpClientModule {
            advice: Arc::new(HttpClientAdvice { tracer }),
        }))
        .build()
        .expect("registry should build");

    let index = TypeIndex::new()
        .with_type(TypeDescriptor::interface("client::HttpClient"))
        .with_type(
            TypeDescriptor::new("client::DefaultHttpClient")
                .implementing("client::HttpClient")
                .with_method(
                    MethodDescriptor::new("execute")
                        .with_parameters(&["alloc::string::String"])
                        .returning("alloc::string::String"),
                ),
        );
    let descriptor = index
        .get("client::DefaultHttpClient")
        .expect("descriptor present")
        .clone();
    let plan = registry.plan_for(&descriptor, &index);
    Harness { sink, plan }
}

/// The instrumented call site: the outer execute internally re-enters the
/// wrapped execute, as layered clients do.
fn execute(harness: &Harness, url: &str, nested: usize, fail: bool) -> Result<String, ClientError> {
    let binding = harness
        .plan
        .binding_for("execute")
        .expect("execute should be bound");
    dispatch(
        binding,
        None,
        vec![Box::new(url.to_string())],
        |_args| -> Result<String, ClientError> {
            if nested > 0 {
                execute(harness, "http://inner.invalid/", nested - 1, fail)
            } else if fail {
                Err(ClientError("connection refused".to_string()))
            } else {
                Ok("200 OK".to_string())
            }
        },
    )
}

#[test]
fn nested_calls_produce_exactly_one_span() {
    let harness = harness();
    let result = execute(&harness, "http://outer.example/", 1, false);
    assert_eq!(result.unwrap(), "200 OK");

    let spans = harness.sink.spans();
    assert_eq!(spans.len(), 1, "inner call must not create a second span");
    // Attributes come from the outer call's arguments only.
    assert_eq!(
        spans[0].tags.get("http.url").map(String::as_str),
        Some("http://outer.example/")
    );
    assert_eq!(CallDepth::<HttpClientMarker>::current(), 0);
}

#[test]
fn deep_nesting_still_yields_one_span_per_top_level_call() {
    let harness = harness();
    for _ in 0..2 {
        execute(&harness, "http://outer.example/", 4, false).expect("call should succeed");
    }
    assert_eq!(harness.sink.spans().len(), 2);
    assert_eq!(CallDepth::<HttpClientMarker>::current(), 0);
}

#[test]
fn failing_inner_call_flags_the_single_span_and_rebalances() {
    let harness = harness();
    let result = execute(&harness, "http://outer.example/", 2, true);
    assert_eq!(result.unwrap_err(), ClientError("connection refused".to_string()));

    let spans = harness.sink.spans();
    assert_eq!(spans.len(), 1);
    assert!(spans[0].error);
    assert_eq!(
        spans[0].tags.get("error.message").map(String::as_str),
        Some("connection refused")
    );
    // Counter is back at baseline, so the next top-level call traces again.
    assert_eq!(CallDepth::<HttpClientMarker>::current(), 0);
    execute(&harness, "http://retry.example/", 0, false).expect("retry should succeed");
    assert_eq!(harness.sink.len(), 2);
}

#[test]
fn active_scope_is_restored_after_the_call() {
    let harness = harness();
    assert!(instrumentation_core::scope::current().is_none());
    execute(&harness, "http://outer.example/", 1, false).expect("call should succeed");
    assert!(
        instrumentation_core::scope::current().is_none(),
        "the advice's scope must not outlive the call"
    );
}
