// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Predicate trees deciding which types and methods get instrumented.
//!
//! These run for every type the host resolves, so the evaluation order is
//! cheapest-first by convention (put `named`/`not_interface` ahead of
//! hierarchy walks when composing) and the per-index verdict of a module's
//! [`IndexMatcher`] is cached so universes that can never match are
//! rejected without walking anything twice.

use regex::Regex;
use tracing::debug;

use dashmap::DashMap;

use crate::types::{MethodDescriptor, TypeDescriptor, TypeIndex};

/// Predicate over a type descriptor within its resolution universe.
#[derive(Debug, Clone)]
pub enum TypeMatcher {
    /// Matches nothing; the safe fallback for malformed matcher input.
    None,
    /// Matches everything.
    Any,
    Named(String),
    NamedOneOf(Vec<String>),
    NameStartsWith(String),
    NotInterface,
    /// Transitive supertype membership, superclasses and interfaces alike.
    ExtendsType(String),
    AnnotatedWith(String),
    DeclaresMethod(Box<MethodMatcher>),
    And(Vec<TypeMatcher>),
    Or(Vec<TypeMatcher>),
    Not(Box<TypeMatcher>),
}

pub fn named(name: &str) -> TypeMatcher {
    TypeMatcher::Named(name.to_string())
}

pub fn named_one_of(names: &[&str]) -> TypeMatcher {
    TypeMatcher::NamedOneOf(names.iter().map(|n| n.to_string()).collect())
}

pub fn name_starts_with(prefix: &str) -> TypeMatcher {
    TypeMatcher::NameStartsWith(prefix.to_string())
}

pub fn not_interface() -> TypeMatcher {
    TypeMatcher::NotInterface
}

pub fn extends_type(supertype: &str) -> TypeMatcher {
    TypeMatcher::ExtendsType(supertype.to_string())
}

pub fn annotated_with(annotation: &str) -> TypeMatcher {
    TypeMatcher::AnnotatedWith(annotation.to_string())
}

pub fn declares_method(matcher: MethodMatcher) -> TypeMatcher {
    TypeMatcher::DeclaresMethod(Box::new(matcher))
}

impl TypeMatcher {
    pub fn and(self, other: TypeMatcher) -> TypeMatcher {
        match self {
            TypeMatcher::And(mut matchers) => {
                matchers.push(other);
                TypeMatcher::And(matchers)
            }
            matcher => TypeMatcher::And(vec![matcher, other]),
        }
    }

    pub fn or(self, other: TypeMatcher) -> TypeMatcher {
        match self {
            TypeMatcher::Or(mut matchers) => {
                matchers.push(other);
                TypeMatcher::Or(matchers)
            }
            matcher => TypeMatcher::Or(vec![matcher, other]),
        }
    }

    pub fn negate(self) -> TypeMatcher {
        TypeMatcher::Not(Box::new(self))
    }

    pub fn matches(&self, descriptor: &TypeDescriptor, index: &TypeIndex) -> bool {
        match self {
            TypeMatcher::None => false,
            TypeMatcher::Any => true,
            TypeMatcher::Named(name) => descriptor.name == *name,
            TypeMatcher::NamedOneOf(names) => names.iter().any(|name| descriptor.name == *name),
            TypeMatcher::NameStartsWith(prefix) => descriptor.name.starts_with(prefix),
            TypeMatcher::NotInterface => !descriptor.is_interface,
            TypeMatcher::ExtendsType(supertype) => index.is_subtype(&descriptor.name, supertype),
            TypeMatcher::AnnotatedWith(annotation) => {
                descriptor.annotations.iter().any(|a| a == annotation)
            }
            TypeMatcher::DeclaresMethod(matcher) => {
                descriptor.methods.iter().any(|method| matcher.matches(method))
            }
            TypeMatcher::And(matchers) => {
                matchers.iter().all(|matcher| matcher.matches(descriptor, index))
            }
            TypeMatcher::Or(matchers) => {
                matchers.iter().any(|matcher| matcher.matches(descriptor, index))
            }
            TypeMatcher::Not(matcher) => !matcher.matches(descriptor, index),
        }
    }
}

/// Predicate over a single method signature.
#[derive(Debug, Clone)]
pub enum MethodMatcher {
    None,
    Any,
    Named(String),
    NamedOneOf(Vec<String>),
    NameMatches(Regex),
    TakesArgument(usize, String),
    TakesArguments(usize),
    Returns(String),
    And(Vec<MethodMatcher>),
    Or(Vec<MethodMatcher>),
    Not(Box<MethodMatcher>),
}

pub fn method_named(name: &str) -> MethodMatcher {
    MethodMatcher::Named(name.to_string())
}

pub fn method_named_one_of(names: &[&str]) -> MethodMatcher {
    MethodMatcher::NamedOneOf(names.iter().map(|n| n.to_string()).collect())
}

/// Regex name matcher; an invalid pattern degrades to match-nothing rather
/// than failing registration.
pub fn method_name_matches(pattern: &str) -> MethodMatcher {
    match Regex::new(pattern) {
        Ok(regex) => MethodMatcher::NameMatches(regex),
        Err(error) => {
            debug!(pattern, %error, "invalid method name pattern, matching nothing");
            MethodMatcher::None
        }
    }
}

pub fn takes_argument(position: usize, parameter_type: &str) -> MethodMatcher {
    MethodMatcher::TakesArgument(position, parameter_type.to_string())
}

pub fn takes_arguments(count: usize) -> MethodMatcher {
    MethodMatcher::TakesArguments(count)
}

pub fn returns(return_type: &str) -> MethodMatcher {
    MethodMatcher::Returns(return_type.to_string())
}

impl MethodMatcher {
    pub fn and(self, other: MethodMatcher) -> MethodMatcher {
        match self {
            MethodMatcher::And(mut matchers) => {
                matchers.push(other);
                MethodMatcher::And(matchers)
            }
            matcher => MethodMatcher::And(vec![matcher, other]),
        }
    }

    pub fn or(self, other: MethodMatcher) -> MethodMatcher {
        match self {
            MethodMatcher::Or(mut matchers) => {
                matchers.push(other);
                MethodMatcher::Or(matchers)
            }
            matcher => MethodMatcher::Or(vec![matcher, other]),
        }
    }

    pub fn negate(self) -> MethodMatcher {
        MethodMatcher::Not(Box::new(self))
    }

    pub fn matches(&self, method: &MethodDescriptor) -> bool {
        match self {
            MethodMatcher::None => false,
            MethodMatcher::Any => true,
            MethodMatcher::Named(name) => method.name == *name,
            MethodMatcher::NamedOneOf(names) => names.iter().any(|name| method.name == *name),
            MethodMatcher::NameMatches(regex) => regex.is_match(&method.name),
            MethodMatcher::TakesArgument(position, parameter_type) => method
                .parameter_types
                .get(*position)
                .is_some_and(|t| t == parameter_type),
            MethodMatcher::TakesArguments(count) => method.parameter_types.len() == *count,
            MethodMatcher::Returns(return_type) => method.return_type == *return_type,
            MethodMatcher::And(matchers) => matchers.iter().all(|matcher| matcher.matches(method)),
            MethodMatcher::Or(matchers) => matchers.iter().any(|matcher| matcher.matches(method)),
            MethodMatcher::Not(matcher) => !matcher.matches(method),
        }
    }
}

/// Module-level fast-reject predicate over a whole resolution universe.
///
/// The cheap first gate: "does this universe even contain the library this
/// module instruments". Evaluated through [`CachedIndexMatcher`] so the
/// answer is computed once per index.
#[derive(Debug, Clone)]
pub enum IndexMatcher {
    Any,
    HasType(String),
    HasAllTypes(Vec<String>),
}

pub fn has_type(name: &str) -> IndexMatcher {
    IndexMatcher::HasType(name.to_string())
}

pub fn has_all_types(names: &[&str]) -> IndexMatcher {
    IndexMatcher::HasAllTypes(names.iter().map(|n| n.to_string()).collect())
}

impl IndexMatcher {
    fn evaluate(&self, index: &TypeIndex) -> bool {
        match self {
            IndexMatcher::Any => true,
            IndexMatcher::HasType(name) => index.has_type(name),
            IndexMatcher::HasAllTypes(names) => names.iter().all(|name| index.has_type(name)),
        }
    }
}

/// Caches an [`IndexMatcher`] verdict per index id.
#[derive(Debug)]
pub struct CachedIndexMatcher {
    matcher: IndexMatcher,
    verdicts: DashMap<u64, bool>,
}

impl CachedIndexMatcher {
    pub fn new(matcher: IndexMatcher) -> Self {
        Self {
            matcher,
            verdicts: DashMap::new(),
        }
    }

    pub fn matches(&self, index: &TypeIndex) -> bool {
        if let Some(verdict) = self.verdicts.get(&index.id()) {
            return *verdict;
        }
        let verdict = self.matcher.evaluate(index);
        self.verdicts.insert(index.id(), verdict);
        verdict
    }
}
