// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The ordered module registry and the per-type instrumentation planner.
//!
//! The registry is assembled once at startup — explicit registration
//! replaces classpath service discovery — and is read-only afterwards, so
//! planning takes no locks. For each type the host resolves, the planner
//! walks the modules in registration order and produces the type's
//! [`InstrumentationPlan`]: the deduplicated advice chain for every
//! matched method. Wrappers at call sites keep a handle on their type's
//! plan and route calls through [`crate::dispatch`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use instrumentation_core::Config;

use crate::advice::{Advice, MethodRef};
use crate::dispatch::MethodBinding;
use crate::error::RegistryError;
use crate::matcher::CachedIndexMatcher;
use crate::module::{InstrumentationModule, StoreAssociation, TypeInstrumentation};
use crate::types::{MethodDescriptor, TypeDescriptor, TypeIndex};

struct RegisteredModule {
    module: Arc<dyn InstrumentationModule>,
    name: String,
    index_matcher: CachedIndexMatcher,
    instrumentations: Vec<TypeInstrumentation>,
    helper_types: Vec<String>,
    skip_if_applied: Vec<String>,
}

/// Builds a [`Registry`], applying configuration gates at build time so
/// disabled modules cost nothing at match time.
pub struct RegistryBuilder {
    config: Arc<Config>,
    modules: Vec<Arc<dyn InstrumentationModule>>,
}

impl RegistryBuilder {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            modules: Vec::new(),
        }
    }

    /// Registers a module; order is preserved and significant.
    pub fn with_module(mut self, module: Arc<dyn InstrumentationModule>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut registered = Vec::new();
        for module in self.modules {
            let name = module.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(RegistryError::DuplicateModule(name));
            }
            if !self
                .config
                .is_integration_enabled(&name, module.enabled_by_default())
            {
                debug!(module = %name, "instrumentation module disabled, skipping");
                continue;
            }
            registered.push(RegisteredModule {
                index_matcher: CachedIndexMatcher::new(module.index_matcher()),
                instrumentations: module.type_instrumentations(),
                helper_types: module.helper_types(),
                skip_if_applied: module.skip_if_applied(),
                name,
                module,
            });
        }
        Ok(Registry {
            modules: registered,
        })
    }
}

/// Immutable, ordered set of installed instrumentation modules.
pub struct Registry {
    modules: Vec<RegisteredModule>,
}

impl Registry {
    /// Names of the modules that survived configuration gating, in order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Every context-store association declared by installed modules,
    /// deduplicated; tooling uses this to pre-size and document stores.
    pub fn store_associations(&self) -> Vec<StoreAssociation> {
        let mut associations = Vec::new();
        for module in &self.modules {
            for association in module.module.store_associations() {
                if !associations.contains(&association) {
                    associations.push(association);
                }
            }
        }
        associations
    }

    /// Computes the instrumentation plan for one type.
    ///
    /// Pure with respect to the registry: calling it twice for the same
    /// descriptor yields equivalent plans. A module is applied at most
    /// once per (method, advice) pair even when its matchers overlap.
    pub fn plan_for(&self, descriptor: &TypeDescriptor, index: &TypeIndex) -> InstrumentationPlan {
        let mut plan = InstrumentationPlan::new(&descriptor.name);
        for module in &self.modules {
            if module
                .skip_if_applied
                .iter()
                .any(|earlier| plan.has_module(earlier))
            {
                debug!(
                    module = %module.name,
                    type_name = %descriptor.name,
                    "earlier module already applied, skipping"
                );
                continue;
            }
            if !module.index_matcher.matches(index) {
                continue;
            }
            if let Some(missing) = module
                .helper_types
                .iter()
                .find(|helper| !index.has_type(helper))
            {
                debug!(
                    module = %module.name,
                    helper = %missing,
                    "helper type unresolvable in this universe, skipping module"
                );
                continue;
            }
            let mut applied = false;
            for instrumentation in &module.instrumentations {
                if !instrumentation.type_matcher.matches(descriptor, index) {
                    continue;
                }
                for method in &descriptor.methods {
                    for (matcher, advice) in &instrumentation.method_advice {
                        if matcher.matches(method) {
                            applied |= plan.bind(&descriptor.name, method, &module.name, advice);
                        }
                    }
                }
            }
            if applied {
                plan.applied_modules.push(module.name.clone());
            }
        }
        plan
    }
}

/// The advice bindings selected for one type.
pub struct InstrumentationPlan {
    type_name: String,
    bindings: Vec<(MethodDescriptor, MethodBinding)>,
    applied_modules: Vec<String>,
}

impl InstrumentationPlan {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            bindings: Vec::new(),
            applied_modules: Vec::new(),
        }
    }

    fn bind(
        &mut self,
        type_name: &str,
        method: &MethodDescriptor,
        module: &str,
        advice: &Arc<dyn Advice>,
    ) -> bool {
        let position = self
            .bindings
            .iter()
            .position(|(descriptor, _)| descriptor == method);
        let index = match position {
            Some(index) => index,
            None => {
                self.bindings.push((
                    method.clone(),
                    MethodBinding::new(MethodRef::new(type_name, &method.name)),
                ));
                self.bindings.len() - 1
            }
        };
        let binding = &mut self.bindings[index].1;
        if binding.contains(module, advice) {
            debug!(module, method = %method.name, "advice already bound, skipping duplicate");
            return false;
        }
        binding.push(module, advice.clone());
        true
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether `module` contributed any binding to this type.
    pub fn has_module(&self, module: &str) -> bool {
        self.applied_modules.iter().any(|name| name == module)
    }

    pub fn applied_modules(&self) -> &[String] {
        &self.applied_modules
    }

    /// The binding for the first method with this name, if any; call sites
    /// with overloads should use [`InstrumentationPlan::binding_for_method`].
    pub fn binding_for(&self, method_name: &str) -> Option<&MethodBinding> {
        self.bindings
            .iter()
            .find(|(descriptor, _)| descriptor.name == method_name)
            .map(|(_, binding)| binding)
    }

    pub fn binding_for_method(&self, method: &MethodDescriptor) -> Option<&MethodBinding> {
        self.bindings
            .iter()
            .find(|(descriptor, _)| descriptor == method)
            .map(|(_, binding)| binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &MethodBinding> {
        self.bindings.iter().map(|(_, binding)| binding)
    }
}
