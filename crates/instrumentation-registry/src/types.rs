// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Static descriptors of instrumentable types and the reachable-type index.
//!
//! A [`TypeIndex`] models one resolution universe — the set of types a
//! library "classloader" can reach. Supertype walks stop silently at any
//! name the index cannot resolve: a missing optional dependency must read
//! as "no match", never as an error on the host's loading path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Signature-level description of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub is_static: bool,
}

impl MethodDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameter_types: Vec::new(),
            return_type: "()".to_string(),
            is_static: false,
        }
    }

    pub fn with_parameters(mut self, parameter_types: &[&str]) -> Self {
        self.parameter_types = parameter_types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn returning(mut self, return_type: &str) -> Self {
        self.return_type = return_type.to_string();
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Static description of one type as seen at load time.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<String>,
    pub methods: Vec<MethodDescriptor>,
    pub is_interface: bool,
}

impl TypeDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
            is_interface: false,
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut descriptor = Self::new(name);
        descriptor.is_interface = true;
        descriptor
    }

    pub fn extending(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn implementing(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }
}

static NEXT_INDEX_ID: AtomicU64 = AtomicU64::new(1);

/// The set of types reachable in one resolution universe.
///
/// Carries a process-unique id so per-index matcher verdicts can be cached
/// (the matcher runs for every type the host resolves; re-walking the index
/// each time would be the dominant cost).
#[derive(Debug)]
pub struct TypeIndex {
    id: u64,
    types: HashMap<String, TypeDescriptor>,
}

impl Default for TypeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIndex {
    pub fn new() -> Self {
        Self {
            id: NEXT_INDEX_ID.fetch_add(1, Ordering::Relaxed),
            types: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn insert(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `name` has `supertype` anywhere in its superclass chain or
    /// transitive interfaces. Unresolvable names terminate their branch of
    /// the walk; a cycle guard makes malformed hierarchies safe.
    pub fn is_subtype(&self, name: &str, supertype: &str) -> bool {
        if name == supertype {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(descriptor) = self.types.get(current) else {
                // Missing link in the hierarchy; treat this branch as ended.
                continue;
            };
            for parent in descriptor
                .superclass
                .iter()
                .chain(descriptor.interfaces.iter())
            {
                if parent == supertype {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }
}
