//! Runtime context threaded through evaluation.
//!
//! A root [`Context`] is built per transform call. Entering a scope (foreach
//! iteration, variable binding, join row, template call) derives a child that
//! borrows its parent, so the parent is never touched and the child is dropped
//! when the scope exits.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use indexmap::IndexMap;

use crate::{
    error::{Result, TransformError},
    functions::FunctionRegistry,
    template::TemplateRepository,
    value::Value,
};

/// Source of auxiliary documents reachable through `document(repo, name)`.
pub trait DocumentRepository {
    fn get(&self, name: &str) -> Result<String>;

    /// Streaming access; defaults to reading the whole text through [`get`](Self::get).
    fn get_stream(&self, name: &str) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.get(name)?.into_bytes())))
    }
}

/// Source of template fragments pulled in by `"#include": "name"` at compile time.
pub trait IncludeRepository {
    fn get(&self, name: &str) -> Option<String>;
}

/// Host-supplied arguments, visible to expressions as `$name`.
pub trait ArgumentProvider {
    fn get(&self, name: &str) -> Option<Value>;
}

impl ArgumentProvider for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }
}

impl ArgumentProvider for IndexMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        IndexMap::get(self, name).cloned()
    }
}

/// In-memory repository usable both for documents and for include fragments.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    name: String,
    entries: HashMap<String, String>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryRepository {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(key, text);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }
}

impl DocumentRepository for MemoryRepository {
    fn get(&self, name: &str) -> Result<String> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| TransformError::DocumentNotFound {
                repository: self.name.clone(),
                name: name.to_string(),
            })
    }
}

impl IncludeRepository for MemoryRepository {
    fn get(&self, name: &str) -> Option<String> {
        self.entries.get(name).cloned()
    }
}

/// Per-invocation inputs supplied by the host.
#[derive(Default)]
pub struct TransformContext<'h> {
    arguments: Vec<&'h dyn ArgumentProvider>,
    documents: HashMap<String, &'h dyn DocumentRepository>,
}

impl<'h> TransformContext<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument provider; earlier providers win on duplicate names.
    pub fn with_arguments(mut self, provider: &'h dyn ArgumentProvider) -> Self {
        self.arguments.push(provider);
        self
    }

    /// Register a document repository under the name expressions use for it.
    pub fn with_documents(mut self, name: impl Into<String>, repository: &'h dyn DocumentRepository) -> Self {
        self.documents.insert(name.into(), repository);
        self
    }

    pub(crate) fn argument(&self, name: &str) -> Option<Value> {
        self.arguments.iter().find_map(|provider| provider.get(name))
    }

    pub(crate) fn documents(&self, name: &str) -> Option<&'h dyn DocumentRepository> {
        self.documents.get(name).copied()
    }
}

/// Everything an invocation shares across scopes.
pub struct Environment<'a> {
    pub templates: &'a TemplateRepository,
    pub functions: &'a FunctionRegistry,
    pub host: &'a TransformContext<'a>,
}

/// What identifiers resolve against.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// A JSON node; identifiers are its properties
    Node(&'a Value),
    /// A join candidate row; `left` and `right` name the two sides
    Row(&'a Value, Option<&'a Value>),
}

/// Scoped evaluation state.
pub struct Context<'a> {
    scope: Scope<'a>,
    variables: HashMap<String, Value>,
    parent: Option<&'a Context<'a>>,
    position: usize,
    pub env: &'a Environment<'a>,
}

impl<'a> Context<'a> {
    pub fn new(data: &'a Value, env: &'a Environment<'a>) -> Self {
        Context {
            scope: Scope::Node(data),
            variables: HashMap::new(),
            parent: None,
            position: 0,
            env,
        }
    }

    pub fn scope(&self) -> Scope<'a> {
        self.scope
    }

    /// The current scope as a value; a join row becomes `{"left": .., "right": ..}`.
    pub fn current(&self) -> Value {
        match self.scope {
            Scope::Node(value) => value.clone(),
            Scope::Row(left, right) => crate::join::row_value(left.clone(), right.cloned()),
        }
    }

    /// 0-based index of the innermost foreach iteration.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Child context whose current scope is one element of an iteration.
    pub fn with_scope<'b>(&'b self, data: &'b Value, position: usize) -> Context<'b> {
        Context {
            scope: Scope::Node(data),
            variables: HashMap::new(),
            parent: Some(self),
            position,
            env: self.env,
        }
    }

    /// Child context for a join candidate pair.
    pub fn with_row<'b>(&'b self, left: &'b Value, right: Option<&'b Value>) -> Context<'b> {
        Context {
            scope: Scope::Row(left, right),
            variables: HashMap::new(),
            parent: Some(self),
            position: self.position,
            env: self.env,
        }
    }

    /// Child context with one more variable bound.
    pub fn with_variable<'b>(&'b self, name: &str, value: Value) -> Context<'b> {
        self.with_variables(vec![(name.to_string(), value)])
    }

    /// Child context with several variables bound (template arguments).
    pub fn with_variables<'b>(&'b self, bindings: Vec<(String, Value)>) -> Context<'b> {
        Context {
            scope: self.scope,
            variables: bindings.into_iter().collect(),
            parent: Some(self),
            position: self.position,
            env: self.env,
        }
    }

    /// Walk the scope chain innermost-first, then the host's argument providers.
    pub fn variable(&self, name: &str) -> Option<Value> {
        let mut ctx = Some(self);
        while let Some(current) = ctx {
            if let Some(value) = current.variables.get(name) {
                return Some(value.clone());
            }
            ctx = current.parent;
        }
        self.env.host.argument(name)
    }
}
