use std::collections::HashMap;

use crate::{
    error::{Result, TransformError},
    template::nodes::TNode,
};

/// A named, reusable template registered by `#template(name, params...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub params: Vec<String>,
    pub body: TNode,
}

/// Templates of one compiled transform. Populated by the compiler only.
#[derive(Debug, Clone, Default)]
pub struct TemplateRepository {
    templates: HashMap<String, Template>,
}

impl TemplateRepository {
    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| TransformError::TemplateNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns false, leaving the existing entry, when `name` is taken.
    pub(crate) fn insert(&mut self, name: String, template: Template) -> bool {
        if self.templates.contains_key(&name) {
            return false;
        }
        self.templates.insert(name, template);
        true
    }
}
