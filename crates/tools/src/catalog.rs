//! The tool catalog: an immutable-after-load mapping from tool name to
//! definition, plus catalog-wide security schemes.
//!
//! Mutation is crate-private; the only way to obtain a `Catalog` outside
//! this crate is through the loader, after which it is read-only and safe
//! to share without locks.

use rmcp::model::Tool;
use std::collections::HashMap;

use crate::definition::{SecurityScheme, ToolDefinition};

#[derive(Debug, Default)]
pub struct Catalog {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
    schemes: HashMap<String, SecurityScheme>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, last writer wins. A duplicate name overwrites
    /// the prior entry in place (listing order keeps the first position)
    /// and returns true; the condition is diagnosable, not fatal.
    pub(crate) fn insert(&mut self, def: ToolDefinition) -> bool {
        match self.index.get(&def.name) {
            Some(&slot) => {
                tracing::warn!(
                    tool = %def.name,
                    "duplicate tool name in catalog, overwriting prior definition"
                );
                self.tools[slot] = def;
                true
            }
            None => {
                self.index.insert(def.name.clone(), self.tools.len());
                self.tools.push(def);
                false
            }
        }
    }

    pub(crate) fn insert_scheme(&mut self, name: String, scheme: SecurityScheme) {
        if self.schemes.insert(name.clone(), scheme).is_some() {
            tracing::warn!(
                scheme = %name,
                "duplicate security scheme, overwriting prior definition"
            );
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    #[must_use]
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.schemes.get(name)
    }

    /// Public listing in insertion order. Only name, description, input
    /// schema, and derived annotations are exposed.
    #[must_use]
    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDefinition::public_tool).collect()
    }

    /// All definitions in insertion order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
