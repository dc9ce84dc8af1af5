//! Catalog loading as an explicit registry.
//!
//! Sources are enumerated up front: compiled-in modules are registered by
//! call, configured files are loaded in order, configured directories are
//! scanned for `*.json` / `*.yaml` / `*.yml` in lexicographic order. A
//! source that fails to read or parse is skipped with a diagnostic; loading
//! never fails as a whole. There is no runtime module discovery beyond this
//! list.

use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::definition::{ModuleDoc, ParamLocation, ToolDefinition, ToolSpec};
use crate::error::CatalogError;
use crate::template;

#[derive(Debug)]
enum ModuleSource {
    Static { label: String, doc: ModuleDoc },
    File(PathBuf),
    Dir(PathBuf),
}

/// Ordered list of catalog sources. Later sources win on name collisions.
#[derive(Debug, Default)]
pub struct Registry {
    sources: Vec<ModuleSource>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled-in module under a label (used as the fallback
    /// tool name for single-definition modules).
    pub fn register_module(&mut self, label: impl Into<String>, doc: ModuleDoc) {
        self.sources.push(ModuleSource::Static {
            label: label.into(),
            doc,
        });
    }

    /// Register one module file.
    pub fn register_file(&mut self, path: impl Into<PathBuf>) {
        self.sources.push(ModuleSource::File(path.into()));
    }

    /// Register a directory; matching files inside are loaded in
    /// lexicographic order at `load` time.
    pub fn register_dir(&mut self, path: impl Into<PathBuf>) {
        self.sources.push(ModuleSource::Dir(path.into()));
    }

    /// Build the catalog from all registered sources, in order.
    #[must_use]
    pub fn load(self) -> Catalog {
        let mut catalog = Catalog::new();

        for source in self.sources {
            match source {
                ModuleSource::Static { label, doc } => {
                    apply_module(&mut catalog, &label, doc);
                }
                ModuleSource::File(path) => load_module_file(&mut catalog, &path),
                ModuleSource::Dir(path) => scan_dir(&mut catalog, &path),
            }
        }

        tracing::info!(tools = catalog.len(), "tool catalog loaded");
        catalog
    }
}

fn scan_dir(catalog: &mut Catalog, dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(dir = %dir.display(), %error, "skipping unreadable module directory");
            return;
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| has_module_extension(p))
        .collect();
    files.sort();

    for file in files {
        load_module_file(catalog, &file);
    }
}

fn has_module_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

fn load_module_file(catalog: &mut Catalog, path: &Path) {
    match parse_module_file(path) {
        Ok(doc) => {
            let label = path
                .file_stem()
                .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
            apply_module(catalog, &label, doc);
        }
        Err(error) => {
            tracing::warn!(module = %path.display(), %error, "skipping non-conforming tool module");
        }
    }
}

fn parse_module_file(path: &Path) -> Result<ModuleDoc, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::ModuleRead {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed: Result<ModuleDoc, String> = if is_json {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| CatalogError::ModuleShape {
        label: path.display().to_string(),
        reason,
    })
}

fn apply_module(catalog: &mut Catalog, label: &str, doc: ModuleDoc) {
    match doc {
        ModuleDoc::Envelope(envelope) => {
            for (name, scheme) in envelope.security_schemes {
                catalog.insert_scheme(name, scheme);
            }
            for (name, spec) in envelope.tools {
                insert_tool(catalog, label, name, spec);
            }
        }
        ModuleDoc::Single(spec) => {
            let name = spec.name.clone().unwrap_or_else(|| label.to_string());
            insert_tool(catalog, label, name, spec);
        }
        ModuleDoc::Map(tools) => {
            for (name, spec) in tools {
                insert_tool(catalog, label, name, spec);
            }
        }
    }
}

fn insert_tool(catalog: &mut Catalog, label: &str, name: String, spec: ToolSpec) {
    // The mapping key (or settled single-module name) is authoritative.
    let def = match ToolDefinition::from_spec(name, spec) {
        Ok(def) => def,
        Err(error) => {
            tracing::warn!(module = label, %error, "skipping tool definition");
            return;
        }
    };

    warn_on_uncovered_placeholders(&def);
    catalog.insert(def);
}

/// Every `{placeholder}` should be covered by a path-located parameter.
/// An uncovered one is diagnosable at load; at call time it fails hard
/// before anything goes out.
fn warn_on_uncovered_placeholders(def: &ToolDefinition) {
    for placeholder in template::placeholders(&def.path_template) {
        let covered = def
            .parameters_at(ParamLocation::Path)
            .any(|p| p.name == placeholder);
        if !covered {
            tracing::warn!(
                tool = %def.name,
                placeholder,
                "path placeholder has no matching path parameter"
            );
        }
    }
}
