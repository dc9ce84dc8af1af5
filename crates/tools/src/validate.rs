//! Argument validation against a tool's declarative input schema.
//!
//! The schema is interpreted as data (compiled by `jsonschema`), never
//! evaluated as code. Validation is synchronous and purely local: a failing
//! call never reaches the network. Validated arguments are the caller's
//! original object, untouched — fields not named in `executionParameters`
//! may still carry the nested body payload and must survive.

use rmcp::model::JsonObject;
use serde_json::{Value, json};

/// One failed validation, with the per-field violation list.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    /// Summary line optimized for the most actionable violation.
    pub message: String,
    /// `{"type": "validation-errors", "violations": [...]}` with one entry
    /// per violated field.
    pub violations: Value,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl ValidationFailure {
    /// Text form delivered to the caller inside the error envelope.
    #[must_use]
    pub fn caller_text(&self) -> String {
        let detail = serde_json::to_string_pretty(&self.violations)
            .unwrap_or_else(|_| self.violations.to_string());
        format!("{}\n{detail}", self.message)
    }
}

/// A compiled validator for one tool's input schema.
///
/// Built once per tool when the pipeline is constructed; the catalog is
/// immutable so compiled validators never go stale.
pub struct ArgumentValidator {
    compiled: Option<jsonschema::Validator>,
    properties: Vec<String>,
    required: Vec<String>,
    accept_all: bool,
}

impl ArgumentValidator {
    /// Compile a schema. A missing or degenerate schema (not an object, or
    /// an empty one) downgrades to accept-everything; a schema that fails
    /// to compile does the same with a diagnostic rather than rejecting
    /// every call.
    #[must_use]
    pub fn compile(schema: Option<&Value>) -> Self {
        let Some(schema) = schema else {
            return Self::accept_all();
        };
        let Some(obj) = schema.as_object() else {
            return Self::accept_all();
        };
        if obj.is_empty() {
            return Self::accept_all();
        }

        let properties: Vec<String> = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        let required: Vec<String> = obj
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let compiled = match jsonschema::validator_for(schema) {
            Ok(compiled) => Some(compiled),
            Err(error) => {
                tracing::warn!(%error, "input schema failed to compile; accepting all arguments");
                None
            }
        };

        Self {
            compiled,
            properties,
            required,
            accept_all: false,
        }
    }

    fn accept_all() -> Self {
        Self {
            compiled: None,
            properties: Vec::new(),
            required: Vec::new(),
            accept_all: true,
        }
    }

    /// Validate the raw argument object. `Ok` means the caller's object is
    /// usable as-is; this never drops or rewrites fields, so re-validating
    /// an already-validated object is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] with one violation entry per
    /// offending field.
    pub fn validate(&self, args: &JsonObject) -> Result<(), ValidationFailure> {
        if self.accept_all {
            return Ok(());
        }

        let mut violations: Vec<Value> = Vec::new();
        let known: Vec<&str> = self.properties.iter().map(String::as_str).collect();

        // Unknown arguments, with did-you-mean suggestions.
        if !self.properties.is_empty() {
            for key in args.keys() {
                if self.properties.iter().any(|p| p == key) {
                    continue;
                }
                violations.push(json!({
                    "type": "invalid-parameter",
                    "parameter": key,
                    "suggestions": find_similar_strings(key, &known),
                    "validParameters": self.properties,
                }));
            }
        }

        // Missing required arguments.
        for name in &self.required {
            if !args.contains_key(name) {
                violations.push(json!({
                    "type": "missing-required-parameter",
                    "parameter": name,
                }));
            }
        }

        // Schema constraints (types, ranges, formats). Required errors are
        // filtered; they already have a nicer shape above.
        if let Some(compiled) = &self.compiled {
            let instance = Value::Object(args.clone());
            for e in compiled.iter_errors(&instance) {
                if matches!(
                    e.kind(),
                    jsonschema::error::ValidationErrorKind::Required { .. }
                ) {
                    continue;
                }
                violations.push(json!({
                    "type": "constraint-violation",
                    "message": e.to_string(),
                    "instancePath": e.instance_path().to_string(),
                }));
            }
        }

        if violations.is_empty() {
            return Ok(());
        }

        let message = summarize(&violations);
        Err(ValidationFailure {
            message,
            violations: json!({
                "type": "validation-errors",
                "violations": violations,
            }),
        })
    }
}

// Message: optimize for unknown-parameter typos (even when other violations
// exist too).
fn summarize(violations: &[Value]) -> String {
    if let Some(v) = violations
        .iter()
        .find(|v| v.get("type").and_then(Value::as_str) == Some("invalid-parameter"))
    {
        let parameter = v.get("parameter").and_then(Value::as_str).unwrap_or("?");
        let suggestion = v
            .get("suggestions")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_str);
        return match suggestion {
            Some(s) => {
                format!("Invalid params: unknown parameter '{parameter}' (did you mean '{s}'?)")
            }
            None => format!("Invalid params: unknown parameter '{parameter}'"),
        };
    }

    format!(
        "Invalid params: validation failed with {} error(s)",
        violations.len()
    )
}

fn find_similar_strings(unknown: &str, known: &[&str]) -> Vec<String> {
    let mut candidates: Vec<(f64, String)> = Vec::new();
    for k in known {
        let score = strsim::jaro(unknown, k);
        if score > 0.7 {
            candidates.push((score, (*k).to_string()));
        }
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    candidates.into_iter().map(|(_, s)| s).collect()
}
