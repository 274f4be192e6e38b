//! Source signal extraction using tree-sitter
//!
//! This module provides the language-neutral signal shape consumed by the
//! scanners, plus per-language extractors behind a single dispatch point.
//! The scoring engine never touches a syntax tree directly; it only sees
//! `FileSignals`, which keeps it language-agnostic.

pub mod python;

use anyhow::Result;
use std::path::Path;

/// Extract signals from a source file, dispatching on extension.
///
/// Unknown extensions yield an empty signal set rather than an error.
pub fn extract_file(path: &Path) -> Result<FileSignals> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "py" | "pyi" => python::extract(path),
        _ => Ok(FileSignals::default()),
    }
}

/// Shape of one function as seen by the heuristics.
#[derive(Debug, Clone, Default)]
pub struct FunctionShape {
    pub name: String,
    /// Positional parameter names in declaration order, including `self`.
    pub params: Vec<String>,
    /// Simple decorator names (rightmost identifier of the decorator
    /// expression).
    pub decorators: Vec<String>,
    pub has_return: bool,
    /// At least one return whose expression is boolean-shaped: a bool
    /// literal, comparison, boolean operator, or unary operator.
    pub has_bool_return: bool,
}

impl FunctionShape {
    /// Parameter list with a leading `self` receiver dropped.
    pub fn params_without_self(&self) -> &[String] {
        match self.params.first() {
            Some(first) if first == "self" => &self.params[1..],
            _ => &self.params,
        }
    }

    /// True when the function takes exactly one non-receiver argument.
    pub fn single_plain_arg(&self) -> bool {
        self.params.len() == 1
            || (self.params.len() == 2 && self.params.first().is_some_and(|p| p == "self"))
    }
}

/// Signals extracted from one source file.
#[derive(Debug, Clone, Default)]
pub struct FileSignals {
    pub functions: Vec<FunctionShape>,
    /// Class names in declaration order.
    pub classes: Vec<String>,
    /// Simple callee names of every call expression.
    pub calls: Vec<String>,
    /// Imported module paths (both plain and from-imports).
    pub imports: Vec<String>,
    /// Attribute names appearing as assignment targets (`obj.state = ...`).
    pub assigned_attrs: Vec<String>,
    /// True when any top-level function or class opens with a docstring.
    pub has_docstring: bool,
}

impl FileSignals {
    pub fn entity_count(&self) -> usize {
        self.functions.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty()
    }

    /// True when any file-level import references a pipeline module.
    pub fn imports_pipeline(&self) -> bool {
        self.imports.iter().any(|m| {
            let lower = m.to_lowercase();
            lower.contains("pipeline") || lower.contains("stage")
        })
    }
}
