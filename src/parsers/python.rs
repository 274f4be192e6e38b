//! Python signal extractor using tree-sitter
//!
//! Extracts function shapes, classes, calls, imports, and assignment
//! targets from Python source code.

use crate::parsers::{FileSignals, FunctionShape};
use anyhow::{Context, Result};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Extract signals from a Python file.
pub fn extract(path: &Path) -> Result<FileSignals> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    extract_source(&source)
}

/// Extract signals from Python source directly (useful for testing).
pub fn extract_source(source: &str) -> Result<FileSignals> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    parser
        .set_language(&language.into())
        .context("Failed to set Python language")?;

    let tree = parser
        .parse(source, None)
        .context("Failed to parse Python source")?;

    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut signals = FileSignals::default();
    signals.has_docstring = has_top_level_docstring(&root);

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "function_definition" => {
                signals.functions.push(function_shape(&node, bytes));
            }
            "class_definition" => {
                if let Some(name) = field_text(&node, "name", bytes) {
                    signals.classes.push(name);
                }
            }
            "call" => {
                if let Some(callee) = node
                    .child_by_field_name("function")
                    .and_then(|f| simple_name(&f, bytes))
                {
                    signals.calls.push(callee);
                }
            }
            "import_statement" => {
                collect_plain_imports(&node, bytes, &mut signals.imports);
            }
            "import_from_statement" => {
                if let Some(module) = field_text(&node, "module_name", bytes) {
                    signals.imports.push(module);
                }
            }
            "assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "attribute" {
                        if let Some(attr) = field_text(&left, "attribute", bytes) {
                            signals.assigned_attrs.push(attr);
                        }
                    }
                }
            }
            _ => {}
        }

        // Push children reversed so the stack pops in document order;
        // callers rely on "first matching function" semantics.
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }

    Ok(signals)
}

/// Build the shape of one function definition node.
fn function_shape(node: &Node, source: &[u8]) -> FunctionShape {
    let name = field_text(node, "name", source).unwrap_or_default();
    let params = extract_parameters(node.child_by_field_name("parameters"), source);
    let decorators = node
        .parent()
        .filter(|p| p.kind() == "decorated_definition")
        .map(|p| decorator_names(&p, source))
        .unwrap_or_default();

    let mut has_return = false;
    let mut has_bool_return = false;
    let mut stack = vec![*node];
    while let Some(n) = stack.pop() {
        if n.kind() == "return_statement" {
            has_return = true;
            if let Some(value) = n.named_child(0) {
                if matches!(
                    value.kind(),
                    "true" | "false" | "comparison_operator" | "boolean_operator" | "not_operator"
                ) {
                    has_bool_return = true;
                }
            }
        }
        let mut cursor = n.walk();
        for child in n.children(&mut cursor) {
            stack.push(child);
        }
    }

    FunctionShape {
        name,
        params,
        decorators,
        has_return,
        has_bool_return,
    }
}

/// Extract positional parameter names from a parameters node.
fn extract_parameters(params_node: Option<Node>, source: &[u8]) -> Vec<String> {
    let Some(node) = params_node else {
        return vec![];
    };

    let mut params = Vec::new();
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                if let Ok(text) = child.utf8_text(source) {
                    params.push(text.to_string());
                }
            }
            "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    if let Ok(text) = name_node.utf8_text(source) {
                        params.push(text.to_string());
                    }
                } else {
                    // Fallback: first identifier child
                    for grandchild in child.children(&mut child.walk()) {
                        if grandchild.kind() == "identifier" {
                            if let Ok(text) = grandchild.utf8_text(source) {
                                params.push(text.to_string());
                            }
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    params
}

/// Collect decorator names from a decorated_definition node.
fn decorator_names(decorated: &Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        if let Some(expr) = child.named_child(0) {
            if let Some(name) = simple_name(&expr, source) {
                names.push(name);
            } else if let Ok(text) = expr.utf8_text(source) {
                names.push(text.to_string());
            }
        }
    }
    names
}

/// Resolve an expression to its rightmost simple name: `a` -> `a`,
/// `pkg.mod.f` -> `f`, `f(...)` -> `f`.
fn simple_name(node: &Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => node.utf8_text(source).ok().map(|s| s.to_string()),
        "attribute" => node
            .child_by_field_name("attribute")
            .and_then(|n| n.utf8_text(source).ok())
            .map(|s| s.to_string()),
        "call" => node
            .child_by_field_name("function")
            .and_then(|f| simple_name(&f, source)),
        _ => None,
    }
}

fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.to_string())
}

/// Collect module names from `import a.b, c` statements.
fn collect_plain_imports(node: &Node, source: &[u8], out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                if let Ok(text) = child.utf8_text(source) {
                    out.push(text.to_string());
                }
            }
            "aliased_import" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(name);
                }
            }
            _ => {}
        }
    }
}

/// True when any top-level function or class opens with a docstring.
fn has_top_level_docstring(root: &Node) -> bool {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let def = match child.kind() {
            "function_definition" | "class_definition" => Some(child),
            "decorated_definition" => child.child_by_field_name("definition"),
            _ => None,
        };
        let Some(def) = def else { continue };
        if !matches!(def.kind(), "function_definition" | "class_definition") {
            continue;
        }
        if let Some(body) = def.child_by_field_name("body") {
            if let Some(first) = body.named_child(0) {
                if first.kind() == "expression_statement"
                    && first.named_child(0).is_some_and(|n| n.kind() == "string")
                {
                    return true;
                }
            }
        }
    }
    false
}
