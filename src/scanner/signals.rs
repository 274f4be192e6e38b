//! Implementation signal scanning
//!
//! Name- and shape-based heuristics over extracted file signals. Detection
//! is best-effort: a file that fails to parse contributes nothing and the
//! scan continues.

use crate::models::ImplementationSignals;
use crate::parsers::{self, FunctionShape};
use crate::scanner::RepoScanner;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Decorator names that mark a state-transition function.
const TRANSITION_DECORATORS: &[&str] = &[
    "state_transition",
    "transition",
    "state_change",
    "transition_decorator",
];

/// Well-known helper calls that apply a state change.
const TRANSITION_CALLS: &[&str] = &[
    "set_state",
    "change_state",
    "next_state",
    "transition_state",
    "apply_state",
    "apply_changes",
];

/// Parameter names suggesting a function receives a state to transform.
const STATE_PARAMS: &[&str] = &["state", "old_state", "current_state"];

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_validators_module(path: &Path) -> bool {
    let name = file_name_lower(path);
    name == "validators.py" || name.ends_with("_validators.py")
}

fn is_pipeline_stage(func: &FunctionShape) -> bool {
    let name = func.name.to_lowercase();
    name.contains("stage")
        || name.contains("pipeline")
        || func.decorators.iter().any(|d| {
            let d = d.to_lowercase();
            d.contains("stage") || d.contains("pipeline")
        })
}

impl RepoScanner {
    /// Scan a task's file scope for implementation signals.
    ///
    /// With an empty scope the scan widens to every Python file in the
    /// repository.
    pub fn scan_implementation_signals(
        &self,
        impl_files: &[PathBuf],
        task_id: &str,
    ) -> ImplementationSignals {
        let py_files: Vec<PathBuf> = if impl_files.is_empty() {
            self.gather_python_files()
        } else {
            impl_files.iter().filter(|p| p.exists()).cloned().collect()
        };

        let tid_lower = task_id.to_lowercase();
        let mut signals = ImplementationSignals::default();

        for path in &py_files {
            let file = match parsers::extract_file(path) {
                Ok(f) => f,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unparsable file");
                    continue;
                }
            };

            if is_validators_module(path) {
                signals.validators_detected += 1;
            }

            let mut file_has_impl = false;

            for func in &file.functions {
                signals.functions_found += 1;
                file_has_impl = true;
                let name = func.name.to_lowercase();

                if is_pipeline_stage(func) {
                    signals.pipeline_stages_detected += 1;
                }
                if !tid_lower.is_empty() && name.contains(&tid_lower) {
                    signals.modules_found += 1;
                }
                // Validator heuristics: named *validate*, or a one-argument
                // function with a boolean-shaped return.
                if name.contains("validate") {
                    signals.validators_detected += 1;
                } else if func.single_plain_arg() && func.has_bool_return {
                    signals.validators_detected += 1;
                }
            }

            for class in &file.classes {
                signals.classes_found += 1;
                file_has_impl = true;
                let name = class.to_lowercase();
                if name.contains("validator") || name.contains("validate") {
                    signals.validators_detected += 1;
                }
                if name.contains("adapter") {
                    signals.adapters_detected += 1;
                }
            }

            for callee in &file.calls {
                let name = callee.to_lowercase();
                if name.contains("validate") || name.contains("schema") {
                    signals.validators_detected += 1;
                }
            }

            if file_has_impl
                && !tid_lower.is_empty()
                && file_name_lower(path).contains(&tid_lower)
            {
                signals.modules_found += 1;
            }

            if file.imports_pipeline() {
                signals.pipeline_stages_detected += 1;
            }
        }

        signals.modules_found = signals.modules_found.min(py_files.len());
        signals
    }

    /// Detect a state-transition implementation in the given files.
    ///
    /// One signal suffices; files are scanned in order and the scan stops
    /// at the first hit. Returns the verdict plus per-file diagnostics.
    pub fn check_state_transition(&self, impl_files: &[PathBuf]) -> (bool, Vec<String>) {
        let mut diagnostics = Vec::new();

        for path in impl_files {
            if !path.exists() {
                diagnostics.push(format!("missing:{}", path.display()));
                continue;
            }
            let file = match parsers::extract_file(path) {
                Ok(f) => f,
                Err(err) => {
                    diagnostics.push(format!("parse_error:{}:{err}", path.display()));
                    continue;
                }
            };

            for func in &file.functions {
                if func.name.to_lowercase().contains("transition") {
                    diagnostics.push(format!("found_function:{}@{}", func.name, path.display()));
                    return (true, diagnostics);
                }
                if func
                    .decorators
                    .iter()
                    .any(|d| TRANSITION_DECORATORS.contains(&d.as_str()))
                {
                    diagnostics.push(format!(
                        "decorator_state_transition:{}@{}",
                        func.name,
                        path.display()
                    ));
                    return (true, diagnostics);
                }
                if func.has_return
                    && func
                        .params
                        .iter()
                        .any(|p| STATE_PARAMS.contains(&p.as_str()))
                {
                    diagnostics.push(format!(
                        "func_with_state_param_and_return:{}@{}",
                        func.name,
                        path.display()
                    ));
                    return (true, diagnostics);
                }
            }

            if file
                .assigned_attrs
                .iter()
                .any(|a| a == "state" || a == "status")
            {
                diagnostics.push(format!("assign_attr_state:{}", path.display()));
                return (true, diagnostics);
            }

            if let Some(call) = file
                .calls
                .iter()
                .find(|c| TRANSITION_CALLS.contains(&c.as_str()))
            {
                diagnostics.push(format!("call_transition_helper:{call}@{}", path.display()));
                return (true, diagnostics);
            }
        }

        (false, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn counts_pipeline_and_validator_signals() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/ingest.py",
            r#"
def ingest_stage(batch):
    return batch

def validate_batch(batch):
    return True

def is_ready(batch):
    return batch is not None

class PayloadAdapter:
    pass

class BatchValidator:
    pass
"#,
        );
        let scanner = RepoScanner::new(dir.path());
        let signals = scanner.scan_implementation_signals(&[file], "ingest");
        assert_eq!(signals.functions_found, 3);
        assert_eq!(signals.classes_found, 2);
        assert_eq!(signals.pipeline_stages_detected, 1);
        // validate_batch by name, is_ready by shape, BatchValidator by class
        assert_eq!(signals.validators_detected, 3);
        assert_eq!(signals.adapters_detected, 1);
        // ingest_stage matches the task id, and so does the file name
        assert_eq!(signals.modules_found, 1);
    }

    #[test]
    fn validators_module_name_adds_signal() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "src/order_validators.py", "def helper(a, b):\n    pass\n");
        let scanner = RepoScanner::new(dir.path());
        let signals = scanner.scan_implementation_signals(&[file], "order");
        assert_eq!(signals.validators_detected, 1);
    }

    #[test]
    fn pipeline_import_adds_stage_signal() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/link.py",
            "import pipelines.core\n\ndef bind(x, y):\n    pass\n",
        );
        let scanner = RepoScanner::new(dir.path());
        let signals = scanner.scan_implementation_signals(&[file], "link");
        assert_eq!(signals.pipeline_stages_detected, 1);
    }

    #[test]
    fn state_transition_by_function_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/flow.py",
            "def transition_order(order):\n    return order\n",
        );
        let scanner = RepoScanner::new(dir.path());
        let (found, diags) = scanner.check_state_transition(&[file]);
        assert!(found);
        assert!(diags[0].starts_with("found_function:"));
    }

    #[test]
    fn state_transition_by_attribute_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/flow.py",
            "def finish(order):\n    order.state = \"done\"\n",
        );
        let scanner = RepoScanner::new(dir.path());
        let (found, _) = scanner.check_state_transition(&[file]);
        assert!(found);
    }

    #[test]
    fn state_transition_by_helper_call() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/flow.py",
            "def finish(order):\n    apply_changes(order)\n",
        );
        let scanner = RepoScanner::new(dir.path());
        let (found, _) = scanner.check_state_transition(&[file]);
        assert!(found);
    }

    #[test]
    fn no_transition_construct_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "src/flow.py",
            "def compute(a, b):\n    return a + b\n",
        );
        let scanner = RepoScanner::new(dir.path());
        let (found, diags) = scanner.check_state_transition(&[file]);
        assert!(!found);
        assert!(diags.is_empty());
    }
}
