//! Structural analysis
//!
//! Derives module/folder counts and a presence map over seven expected
//! structural markers, then folds declared and inferred completeness into
//! a single percentage.

use crate::config::ProjectMap;
use crate::models::StructureSignals;
use crate::scanner::RepoScanner;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// The seven structural markers reported in the presence map.
const EXPECTED_ITEMS: &[&str] = &[
    "src/",
    "pipelines/",
    "adapters/",
    "validators/",
    "tests/",
    "schemas/",
    "cli_entry",
];

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

impl RepoScanner {
    /// Collect structural signals and compute the structure-completeness
    /// percentage.
    ///
    /// File scope priority: explicit `impl_files` > declared files that
    /// exist > discovered files under `src/` > every Python file in the
    /// repo.
    pub fn scan_structure(
        &self,
        pm: &ProjectMap,
        impl_files: Option<&[PathBuf]>,
    ) -> StructureSignals {
        let py_files: Vec<PathBuf> = match impl_files {
            Some(files) if !files.is_empty() => {
                files.iter().filter(|p| p.exists()).cloned().collect()
            }
            _ => self.fallback_scope(pm),
        };

        let mut signals = StructureSignals {
            module_count: py_files.len(),
            ..Default::default()
        };

        let mut folders = BTreeSet::new();
        for f in &py_files {
            let parent = f.parent().unwrap_or(Path::new(""));
            let rel = parent
                .strip_prefix(self.repo_path())
                .unwrap_or(parent)
                .to_string_lossy()
                .to_string();
            folders.insert(rel);
        }
        signals.folder_count = folders.len();

        let lower_paths: Vec<String> = py_files
            .iter()
            .map(|p| p.to_string_lossy().to_lowercase())
            .collect();
        let lower_names: Vec<String> = py_files.iter().map(|p| file_name_lower(p)).collect();

        let present = &mut signals.present;
        present.insert("src/".to_string(), self.source_root().exists());
        present.insert(
            "pipelines/".to_string(),
            lower_paths
                .iter()
                .any(|p| p.contains("pipeline") || p.contains("stages")),
        );
        present.insert(
            "adapters/".to_string(),
            lower_names.iter().any(|n| n.contains("adapter"))
                || lower_paths.iter().any(|p| p.contains("/adapters/")),
        );
        present.insert(
            "validators/".to_string(),
            lower_names
                .iter()
                .any(|n| n.contains("validator") || n.contains("validate")),
        );
        present.insert(
            "tests/".to_string(),
            self.repo_path().join(super::TEST_REPORTS_DIR).exists()
                || lower_names
                    .iter()
                    .any(|n| n.contains("test_") || n.starts_with("test")),
        );
        present.insert("schemas/".to_string(), self.has_schema_file());
        present.insert(
            "cli_entry".to_string(),
            lower_names
                .iter()
                .any(|n| n == "cli.py" || n == "main.py" || n == "__main__.py"),
        );
        debug_assert!(EXPECTED_ITEMS.iter().all(|k| present.contains_key(*k)));

        // Declared completeness plus inferred completeness, capped at 100.
        let declared_files: Vec<PathBuf> = pm
            .values()
            .flat_map(|entry| entry.implementation_files.iter())
            .map(|f| self.resolve(f))
            .collect();
        let declared_found = declared_files.iter().filter(|p| p.exists()).count();
        let total_declared = declared_files.len();
        let discovered = self.discover_impl_files(&declared_files);

        let declared_ratio = if total_declared > 0 {
            declared_found as f64 / total_declared as f64
        } else {
            0.0
        };
        let inferred_ratio = if discovered.is_empty() { 0.0 } else { 1.0 };
        let combined = (declared_ratio + inferred_ratio).min(1.0);
        let mut percent = (combined * 100.0).round() as i64;

        // Missing metadata must not fully penalize structure: when nothing
        // is declared but code exists, the percentage floors at neutral.
        if total_declared == 0 && !py_files.is_empty() && percent < 50 {
            percent = 50;
        }
        signals.percent_structure_complete = percent;

        signals
    }

    fn fallback_scope(&self, pm: &ProjectMap) -> Vec<PathBuf> {
        let declared: Vec<PathBuf> = pm
            .values()
            .flat_map(|entry| entry.implementation_files.iter())
            .map(|f| self.resolve(f))
            .collect();

        let mut scope: Vec<PathBuf> = declared.iter().filter(|p| p.exists()).cloned().collect();
        if scope.is_empty() {
            scope = self
                .discover_impl_files(&declared)
                .into_iter()
                .filter(|p| p.exists())
                .collect();
        }
        if scope.is_empty() {
            scope = self.gather_python_files();
        }
        scope
    }

    /// Any schema-like file (json/yaml with "schema" in the name) anywhere
    /// in the repository.
    fn has_schema_file(&self) -> bool {
        let walker = ignore::WalkBuilder::new(self.repo_path())
            .standard_filters(false)
            .build();
        walker
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .any(|e| {
                let ext = e
                    .path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .unwrap_or("");
                matches!(ext, "json" | "yaml" | "yml")
                    && file_name_lower(e.path()).contains("schema")
            })
    }
}
