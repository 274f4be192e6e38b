//! Complexity profiling
//!
//! Normalizes task-scoped signal counts against repo-wide totals into a
//! weighted 0-100 score. The profile is a relative statistic: each metric
//! is min-max scaled against the repository total before weighting, so a
//! task is judged against the codebase it lives in, not an absolute bar.

use crate::config::ComplexityConfig;
use crate::models::{ComplexityDetails, ComplexityTotals, ScaledComplexity};
use crate::parsers;
use crate::scanner::RepoScanner;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
struct RawCounts {
    functions: usize,
    classes: usize,
    pipeline_stages: usize,
    validators: usize,
    adapters: usize,
    max_depth: usize,
}

fn scale(count: usize, total: usize) -> i64 {
    let denom = total.max(1) as f64;
    ((count as f64 / denom) * 100.0).round().min(100.0) as i64
}

impl RepoScanner {
    /// Compute the complexity profile for a task's file scope.
    ///
    /// Returns the weighted 0-100 score plus the per-metric breakdown.
    /// Bucketization into a KPI happens in the scoring engine.
    pub fn compute_complexity_profile(
        &self,
        impl_files: &[PathBuf],
        config: &ComplexityConfig,
    ) -> (i64, ComplexityDetails) {
        let scope: Vec<PathBuf> = if impl_files.is_empty() {
            self.gather_python_files()
        } else {
            let mut seen = std::collections::BTreeSet::new();
            impl_files
                .iter()
                .filter(|p| p.exists())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("py"))
                .filter(|p| seen.insert((*p).clone()))
                .cloned()
                .collect()
        };

        let task = self.count_scope(&scope);
        let repo = self.count_scope(&self.gather_python_files());

        let totals = ComplexityTotals {
            functions: repo.functions,
            classes: repo.classes,
            pipeline_stages: repo.pipeline_stages,
            validators: repo.validators,
            adapters: repo.adapters,
            module_depth: repo.max_depth,
        };

        let scaled = ScaledComplexity {
            pipeline_stage: scale(task.pipeline_stages, totals.pipeline_stages),
            validators: scale(task.validators, totals.validators),
            adapters: scale(task.adapters, totals.adapters),
            functions: scale(task.functions, totals.functions),
            classes: scale(task.classes, totals.classes),
            module_depth: scale(task.max_depth, totals.module_depth),
        };

        let w_pipeline = config.weight("pipeline", 30);
        let w_validators = config.weight("validators", 25);
        let w_functions = config.weight("functions", 15);
        let w_classes = config.weight("classes", 10);
        let w_adapters = config.weight("adapters", 10);
        let w_depth = config.weight("depth", 10);

        let total_w =
            (w_pipeline + w_validators + w_functions + w_classes + w_adapters + w_depth) as f64;
        let weighted_sum = (scaled.pipeline_stage * w_pipeline
            + scaled.validators * w_validators
            + scaled.functions * w_functions
            + scaled.classes * w_classes
            + scaled.adapters * w_adapters
            + scaled.module_depth * w_depth) as f64;

        let score = if total_w > 0.0 {
            (weighted_sum / total_w).round().min(100.0) as i64
        } else {
            0
        };

        let details = ComplexityDetails {
            pipeline_stage_count: task.pipeline_stages,
            validator_count: task.validators,
            adapter_count: task.adapters,
            function_count: task.functions,
            class_count: task.classes,
            module_depth: task.max_depth,
            scaled,
            repo_totals: totals,
        };
        (score, details)
    }

    fn count_scope(&self, files: &[PathBuf]) -> RawCounts {
        let mut counts = RawCounts::default();
        for path in files {
            counts.max_depth = counts.max_depth.max(self.relative_depth(path));

            let Ok(file) = parsers::extract_file(path) else {
                continue;
            };

            for func in &file.functions {
                counts.functions += 1;
                let name = func.name.to_lowercase();
                let staged = name.contains("stage")
                    || name.contains("pipeline")
                    || func.decorators.iter().any(|d| {
                        let d = d.to_lowercase();
                        d.contains("stage") || d.contains("pipeline")
                    });
                if staged {
                    counts.pipeline_stages += 1;
                }
                if name.contains("validate") {
                    counts.validators += 1;
                }
            }
            for class in &file.classes {
                counts.classes += 1;
                let name = class.to_lowercase();
                if name.contains("validator") || name.contains("validate") {
                    counts.validators += 1;
                }
                if name.contains("adapter") {
                    counts.adapters += 1;
                }
            }
            for callee in &file.calls {
                let name = callee.to_lowercase();
                if name.contains("validate") || name.contains("schema") {
                    counts.validators += 1;
                }
            }

            let fname = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if fname == "validators.py" || fname.ends_with("_validators.py") {
                counts.validators += 1;
            }
        }
        counts
    }

    fn relative_depth(&self, path: &Path) -> usize {
        let rel = path.strip_prefix(self.repo_path()).unwrap_or(path);
        rel.components().count().saturating_sub(1)
    }
}
