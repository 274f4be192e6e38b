//! Cross-repo dependency resolution
//!
//! Resolves a task's declared dependencies against an aggregate index. The
//! index shape is deliberately flexible — a dependency id may appear as a
//! direct top-level status or inside any repo entry's nested task-status
//! map — so partially-built aggregates and hand-written indices both
//! resolve the same way.

use crate::config;
use crate::models::{DependencyDetail, DependencyReport};
use crate::scanner::RepoScanner;

/// Status string that satisfies a dependency. Nothing else does.
const SATISFIED_STATUS: &str = "done";

/// Check every declared dependency of `task_id` against `repos_index`.
///
/// No dependencies is trivially satisfied. Each dependency is satisfied
/// iff it is found and its status is exactly `done`.
pub fn check_dependencies(
    scanner: &RepoScanner,
    task_id: &str,
    repos_index: &serde_yaml::Value,
) -> DependencyReport {
    let pm = match config::load_project_map(scanner.repo_path()) {
        Ok(pm) => pm,
        Err(err) => {
            return DependencyReport {
                ok: false,
                error: Some(err.to_string()),
                ..Default::default()
            };
        }
    };

    let deps = pm
        .get(task_id)
        .map(|entry| entry.dependencies.clone())
        .unwrap_or_default();

    if deps.is_empty() {
        return DependencyReport {
            ok: true,
            message: Some("no dependencies".to_string()),
            ..Default::default()
        };
    }

    let mut report = DependencyReport {
        ok: true,
        ..Default::default()
    };
    for dep in deps {
        let (found, status, repo) = find_dependency(repos_index, &dep);
        let satisfied = found && status.as_deref() == Some(SATISFIED_STATUS);
        if !satisfied {
            report.ok = false;
        }
        report.details.insert(
            dep,
            DependencyDetail {
                found,
                status,
                repo,
                satisfied,
            },
        );
    }
    report
}

/// Locate a dependency id in the index: direct top-level entry first, then
/// each repo entry's `task_details`/`tasks` map.
fn find_dependency(
    index: &serde_yaml::Value,
    dep: &str,
) -> (bool, Option<String>, Option<String>) {
    let Some(mapping) = index.as_mapping() else {
        return (false, None, None);
    };

    if let Some(direct) = mapping.get(dep) {
        if let Some(status) = direct.as_str() {
            return (true, Some(status.to_string()), None);
        }
        if let Some(entry) = direct.as_mapping() {
            if let Some(status) = entry.get("status") {
                return (true, status.as_str().map(|s| s.to_string()), None);
            }
        }
    }

    for (repo_name, repo_val) in mapping {
        let Some(repo_map) = repo_val.as_mapping() else {
            continue;
        };
        let tasks = repo_map
            .get("task_details")
            .or_else(|| repo_map.get("tasks"));
        let Some(tasks) = tasks.and_then(|t| t.as_mapping()) else {
            continue;
        };
        if let Some(entry) = tasks.get(dep) {
            let repo = repo_name.as_str().map(|s| s.to_string());
            if let Some(status) = entry.as_str() {
                return (true, Some(status.to_string()), repo);
            }
            if let Some(status) = entry.as_mapping().and_then(|m| m.get("status")) {
                return (true, status.as_str().map(|s| s.to_string()), repo);
            }
        }
    }

    (false, None, None)
}
