//! Multi-repo aggregation
//!
//! Drives one scanner per repository, strictly sequentially and in caller
//! order: each repo's dependency resolution runs against the aggregate
//! built so far, so earlier repos can satisfy later repos' dependencies.
//! Parallel scanning would silently change that contract.

pub mod deps;
mod history;

pub use history::{render_sparkline, save_index, save_index_with_history, DEFAULT_HISTORY_LEN};

use crate::models::{ArtifactAge, RepoIndex, RepoIndexEntry, TaskStatus};
use crate::scanner::{RepoScanner, TEST_REPORTS_DIR};
use crate::scoring::{self, ScoringOutcome};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{info, warn};

/// A task counts as done at or above this final score.
pub const DONE_THRESHOLD: i64 = 80;

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Record the newest artifact modification time per repo.
    pub include_timestamps: bool,
}

/// Scan every repository and fold the results into one index.
///
/// A repo that fails its sanity gate is recorded as a sentinel entry and
/// skipped for dependency resolution.
pub fn aggregate_all(repo_paths: &[PathBuf], options: &AggregateOptions) -> RepoIndex {
    let mut aggregated = RepoIndex::new();

    for repo_path in repo_paths {
        let scanner = RepoScanner::new(repo_path);
        let repo_name = scanner
            .repo_path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| scanner.repo_path().to_string_lossy().to_string());

        let outcome = scoring::scoring_loop(&scanner);
        let deltas = scanner.version_and_drift(None);

        let entry = match outcome {
            ScoringOutcome::UnableToScore {
                explanation,
                sanity,
            } => {
                warn!(repo = %repo_name, "sanity gate failed, recording sentinel");
                RepoIndexEntry {
                    repo_path: scanner.repo_path().to_string_lossy().to_string(),
                    status: Some(scoring::UNABLE_TO_SCORE.to_string()),
                    explanation: Some(explanation),
                    sanity: Some(sanity.details),
                    deltas,
                    ..Default::default()
                }
            }
            ScoringOutcome::Scored(scoring) => {
                let tasks: std::collections::BTreeMap<String, TaskStatus> = scoring
                    .iter()
                    .map(|(tid, res)| {
                        let status = if res.final_score >= DONE_THRESHOLD {
                            "done"
                        } else {
                            "pending"
                        };
                        (
                            tid.clone(),
                            TaskStatus {
                                final_score: res.final_score,
                                status: status.to_string(),
                            },
                        )
                    })
                    .collect();

                // Resolve dependencies against the aggregate built so far.
                let view = serde_yaml::to_value(&aggregated)
                    .unwrap_or(serde_yaml::Value::Null);
                let dependencies = scoring
                    .keys()
                    .map(|tid| {
                        (
                            tid.clone(),
                            deps::check_dependencies(&scanner, tid, &view),
                        )
                    })
                    .collect();

                let artifact_age = options
                    .include_timestamps
                    .then(|| collect_artifact_age(&scanner, &scoring));

                info!(repo = %repo_name, tasks = scoring.len(), "repo scored");
                RepoIndexEntry {
                    repo_path: scanner.repo_path().to_string_lossy().to_string(),
                    tasks,
                    scoring,
                    deltas,
                    dependencies,
                    artifact_age,
                    ..Default::default()
                }
            }
        };

        aggregated.insert(repo_name, entry);
    }

    aggregated
}

/// Newest modification time across implementation files and test reports.
fn collect_artifact_age(
    scanner: &RepoScanner,
    scoring: &std::collections::BTreeMap<String, crate::models::TaskScoreResult>,
) -> ArtifactAge {
    let mut times: Vec<i64> = Vec::new();

    for result in scoring.values() {
        for file in &result.details.impl_files {
            if let Some(epoch) = mtime_epoch(Path::new(file)) {
                times.push(epoch);
            }
        }
    }

    let reports_dir = scanner.repo_path().join(TEST_REPORTS_DIR);
    if let Ok(entries) = std::fs::read_dir(&reports_dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|x| x.to_str()) == Some("xml") {
                if let Some(epoch) = mtime_epoch(&path) {
                    times.push(epoch);
                }
            }
        }
    }

    match times.into_iter().max() {
        Some(last_mod_epoch) => ArtifactAge {
            last_mod_epoch: Some(last_mod_epoch),
            source: Some("mtime".to_string()),
        },
        None => ArtifactAge::default(),
    }
}

fn mtime_epoch(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(epoch.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PROJECT_MAP_FILE, SCORING_KPIS_FILE};

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }

    /// A repo whose single task scores full marks on one weighted KPI.
    fn passing_repo(dir: &Path, task_id: &str, deps: &str) {
        write(
            dir,
            PROJECT_MAP_FILE,
            &format!(
                "{task_id}:\n  implementation_files:\n    - src/{task_id}.py\n  dependencies:{deps}\n"
            ),
        );
        write(
            dir,
            SCORING_KPIS_FILE,
            "score_weights:\n  CODE_ARTIFACT_PRESENT: 100\n",
        );
        write(
            dir,
            &format!("src/{task_id}.py"),
            "def run_stage(x):\n    return x\n",
        );
    }

    #[test]
    fn sentinel_recorded_for_unhealthy_repo() {
        let dir = tempfile::tempdir().unwrap();
        let index = aggregate_all(
            &[dir.path().to_path_buf()],
            &AggregateOptions::default(),
        );
        let entry = index.values().next().unwrap();
        assert_eq!(entry.status.as_deref(), Some(scoring::UNABLE_TO_SCORE));
        assert!(entry.scoring.is_empty());
        assert!(entry.dependencies.is_empty());
    }

    #[test]
    fn earlier_repo_satisfies_later_dependency() {
        let parent = tempfile::tempdir().unwrap();
        let repo_a = parent.path().join("repo_a");
        let repo_b = parent.path().join("repo_b");
        std::fs::create_dir_all(&repo_a).unwrap();
        std::fs::create_dir_all(&repo_b).unwrap();
        passing_repo(&repo_a, "upstream", " []");
        passing_repo(&repo_b, "downstream", "\n    - upstream");

        let index = aggregate_all(
            &[repo_a.clone(), repo_b.clone()],
            &AggregateOptions::default(),
        );

        let a = &index["repo_a"];
        assert_eq!(a.tasks["upstream"].status, "done");
        assert!(a.tasks["upstream"].final_score >= DONE_THRESHOLD);

        let b = &index["repo_b"];
        let dep_report = &b.dependencies["downstream"];
        assert!(dep_report.ok, "dependency should resolve: {dep_report:?}");
        assert_eq!(
            dep_report.details["upstream"].repo.as_deref(),
            Some("repo_a")
        );
    }

    #[test]
    fn reversed_order_leaves_dependency_unresolved() {
        let parent = tempfile::tempdir().unwrap();
        let repo_a = parent.path().join("repo_a");
        let repo_b = parent.path().join("repo_b");
        std::fs::create_dir_all(&repo_a).unwrap();
        std::fs::create_dir_all(&repo_b).unwrap();
        passing_repo(&repo_a, "upstream", " []");
        passing_repo(&repo_b, "downstream", "\n    - upstream");

        // repo_b scanned first: the aggregate holds nothing yet
        let index = aggregate_all(
            &[repo_b.clone(), repo_a.clone()],
            &AggregateOptions::default(),
        );
        assert!(!index["repo_b"].dependencies["downstream"].ok);
    }

    #[test]
    fn timestamps_recorded_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        passing_repo(dir.path(), "solo", " []");
        let index = aggregate_all(
            &[dir.path().to_path_buf()],
            &AggregateOptions {
                include_timestamps: true,
            },
        );
        let age = index.values().next().unwrap().artifact_age.as_ref().unwrap();
        assert_eq!(age.source.as_deref(), Some("mtime"));
        assert!(age.last_mod_epoch.unwrap() > 0);
    }
}
