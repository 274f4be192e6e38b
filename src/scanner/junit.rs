//! Test evidence aggregation from JUnit-style reports
//!
//! Parses `test-reports/*.xml` into an ordered pass/fail map and resolves
//! declared validation artifacts against it. Unresolved artifacts are
//! uncertain (neutral), not failures; only an explicit failing testcase
//! produces a negative verdict.

use crate::models::KpiValue;
use crate::scanner::RepoScanner;
use std::path::PathBuf;
use tracing::debug;

pub const TEST_REPORTS_DIR: &str = "test-reports";

/// Ordered pass/fail evidence keyed by `file::test`, `classname::test`, or
/// bare test name. Insertion order is report order, which drives
/// first-match resolution for file-level artifacts; re-inserting a key
/// updates it in place.
#[derive(Debug, Clone, Default)]
pub struct TestEvidence {
    entries: Vec<(String, bool)>,
}

impl TestEvidence {
    pub fn insert(&mut self, key: String, passed: bool) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = passed;
        } else {
            self.entries.push((key, passed));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Resolve one declared validation artifact to a verdict.
    ///
    /// `file::test` references try an exact key, then any key with the
    /// same `::test` suffix. Bare `.py` references match the first key
    /// whose file part matches. No match means uncertainty, never failure.
    pub fn resolve_artifact(&self, artifact: &str) -> KpiValue {
        if let Some((_, testname)) = artifact.split_once("::") {
            if let Some(passed) = self.get(artifact) {
                return KpiValue::from_bool(passed);
            }
            let suffix = format!("::{testname}");
            if let Some((_, passed)) = self.entries.iter().find(|(k, _)| k.ends_with(&suffix)) {
                return KpiValue::from_bool(*passed);
            }
            return KpiValue::Partial;
        }

        if artifact.ends_with(".py") {
            for (key, passed) in &self.entries {
                let file_part = key.split("::").next().unwrap_or(key);
                if key.starts_with(artifact) || file_part.ends_with(artifact) {
                    return KpiValue::from_bool(*passed);
                }
            }
            return KpiValue::Partial;
        }

        KpiValue::Partial
    }

    /// Aggregate the test-referencing artifacts of one task into the
    /// TESTS_PASS KPI: all pass => satisfied, any explicit failure =>
    /// unsatisfied, anything unresolved => partial.
    pub fn tests_kpi(&self, validation_artifacts: &[String]) -> KpiValue {
        let required: Vec<&String> = validation_artifacts
            .iter()
            .filter(|a| a.contains("::") || a.ends_with(".py"))
            .collect();
        if required.is_empty() {
            return KpiValue::Partial;
        }

        let verdicts: Vec<KpiValue> = required
            .iter()
            .map(|a| self.resolve_artifact(a))
            .collect();
        if verdicts.iter().all(|v| *v == KpiValue::Satisfied) {
            KpiValue::Satisfied
        } else if verdicts.iter().any(|v| *v == KpiValue::Unsatisfied) {
            KpiValue::Unsatisfied
        } else {
            KpiValue::Partial
        }
    }
}

impl RepoScanner {
    /// Parse every JUnit-style XML report under `test-reports/`.
    ///
    /// A testcase fails when it carries any `failure`/`error`/`skipped`
    /// child. Malformed reports are skipped, not fatal.
    pub fn parse_junit_reports(&self) -> TestEvidence {
        let mut evidence = TestEvidence::default();
        let reports_dir = self.repo_path().join(TEST_REPORTS_DIR);
        if !reports_dir.exists() {
            return evidence;
        }

        let mut reports: Vec<PathBuf> = match std::fs::read_dir(&reports_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("xml"))
                .collect(),
            Err(_) => return evidence,
        };
        reports.sort();

        for report in reports {
            let Ok(text) = std::fs::read_to_string(&report) else {
                continue;
            };
            let doc = match roxmltree::Document::parse(&text) {
                Ok(doc) => doc,
                Err(err) => {
                    debug!(report = %report.display(), error = %err, "skipping malformed report");
                    continue;
                }
            };

            for testcase in doc
                .descendants()
                .filter(|n| n.has_tag_name("testcase"))
            {
                let name = testcase.attribute("name").unwrap_or("");
                let classname = testcase.attribute("classname").unwrap_or("");
                let file_attr = testcase.attribute("file").unwrap_or("");

                let key = if !file_attr.is_empty() {
                    format!("{file_attr}::{name}")
                } else if !classname.is_empty() {
                    format!("{classname}::{name}")
                } else {
                    name.to_string()
                };

                let passed = !testcase.children().filter(|c| c.is_element()).any(|c| {
                    matches!(
                        c.tag_name().name().to_lowercase().as_str(),
                        "failure" | "error" | "skipped"
                    )
                });

                if !key.is_empty() {
                    evidence.insert(key, passed);
                }
            }
        }

        evidence
    }
}
