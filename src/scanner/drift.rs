//! Version and drift detection
//!
//! Hashes every declared implementation file and classifies each against a
//! caller-supplied prior hash map. A file absent from the prior map counts
//! as changed, not added; internal failures yield an empty report.

use crate::config;
use crate::models::{ArtifactHash, DriftDetail, DriftReport};
use crate::scanner::RepoScanner;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::warn;

impl RepoScanner {
    /// Compare current artifact hashes against `last_hashes`.
    pub fn version_and_drift(
        &self,
        last_hashes: Option<&BTreeMap<String, String>>,
    ) -> DriftReport {
        let mut report = DriftReport::default();

        let pm = match config::load_project_map(self.repo_path()) {
            Ok(pm) => pm,
            Err(err) => {
                warn!(error = %err, "drift detection skipped, project map unavailable");
                return report;
            }
        };

        for path in self.tracked_files(&pm) {
            let key = path.to_string_lossy().to_string();
            let current = self.hash_artifact(&path);
            let previous = last_hashes.and_then(|m| m.get(&key)).cloned();

            match &current {
                ArtifactHash::Missing => report.missing.push(key.clone()),
                ArtifactHash::Present(digest) => match &previous {
                    None => report.changed.push(key.clone()),
                    Some(prev) if prev != digest => report.changed.push(key.clone()),
                    Some(_) => report.unchanged.push(key.clone()),
                },
            }

            report.details.insert(key, DriftDetail { previous, current });
        }

        report
    }

    /// Current digests of every declared implementation file that exists,
    /// keyed by resolved path. This is the baseline consumed by a later
    /// drift check.
    pub fn current_artifact_hashes(&self) -> BTreeMap<String, String> {
        let Ok(pm) = config::load_project_map(self.repo_path()) else {
            return BTreeMap::new();
        };
        self.tracked_files(&pm)
            .into_iter()
            .filter_map(|path| match self.hash_artifact(&path) {
                ArtifactHash::Present(digest) => {
                    Some((path.to_string_lossy().to_string(), digest))
                }
                ArtifactHash::Missing => None,
            })
            .collect()
    }

    fn tracked_files(&self, pm: &config::ProjectMap) -> Vec<PathBuf> {
        let set: BTreeSet<PathBuf> = pm
            .values()
            .flat_map(|entry| entry.implementation_files.iter())
            .map(|f| self.resolve(f))
            .collect();
        set.into_iter().collect()
    }
}
