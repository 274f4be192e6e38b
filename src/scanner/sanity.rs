//! Repo-wide sanity gate
//!
//! Decides whether task scoring may run at all. Only two conditions block:
//! a missing `project_map.yml` or `scoring_kpis.yml`, or a missing `src/`
//! with no source code anywhere else in the tree. Everything listed in the
//! repo contract beyond that is recorded as a warning, never a blocker.

use crate::config::{self, PROJECT_MAP_FILE, SCORING_KPIS_FILE};
use crate::models::SanityReport;
use crate::scanner::RepoScanner;

const CANONICAL_CHECKS: &[&str] = &[PROJECT_MAP_FILE, SCORING_KPIS_FILE, "src/"];

impl RepoScanner {
    /// Evaluate repo-level sanity checks. Never errors; missing files are
    /// failing checks, not failures of the gate itself.
    pub fn run_sanity_gate(&self) -> SanityReport {
        let mut report = SanityReport::default();
        let mut blocked = false;

        let project_map_ok = self.repo_path().join(PROJECT_MAP_FILE).exists();
        let scoring_ok = self.repo_path().join(SCORING_KPIS_FILE).exists();
        let src_ok = self.source_root().exists();

        report
            .details
            .insert(PROJECT_MAP_FILE.to_string(), project_map_ok);
        report
            .details
            .insert(SCORING_KPIS_FILE.to_string(), scoring_ok);
        report.details.insert("src/".to_string(), src_ok);

        if !project_map_ok || !scoring_ok {
            blocked = true;
        }

        // A missing src/ is only fatal when no code exists anywhere else;
        // otherwise the implementation KPIs can still run against the
        // discovered files.
        if !src_ok {
            let code_elsewhere = !self.gather_python_files().is_empty();
            report
                .details
                .insert("code_present_elsewhere".to_string(), code_elsewhere);
            if !code_elsewhere {
                blocked = true;
            }
        }

        if let Some(contract) = config::load_repo_contract(self.repo_path()) {
            for check in &contract.sanity_checks {
                if CANONICAL_CHECKS.contains(&check.as_str()) {
                    continue;
                }
                let ok = if let Some(dir) = check.strip_suffix('/') {
                    self.repo_path().join(dir).exists()
                } else if check == "checklist.yml" {
                    self.repo_path().join(check).exists()
                        || self.repo_path().join("docs").join(check).exists()
                } else {
                    self.repo_path().join(check).exists()
                };
                report.details.insert(check.clone(), ok);
            }
        }

        report.healthy = !blocked;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REPO_CONTRACT_FILE;
    use std::path::Path;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }

    fn healthy_repo(dir: &Path) {
        write(dir, PROJECT_MAP_FILE, "task_a: {}\n");
        write(dir, SCORING_KPIS_FILE, "score_weights: {}\n");
        write(dir, "src/core.py", "def run():\n    pass\n");
    }

    #[test]
    fn blocks_without_project_map() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        write(dir.path(), "src/core.py", "x = 1\n");
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert!(!report.healthy);
        assert_eq!(report.details.get(PROJECT_MAP_FILE), Some(&false));
    }

    #[test]
    fn blocks_without_scoring_config_regardless_of_contract() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PROJECT_MAP_FILE, "{}\n");
        write(dir.path(), "src/core.py", "x = 1\n");
        write(
            dir.path(),
            REPO_CONTRACT_FILE,
            "sanity_checks:\n  - docs/\n",
        );
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert!(!report.healthy);
    }

    #[test]
    fn missing_src_with_code_elsewhere_warns_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PROJECT_MAP_FILE, "{}\n");
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        write(dir.path(), "lib/alt.py", "x = 1\n");
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert!(report.healthy);
        assert_eq!(report.details.get("code_present_elsewhere"), Some(&true));
    }

    #[test]
    fn missing_src_with_no_code_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PROJECT_MAP_FILE, "{}\n");
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert!(!report.healthy);
        assert_eq!(report.details.get("code_present_elsewhere"), Some(&false));
    }

    #[test]
    fn extra_contract_checks_never_block() {
        let dir = tempfile::tempdir().unwrap();
        healthy_repo(dir.path());
        write(
            dir.path(),
            REPO_CONTRACT_FILE,
            "sanity_checks:\n  - docs/\n  - CHANGELOG.md\n",
        );
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert!(report.healthy);
        assert_eq!(report.details.get("docs/"), Some(&false));
        assert_eq!(report.details.get("CHANGELOG.md"), Some(&false));
    }

    #[test]
    fn checklist_found_in_docs() {
        let dir = tempfile::tempdir().unwrap();
        healthy_repo(dir.path());
        write(dir.path(), "docs/checklist.yml", "- item\n");
        write(
            dir.path(),
            REPO_CONTRACT_FILE,
            "sanity_checks:\n  - checklist.yml\n",
        );
        let report = RepoScanner::new(dir.path()).run_sanity_gate();
        assert_eq!(report.details.get("checklist.yml"), Some(&true));
    }
}
