//! KPI scoring & gate engine
//!
//! Computes per-task scores through a deterministic cascade:
//!
//! ```text
//! resolve file scope -> compute KPIs -> bucketize -> pre_gate (weighted)
//!   -> progress / compliance split -> gates (caps, downward only)
//!   -> done_contract enforcement (hard zero / cap 50)
//!   -> combined (group-weighted) -> final (task-type multiplier)
//! ```
//!
//! The central policy: absence of evidence is neutral, never a failure.
//! Only an affirmative negative signal — an explicit failing test, an
//! explicitly unsatisfied done-contract KPI — can force a zero. Gates and
//! contracts act on the compliance side; `progress_score` reflects raw
//! implementation evidence and is never capped.

use crate::config::{self, ScoringConfig, TaskEntry};
use crate::models::{
    ImplementationSignals, KpiValue, SanityReport, TaskScoreDetails, TaskScoreResult,
};
use crate::scanner::{RepoScanner, TestEvidence};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// KPI names understood by the engine.
pub mod kpi {
    pub const STRUCTURAL_COMPLETENESS: &str = "STRUCTURAL_COMPLETENESS";
    pub const IMPLEMENTATION_COMPLETENESS: &str = "IMPLEMENTATION_COMPLETENESS";
    pub const PIPELINE_STAGE_COMPLETENESS: &str = "PIPELINE_STAGE_COMPLETENESS";
    pub const VALIDATOR_COMPLETENESS: &str = "VALIDATOR_COMPLETENESS";
    pub const CODE_ARTIFACT_PRESENT: &str = "CODE_ARTIFACT_PRESENT";
    pub const TESTS_PASS: &str = "TESTS_PASS";
    pub const SPEC_COVERAGE: &str = "SPEC_COVERAGE";
    pub const COMPLEXITY_PROFILE: &str = "COMPLEXITY_PROFILE";
    pub const DOCUMENTATION: &str = "DOCUMENTATION";
    pub const SANITY_GATE: &str = "SANITY_GATE";
    pub const STATE_TRANSITION: &str = "STATE_TRANSITION";
    pub const DEPENDENCY_FULFILLED: &str = "DEPENDENCY_FULFILLED";
}

/// Implementation-signal KPIs: "is the code there".
const DEFAULT_PROGRESS_KPIS: &[&str] = &[
    kpi::STRUCTURAL_COMPLETENESS,
    kpi::IMPLEMENTATION_COMPLETENESS,
    kpi::PIPELINE_STAGE_COMPLETENESS,
    kpi::VALIDATOR_COMPLETENESS,
    kpi::COMPLEXITY_PROFILE,
    kpi::TESTS_PASS,
];

/// Policy/metadata KPIs: "does it meet the contract".
const DEFAULT_COMPLIANCE_KPIS: &[&str] = &[
    kpi::SPEC_COVERAGE,
    kpi::DOCUMENTATION,
    kpi::SANITY_GATE,
    kpi::STATE_TRANSITION,
];

/// Map a done-contract entry to the KPI it requires.
///
/// `dependency_fulfilled` maps to a KPI the scoring loop never populates;
/// it resolves to not-applicable and therefore never penalizes.
fn done_contract_kpi(entry: &str) -> Option<&'static str> {
    match entry {
        "implementation_files_present" => Some(kpi::CODE_ARTIFACT_PRESENT),
        "tests_pass" => Some(kpi::TESTS_PASS),
        "state_transition_implemented" => Some(kpi::STATE_TRANSITION),
        "dependency_fulfilled" => Some(kpi::DEPENDENCY_FULFILLED),
        _ => None,
    }
}

/// Outcome of scoring one repository.
#[derive(Debug, Clone)]
pub enum ScoringOutcome {
    Scored(BTreeMap<String, TaskScoreResult>),
    UnableToScore {
        explanation: String,
        sanity: SanityReport,
    },
}

pub const UNABLE_TO_SCORE: &str = "UNABLE_TO_SCORE";

impl ScoringOutcome {
    pub fn is_unable(&self) -> bool {
        matches!(self, ScoringOutcome::UnableToScore { .. })
    }
}

/// Repo-level inputs shared by every task in one scoring run.
struct RepoContext<'a> {
    pm: &'a config::ProjectMap,
    config: &'a ScoringConfig,
    weights: BTreeMap<String, f64>,
    gate_caps: BTreeMap<String, i64>,
    progress_kpis: Vec<String>,
    compliance_kpis: Vec<String>,
    expected_pipeline_stages: usize,
    expected_validators: usize,
    median_entities: i64,
    evidence: TestEvidence,
}

/// Run the full scoring cascade over every task in the project map.
///
/// A failed sanity gate short-circuits to the `UNABLE_TO_SCORE` sentinel
/// with no per-task numbers; unreadable contracts degrade to an empty
/// result set.
pub fn scoring_loop(scanner: &RepoScanner) -> ScoringOutcome {
    let sanity = scanner.run_sanity_gate();
    if !sanity.healthy {
        return ScoringOutcome::UnableToScore {
            explanation: "Repository sanity checks failed".to_string(),
            sanity,
        };
    }

    let pm = match config::load_project_map(scanner.repo_path()) {
        Ok(pm) => pm,
        Err(err) => {
            warn!(error = %err, "project map unreadable, no tasks scored");
            return ScoringOutcome::Scored(BTreeMap::new());
        }
    };
    let sk = match config::load_scoring_config(scanner.repo_path()) {
        Ok(sk) => sk,
        Err(err) => {
            warn!(error = %err, "scoring config unreadable, no tasks scored");
            return ScoringOutcome::Scored(BTreeMap::new());
        }
    };

    let ctx = RepoContext {
        pm: &pm,
        config: &sk,
        weights: sk.effective_weights(),
        gate_caps: sk.gate_caps(),
        progress_kpis: group_or_default(&sk.kpi_groups.progress, DEFAULT_PROGRESS_KPIS),
        compliance_kpis: group_or_default(&sk.kpi_groups.compliance, DEFAULT_COMPLIANCE_KPIS),
        expected_pipeline_stages: pm
            .values()
            .filter(|e| e.task_type.as_deref() == Some("pipeline_stage"))
            .count(),
        expected_validators: pm
            .values()
            .filter(|e| !e.validation_artifacts.is_empty())
            .count(),
        median_entities: repo_median_entities(scanner),
        evidence: scanner.parse_junit_reports(),
    };

    let mut results = BTreeMap::new();
    for (task_id, entry) in &pm {
        results.insert(task_id.clone(), score_task(scanner, &ctx, task_id, entry));
    }
    ScoringOutcome::Scored(results)
}

fn group_or_default(configured: &Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    configured
        .clone()
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
}

/// Median functions+classes per Python file across the repository.
fn repo_median_entities(scanner: &RepoScanner) -> i64 {
    let mut counts: Vec<i64> = scanner
        .gather_python_files()
        .iter()
        .filter_map(|p| crate::parsers::extract_file(p).ok())
        .map(|f| f.entity_count() as i64)
        .collect();
    if counts.is_empty() {
        return 0;
    }
    counts.sort_unstable();
    let n = counts.len();
    if n % 2 == 1 {
        counts[n / 2]
    } else {
        (counts[n / 2 - 1] + counts[n / 2]) / 2
    }
}

fn score_task(
    scanner: &RepoScanner,
    ctx: &RepoContext,
    task_id: &str,
    entry: &TaskEntry,
) -> TaskScoreResult {
    // 1. Resolve file scope: declared files that exist, then discovered
    //    files not already included.
    let declared: Vec<PathBuf> = entry
        .implementation_files
        .iter()
        .map(|f| scanner.resolve(f))
        .collect();
    let inferred = scanner.discover_impl_files(&declared);
    let mut used: Vec<PathBuf> = declared.iter().filter(|p| p.exists()).cloned().collect();
    for p in &inferred {
        if !used.contains(p) {
            used.push(p.clone());
        }
    }

    let structure = scanner.scan_structure(ctx.pm, Some(&used));
    let signals = scanner.scan_implementation_signals(&used, task_id);

    // CODE_ARTIFACT_PRESENT: hash evidence over the scope, else inference
    // from the repo-wide scan.
    let code_k = if !used.is_empty() {
        if used.iter().all(|f| scanner.hash_artifact(f).is_present()) {
            KpiValue::Satisfied
        } else {
            KpiValue::Partial
        }
    } else if signals.modules_found > 0 || signals.functions_found > 0 {
        KpiValue::Satisfied
    } else {
        KpiValue::Partial
    };

    let tests_k = ctx.evidence.tests_kpi(&entry.validation_artifacts);

    let coverage = compute_spec_coverage(entry);
    let spec_k = KpiValue::from_ratio(coverage as f64 / 100.0, 0.75, 0.25);

    let (complexity_score, complexity_details) =
        scanner.compute_complexity_profile(&used, &ctx.config.complexity);
    let thresholds = &ctx.config.complexity.thresholds;
    let mut comp_k = if complexity_score >= thresholds.high {
        KpiValue::Satisfied
    } else if complexity_score >= thresholds.mid {
        KpiValue::Partial
    } else {
        KpiValue::Unsatisfied
    };
    // Strong direct evidence beats the relative statistic.
    if signals.functions_found >= 2 || signals.pipeline_stages_detected > 0 {
        comp_k = KpiValue::Satisfied;
    }

    let doc_k = documentation_kpi(scanner);

    let struct_pct = structure.percent_structure_complete;
    let mut struct_k = if struct_pct >= 80 {
        KpiValue::Satisfied
    } else if struct_pct >= 50 {
        KpiValue::Partial
    } else {
        KpiValue::Unsatisfied
    };
    if declared.is_empty() && !used.is_empty() && struct_k == KpiValue::Unsatisfied {
        struct_k = KpiValue::Partial;
    }

    let rich = rich_implementation_signals(&signals, ctx.median_entities, complexity_score);
    let pipeline_k = pipeline_stage_completeness(
        ctx.expected_pipeline_stages,
        signals.pipeline_stages_detected,
        rich.strong_impl,
    );
    let validator_sub = validator_subscore(ctx.expected_validators, signals.validators_detected);
    let raw_impl =
        (pipeline_k.as_f64() + validator_sub.as_f64() + rich.fc_score.as_f64()) / 3.0;
    let impl_k = KpiValue::from_ratio(raw_impl, 0.75, 0.25);

    let validator_k = validator_kpi(&entry.validation_artifacts, signals.validators_detected);

    // STATE_TRANSITION is only evaluated when the task's own contract (or
    // the active weight table) asks for it; done contracts are never
    // inherited from elsewhere.
    let state_required = entry
        .done_contract
        .iter()
        .any(|d| d == "state_transition_implemented")
        || ctx.weights.contains_key(kpi::STATE_TRANSITION);
    let state_k = if state_required {
        let (found, diags) = scanner.check_state_transition(&used);
        debug!(task_id, found, ?diags, "state transition detection");
        KpiValue::from_bool(found)
    } else {
        KpiValue::NotApplicable
    };

    let mut metrics: BTreeMap<String, KpiValue> = BTreeMap::new();
    metrics.insert(kpi::STRUCTURAL_COMPLETENESS.into(), struct_k);
    metrics.insert(kpi::IMPLEMENTATION_COMPLETENESS.into(), impl_k);
    metrics.insert(kpi::PIPELINE_STAGE_COMPLETENESS.into(), pipeline_k);
    metrics.insert(kpi::VALIDATOR_COMPLETENESS.into(), validator_k);
    metrics.insert(kpi::CODE_ARTIFACT_PRESENT.into(), code_k);
    metrics.insert(kpi::TESTS_PASS.into(), tests_k);
    metrics.insert(kpi::SPEC_COVERAGE.into(), spec_k);
    metrics.insert(kpi::COMPLEXITY_PROFILE.into(), comp_k);
    metrics.insert(kpi::DOCUMENTATION.into(), doc_k);
    // The gate already passed or we would not be here.
    metrics.insert(kpi::SANITY_GATE.into(), KpiValue::Satisfied);
    metrics.insert(kpi::STATE_TRANSITION.into(), state_k);

    let kpi_value = |name: &str| -> f64 {
        metrics.get(name).map(|v| v.as_f64()).unwrap_or(0.5)
    };

    // 4. Pre-gate weighted score over the configured weight table.
    let total_weight: f64 = ctx.weights.values().sum();
    let weighted: f64 = ctx
        .weights
        .iter()
        .map(|(k, w)| w * kpi_value(k))
        .sum();
    let pre_gate_score = if total_weight > 0.0 {
        ((weighted / total_weight) * 100.0).round() as i64
    } else {
        0
    };

    // 5. Progress / compliance split, each a weighted average over its
    //    group. Neither group overlapping the weight table falls back to
    //    the overall score for both, so a single configured KPI still
    //    drives the total.
    let (progress_pre, progress_total) = subset_score(&ctx.progress_kpis, &ctx.weights, &metrics);
    let (compliance_pre, compliance_total) =
        subset_score(&ctx.compliance_kpis, &ctx.weights, &metrics);
    let (progress_pre, compliance_pre) = if progress_total <= 0.0 && compliance_total <= 0.0 {
        (pre_gate_score, pre_gate_score)
    } else {
        (progress_pre, compliance_pre)
    };

    // 6. Gates cap downward only, only when the gated KPI is applicable
    //    and below full satisfaction. Progress is never gated; the
    //    compliance score is capped only by gates on its own KPIs.
    let progress_post = progress_pre;
    let mut compliance_post = compliance_pre;
    let mut post_gate_score = pre_gate_score;
    for (gated, cap) in &ctx.gate_caps {
        let Some(value) = metrics.get(gated).copied() else {
            continue;
        };
        if !value.is_applicable() {
            continue;
        }
        if value.as_f64() < 1.0 {
            if ctx.compliance_kpis.iter().any(|k| k == gated) {
                compliance_post = compliance_post.min(*cap);
            }
            post_gate_score = post_gate_score.min(*cap);
        }
    }

    // 7. Done-contract enforcement. Missing metadata is neutral; an
    //    explicit 0.0 is a hard zero; a strict partial caps at 50.
    let mut hard_zero = false;
    for contract in &entry.done_contract {
        let Some(required) = done_contract_kpi(contract) else {
            continue;
        };
        let Some(value) = metrics.get(required).copied() else {
            continue;
        };
        if !value.is_applicable() {
            continue;
        }
        let v = value.as_f64();
        if v == 0.0 {
            post_gate_score = 0;
            compliance_post = 0;
            hard_zero = true;
            break;
        }
        if v < 1.0 {
            post_gate_score = post_gate_score.min(50);
            if ctx.compliance_kpis.iter().any(|k| k == required) {
                compliance_post = compliance_post.min(50);
            }
        }
    }

    // 8. Combined score, group-weighted; a hard zero forces the combined
    //    outcome while leaving progress visible.
    let pw = ctx.config.group_weights.progress.unwrap_or(1.0);
    let cw = ctx.config.group_weights.compliance.unwrap_or(1.0);
    let denom = if pw + cw != 0.0 { pw + cw } else { 1.0 };
    let mut combined_score =
        ((progress_post as f64 * pw + compliance_post as f64 * cw) / denom).round() as i64;
    if hard_zero {
        combined_score = 0;
    }

    // 9. Task-type multiplier; no upper clamp.
    let task_type = entry.task_type.clone().unwrap_or_else(|| {
        let files = &entry.implementation_files;
        if !files.is_empty() && files.iter().all(|p| p.starts_with("docs/")) {
            "documentation".to_string()
        } else {
            "pipeline_stage".to_string()
        }
    });
    let type_mult = ctx.config.task_type_weight(&task_type);
    let final_score = (combined_score as f64 * type_mult).round() as i64;

    TaskScoreResult {
        metrics,
        pre_gate_score,
        post_gate_score,
        progress_score: progress_post,
        compliance_score: compliance_post,
        combined_score,
        final_score,
        task_type,
        details: TaskScoreDetails {
            declared_impl_files: to_strings(&declared),
            inferred_impl_files: to_strings(&inferred),
            impl_files: to_strings(&used),
            validation_artifacts: entry.validation_artifacts.clone(),
            implementation_signals: signals,
            percent_structure_complete: struct_pct,
            complexity_details,
        },
    }
}

fn to_strings(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect()
}

/// Weighted average over one KPI group. Returns (score, configured weight
/// mass); zero mass means the group does not participate.
fn subset_score(
    kpis: &[String],
    weights: &BTreeMap<String, f64>,
    metrics: &BTreeMap<String, KpiValue>,
) -> (i64, f64) {
    let mut total = 0.0;
    let mut acc = 0.0;
    for k in kpis {
        let w = weights.get(k).copied().unwrap_or(0.0);
        total += w;
        let v = metrics.get(k).map(|m| m.as_f64()).unwrap_or(0.5);
        acc += w * v;
    }
    if total <= 0.0 {
        (0, 0.0)
    } else {
        (((acc / total) * 100.0).round() as i64, total)
    }
}

/// Spec coverage percentage from a task entry. Missing or empty coverage
/// metadata is uncertain (50), never zero.
pub fn compute_spec_coverage(entry: &TaskEntry) -> i64 {
    let mut total = 0usize;
    let mut covered = 0usize;
    for item in &entry.task_spec_coverage {
        if let Some(flag) = item.covered {
            total += 1;
            if flag {
                covered += 1;
            }
        }
    }
    if total == 0 {
        return 50;
    }
    ((covered as f64 / total as f64) * 100.0) as i64
}

/// Higher-level implementation evidence derived from raw counts.
#[derive(Debug, Clone)]
pub struct RichSignals {
    pub combined_detected: usize,
    pub strong_impl: bool,
    pub fc_score: KpiValue,
}

/// Derive richness evidence: functions+classes measured against the repo
/// median, with a strong-implementation escape hatch when the complexity
/// profile is already high.
pub fn rich_implementation_signals(
    signals: &ImplementationSignals,
    median_entities: i64,
    complexity_score: i64,
) -> RichSignals {
    let combined = signals.functions_found + signals.classes_found;

    let fc_score = if median_entities > 0 {
        if combined as i64 >= median_entities {
            KpiValue::Satisfied
        } else if combined as f64 >= median_entities as f64 / 2.0 {
            KpiValue::Partial
        } else {
            KpiValue::Unsatisfied
        }
    } else {
        KpiValue::Partial
    };

    let strong_impl = combined as i64 >= median_entities.max(1) || complexity_score >= 50;

    RichSignals {
        combined_detected: combined,
        strong_impl,
        fc_score,
    }
}

/// Pipeline-stage completeness against the repo-wide expectation.
///
/// With no expected stages the KPI is neutral. Low direct detection falls
/// back to richness evidence so unconventionally-named but substantial
/// implementations are not penalized.
pub fn pipeline_stage_completeness(expected: usize, detected: usize, strong_impl: bool) -> KpiValue {
    if expected == 0 {
        return KpiValue::Partial;
    }
    if detected >= expected {
        return KpiValue::Satisfied;
    }
    if detected as f64 >= expected as f64 / 2.0 {
        return KpiValue::Partial;
    }
    if strong_impl {
        KpiValue::Satisfied
    } else {
        KpiValue::Unsatisfied
    }
}

/// Validator sub-score against the repo-wide expectation. No richness
/// fallback here: validator evidence is either detected or it is not.
pub fn validator_subscore(expected: usize, detected: usize) -> KpiValue {
    if expected == 0 {
        return KpiValue::Partial;
    }
    if detected >= expected {
        KpiValue::Satisfied
    } else if detected as f64 >= expected as f64 / 2.0 {
        KpiValue::Partial
    } else {
        KpiValue::Unsatisfied
    }
}

/// Task-level VALIDATOR_COMPLETENESS: declared artifacts demand detected
/// validators; nothing declared is neutral.
pub fn validator_kpi(validation_artifacts: &[String], detected: usize) -> KpiValue {
    if validation_artifacts.is_empty() {
        return KpiValue::Partial;
    }
    if detected > 0 {
        KpiValue::Satisfied
    } else {
        KpiValue::Unsatisfied
    }
}

/// DOCUMENTATION: README or docs/ wins outright, else any top-level
/// docstring in the codebase, else neutral.
fn documentation_kpi(scanner: &RepoScanner) -> KpiValue {
    if scanner.repo_path().join("README.md").exists() || scanner.repo_path().join("docs").exists()
    {
        return KpiValue::Satisfied;
    }
    let documented = scanner
        .gather_python_files()
        .iter()
        .filter_map(|p| crate::parsers::extract_file(p).ok())
        .any(|f| f.has_docstring);
    if documented {
        KpiValue::Satisfied
    } else {
        KpiValue::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PROJECT_MAP_FILE, SCORING_KPIS_FILE};
    use std::path::Path;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }

    fn scored(outcome: ScoringOutcome) -> BTreeMap<String, TaskScoreResult> {
        match outcome {
            ScoringOutcome::Scored(results) => results,
            ScoringOutcome::UnableToScore { explanation, .. } => {
                panic!("expected scored results, got sentinel: {explanation}")
            }
        }
    }

    #[test]
    fn spec_coverage_neutral_when_empty() {
        assert_eq!(compute_spec_coverage(&TaskEntry::default()), 50);
    }

    #[test]
    fn spec_coverage_ratio() {
        let yaml = r#"
task_spec_coverage:
  - covered: true
  - covered: true
  - covered: false
  - note: ignored
"#;
        let entry: TaskEntry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(compute_spec_coverage(&entry), 66);
    }

    #[test]
    fn validator_buckets() {
        assert_eq!(validator_subscore(0, 0), KpiValue::Partial);
        assert_eq!(validator_subscore(4, 4), KpiValue::Satisfied);
        assert_eq!(validator_subscore(4, 2), KpiValue::Partial);
        assert_eq!(validator_subscore(4, 1), KpiValue::Unsatisfied);
        assert_eq!(validator_kpi(&[], 0), KpiValue::Partial);
        assert_eq!(validator_kpi(&["t.py".into()], 0), KpiValue::Unsatisfied);
        assert_eq!(validator_kpi(&["t.py".into()], 2), KpiValue::Satisfied);
    }

    #[test]
    fn pipeline_completeness_falls_back_to_rich_evidence() {
        let strong = rich_implementation_signals(
            &ImplementationSignals {
                functions_found: 6,
                classes_found: 2,
                ..Default::default()
            },
            4,
            0,
        );
        assert!(strong.strong_impl);
        // 0 detected stages of 3 expected, but richness rescues it
        assert_eq!(
            pipeline_stage_completeness(3, 0, strong.strong_impl),
            KpiValue::Satisfied
        );
        let weak = rich_implementation_signals(&ImplementationSignals::default(), 4, 0);
        assert!(!weak.strong_impl);
        assert_eq!(
            pipeline_stage_completeness(3, 0, weak.strong_impl),
            KpiValue::Unsatisfied
        );
        assert_eq!(pipeline_stage_completeness(0, 0, false), KpiValue::Partial);
    }

    #[test]
    fn sanity_failure_yields_sentinel_only() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = scoring_loop(&RepoScanner::new(dir.path()));
        match outcome {
            ScoringOutcome::UnableToScore { sanity, .. } => {
                assert!(!sanity.healthy);
            }
            ScoringOutcome::Scored(_) => panic!("expected sentinel"),
        }
    }

    #[test]
    fn single_weighted_kpi_with_type_multiplier() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            "doc_task:\n  implementation_files:\n    - docs/guide.py\n",
        );
        write(
            dir.path(),
            SCORING_KPIS_FILE,
            "score_weights:\n  CODE_ARTIFACT_PRESENT: 100\ntask_type_weights:\n  documentation: 1.5\n",
        );
        write(dir.path(), "docs/guide.py", "def guide():\n    pass\n");
        write(dir.path(), "src/keep.py", "def keep():\n    pass\n");

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        let result = &results["doc_task"];
        assert_eq!(result.pre_gate_score, 100);
        assert_eq!(result.task_type, "documentation");
        assert_eq!(result.final_score, 150);
    }

    #[test]
    fn done_contract_explicit_failure_hard_zeroes() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            "flow_task:\n  implementation_files:\n    - src/plain.py\n  done_contract:\n    - state_transition_implemented\n",
        );
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        // no transition construct anywhere in this file
        write(
            dir.path(),
            "src/plain.py",
            "def compute(a, b):\n    return a + b\n",
        );

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        let result = &results["flow_task"];
        assert_eq!(
            result.metrics.get(kpi::STATE_TRANSITION),
            Some(&KpiValue::Unsatisfied)
        );
        assert_eq!(result.post_gate_score, 0);
        assert_eq!(result.compliance_score, 0);
        assert_eq!(result.combined_score, 0);
        assert_eq!(result.final_score, 0);
        // progress stays visible despite the hard zero
        assert!(result.progress_score > 0);
    }

    #[test]
    fn done_contract_partial_caps_at_fifty() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            "tested_task:\n  implementation_files:\n    - src/core.py\n  validation_artifacts:\n    - tests/test_core.py::test_missing\n  done_contract:\n    - tests_pass\n",
        );
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        write(
            dir.path(),
            "src/core.py",
            "def core_stage(x):\n    return x\n\ndef validate_core(x):\n    return True\n",
        );
        // no test-reports at all: referenced test is unresolved -> 0.5

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        let result = &results["tested_task"];
        assert_eq!(result.metrics.get(kpi::TESTS_PASS), Some(&KpiValue::Partial));
        assert!(result.post_gate_score <= 50);
    }

    #[test]
    fn gates_cap_compliance_not_progress() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            "gated_task:\n  implementation_files:\n    - src/core.py\n",
        );
        write(
            dir.path(),
            SCORING_KPIS_FILE,
            "gates:\n  DOCUMENTATION: 10\n",
        );
        // no README/docs and no docstrings: DOCUMENTATION stays partial
        write(
            dir.path(),
            "src/core.py",
            "def core_stage(x):\n    return x\n\ndef shape(x):\n    return x\n",
        );

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        let result = &results["gated_task"];
        assert_eq!(
            result.metrics.get(kpi::DOCUMENTATION),
            Some(&KpiValue::Partial)
        );
        assert!(result.compliance_score <= 10);
        assert!(result.post_gate_score <= 10);
        assert!(result.progress_score > 10);
    }

    #[test]
    fn every_emitted_kpi_is_bucketized() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            r#"
mixed_task:
  implementation_files:
    - src/core.py
  task_spec_coverage:
    - covered: true
    - covered: false
    - covered: false
"#,
        );
        write(dir.path(), SCORING_KPIS_FILE, "{}\n");
        write(
            dir.path(),
            "src/core.py",
            "def run_stage(x):\n    return x\n",
        );

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        for (name, value) in &results["mixed_task"].metrics {
            let v = value.as_f64();
            assert!(
                v == 0.0 || v == 0.5 || v == 1.0,
                "KPI {name} out of bucket set: {v}"
            );
        }
    }

    #[test]
    fn legacy_gate_list_uses_default_cap() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PROJECT_MAP_FILE,
            "legacy_task:\n  implementation_files:\n    - src/core.py\n",
        );
        write(
            dir.path(),
            SCORING_KPIS_FILE,
            "gates:\n  - TESTS_PASS\n",
        );
        write(
            dir.path(),
            "src/core.py",
            "def run_stage(x):\n    return x\n",
        );

        let results = scored(scoring_loop(&RepoScanner::new(dir.path())));
        // TESTS_PASS is partial (nothing referenced), so the legacy gate
        // caps at 50.
        assert!(results["legacy_task"].post_gate_score <= 50);
    }
}
