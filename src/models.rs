//! Core data models for Taskgauge
//!
//! These models are used throughout the codebase for representing
//! KPI values, per-task score results, scan signals, and the persisted
//! multi-repo index.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Sentinel emitted in place of a digest when an artifact is absent.
pub const MISSING_FILE_HASH: &str = "MISSING_FILE_HASH";

/// A bucketized KPI value.
///
/// Every KPI the engine emits is one of three buckets; `NotApplicable`
/// exists so that "we never looked" is distinguishable from "we looked and
/// it failed". Wherever a value is consumed in a weighted sum or written to
/// output, `NotApplicable` substitutes to the neutral 0.5 — absence of
/// evidence is never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KpiValue {
    Unsatisfied,
    #[default]
    Partial,
    Satisfied,
    NotApplicable,
}

impl KpiValue {
    /// Numeric value used in weighted sums and emitted output.
    pub fn as_f64(self) -> f64 {
        match self {
            KpiValue::Unsatisfied => 0.0,
            KpiValue::Partial | KpiValue::NotApplicable => 0.5,
            KpiValue::Satisfied => 1.0,
        }
    }

    pub fn is_applicable(self) -> bool {
        !matches!(self, KpiValue::NotApplicable)
    }

    /// Bucketize a raw ratio against full/half thresholds.
    pub fn from_ratio(raw: f64, full_at: f64, half_at: f64) -> Self {
        if raw >= full_at {
            KpiValue::Satisfied
        } else if raw >= half_at {
            KpiValue::Partial
        } else {
            KpiValue::Unsatisfied
        }
    }

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            KpiValue::Satisfied
        } else {
            KpiValue::Unsatisfied
        }
    }
}

impl Serialize for KpiValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for KpiValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        if v == 0.0 {
            Ok(KpiValue::Unsatisfied)
        } else if v == 0.5 {
            Ok(KpiValue::Partial)
        } else if v == 1.0 {
            Ok(KpiValue::Satisfied)
        } else {
            Err(D::Error::custom(format!("KPI value out of bucket set: {v}")))
        }
    }
}

/// Digest of a tracked artifact, or an explicit marker that it is absent.
///
/// Serialized as the hex digest string, with `MISSING_FILE_HASH` standing in
/// for absent files so downstream diffs stay string-typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactHash {
    Present(String),
    Missing,
}

impl ArtifactHash {
    pub fn is_present(&self) -> bool {
        matches!(self, ArtifactHash::Present(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ArtifactHash::Present(digest) => digest,
            ArtifactHash::Missing => MISSING_FILE_HASH,
        }
    }
}

impl std::fmt::Display for ArtifactHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ArtifactHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ArtifactHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == MISSING_FILE_HASH {
            Ok(ArtifactHash::Missing)
        } else {
            Ok(ArtifactHash::Present(s))
        }
    }
}

/// Raw implementation signals scanned from one task's resolved file set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImplementationSignals {
    pub modules_found: usize,
    pub functions_found: usize,
    pub classes_found: usize,
    pub pipeline_stages_detected: usize,
    pub validators_detected: usize,
    pub adapters_detected: usize,
}

/// Structural signals for a repo or task scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureSignals {
    pub module_count: usize,
    pub folder_count: usize,
    /// Presence map over the seven expected structural markers.
    pub present: BTreeMap<String, bool>,
    pub percent_structure_complete: i64,
}

/// Per-metric breakdown backing the complexity profile score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityDetails {
    pub pipeline_stage_count: usize,
    pub validator_count: usize,
    pub adapter_count: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub module_depth: usize,
    pub scaled: ScaledComplexity,
    pub repo_totals: ComplexityTotals,
}

/// Min-max scaled (0-100) complexity metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaledComplexity {
    pub pipeline_stage: i64,
    pub validators: i64,
    pub adapters: i64,
    pub functions: i64,
    pub classes: i64,
    pub module_depth: i64,
}

/// Repo-wide totals used as normalization denominators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityTotals {
    pub functions: usize,
    pub classes: usize,
    pub pipeline_stages: usize,
    pub validators: usize,
    pub adapters: usize,
    pub module_depth: usize,
}

/// Diagnostic payload attached to every task score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskScoreDetails {
    pub declared_impl_files: Vec<String>,
    pub inferred_impl_files: Vec<String>,
    pub impl_files: Vec<String>,
    pub validation_artifacts: Vec<String>,
    pub implementation_signals: ImplementationSignals,
    pub percent_structure_complete: i64,
    pub complexity_details: ComplexityDetails,
}

/// Output of the KPI scoring & gate engine for one task.
///
/// Immutable once produced; `final_score` carries the task-type multiplier
/// and has no upper clamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskScoreResult {
    pub metrics: BTreeMap<String, KpiValue>,
    pub pre_gate_score: i64,
    pub post_gate_score: i64,
    pub progress_score: i64,
    pub compliance_score: i64,
    pub combined_score: i64,
    pub final_score: i64,
    pub task_type: String,
    pub details: TaskScoreDetails,
}

/// Classification of tracked-artifact hashes against a prior scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftReport {
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub missing: Vec<String>,
    pub details: BTreeMap<String, DriftDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftDetail {
    pub previous: Option<String>,
    pub current: ArtifactHash,
}

/// Result of the repo-wide sanity gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanityReport {
    pub healthy: bool,
    pub details: BTreeMap<String, bool>,
}

/// Per-dependency resolution outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyDetail {
    pub found: bool,
    pub status: Option<String>,
    pub repo: Option<String>,
    pub satisfied: bool,
}

/// Dependency check result for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyReport {
    pub ok: bool,
    pub details: BTreeMap<String, DependencyDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary status for a task inside the aggregated index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    pub final_score: i64,
    pub status: String,
}

/// Last-modification evidence for a repo's artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactAge {
    pub last_mod_epoch: Option<i64>,
    pub source: Option<String>,
}

/// One repository's entry in the aggregated multi-repo index.
///
/// A repo that failed its sanity gate carries only the sentinel fields
/// (`status`, `explanation`, `sanity`) with empty task-level maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoIndexEntry {
    pub repo_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanity: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskStatus>,
    #[serde(default)]
    pub scoring: BTreeMap<String, TaskScoreResult>,
    #[serde(default)]
    pub deltas: DriftReport,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_age: Option<ArtifactAge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress_history_values: Vec<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub progress_history: String,
}

/// The aggregated index, keyed by repository directory name.
pub type RepoIndex = BTreeMap<String, RepoIndexEntry>;
