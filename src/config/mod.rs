//! Contract loading for Taskgauge
//!
//! This module handles the three repo-level contract files consumed
//! read-only by the scanner:
//! - `project_map.yml`  — task declarations (id -> TaskEntry)
//! - `scoring_kpis.yml` — score weights, gates, KPI groups, complexity config
//! - `repo_contract.yml` — sanity-check list
//!
//! Loaders are tolerant by design: a malformed per-task entry degrades to an
//! empty entry rather than failing the whole map, matching the
//! absence-is-not-failure policy of the scoring engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const PROJECT_MAP_FILE: &str = "project_map.yml";
pub const SCORING_KPIS_FILE: &str = "scoring_kpis.yml";
pub const REPO_CONTRACT_FILE: &str = "repo_contract.yml";

/// Errors raised by contract loaders.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("contract file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("unexpected shape in {path}: {source}")]
    Schema {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One coverage checkbox inside a task's `task_spec_coverage` list.
///
/// Entries without a `covered` key are recorded but excluded from the
/// coverage ratio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageEntry {
    #[serde(default)]
    pub covered: Option<bool>,
}

/// A task declaration from `project_map.yml`. External input, immutable
/// per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEntry {
    #[serde(default)]
    pub implementation_files: Vec<String>,
    #[serde(default)]
    pub validation_artifacts: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub done_contract: Vec<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub task_spec_coverage: Vec<CoverageEntry>,
}

/// The full project map: task id -> declaration.
pub type ProjectMap = BTreeMap<String, TaskEntry>;

/// Gate configuration: either an explicit KPI -> cap mapping, or the legacy
/// list form where every named KPI gets the default cap of 50.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateSpec {
    Caps(BTreeMap<String, f64>),
    Legacy(Vec<String>),
}

impl Default for GateSpec {
    fn default() -> Self {
        GateSpec::Caps(BTreeMap::new())
    }
}

pub const DEFAULT_GATE_CAP: i64 = 50;

impl GateSpec {
    /// Normalize to a KPI -> cap mapping.
    pub fn caps(&self) -> BTreeMap<String, i64> {
        match self {
            GateSpec::Caps(map) => map.iter().map(|(k, v)| (k.clone(), *v as i64)).collect(),
            GateSpec::Legacy(names) => names
                .iter()
                .map(|k| (k.clone(), DEFAULT_GATE_CAP))
                .collect(),
        }
    }
}

/// Progress/compliance KPI group overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiGroups {
    #[serde(default)]
    pub progress: Option<Vec<String>>,
    #[serde(default)]
    pub compliance: Option<Vec<String>>,
}

/// Relative weight of the progress and compliance groups in the combined
/// score. Both default to 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupWeights {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub compliance: Option<f64>,
}

fn default_high_threshold() -> i64 {
    70
}

fn default_mid_threshold() -> i64 {
    30
}

/// Bucketization thresholds for the complexity profile score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityThresholds {
    #[serde(default = "default_high_threshold")]
    pub high: i64,
    #[serde(default = "default_mid_threshold")]
    pub mid: i64,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self { high: 70, mid: 30 }
    }
}

/// Complexity profiler configuration: metric weights and bucketization
/// thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityConfig {
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub thresholds: ComplexityThresholds,
}

impl ComplexityConfig {
    /// Weight for one complexity metric, falling back to its default.
    pub fn weight(&self, key: &str, default: i64) -> i64 {
        self.weights.get(key).map(|v| *v as i64).unwrap_or(default)
    }
}

/// Scoring configuration from `scoring_kpis.yml`. External input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub score_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub task_type_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub gates: GateSpec,
    #[serde(default)]
    pub kpi_groups: KpiGroups,
    #[serde(default)]
    pub group_weights: GroupWeights,
    #[serde(default)]
    pub complexity: ComplexityConfig,
}

/// Canonical default KPI weights, used when `score_weights` is absent or
/// empty. An explicit user mapping is authoritative and is not merged with
/// these.
pub fn default_score_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("STRUCTURAL_COMPLETENESS".to_string(), 25.0),
        ("IMPLEMENTATION_COMPLETENESS".to_string(), 25.0),
        ("PIPELINE_STAGE_COMPLETENESS".to_string(), 10.0),
        ("VALIDATOR_COMPLETENESS".to_string(), 10.0),
        ("CODE_ARTIFACT_PRESENT".to_string(), 10.0),
        ("TESTS_PASS".to_string(), 10.0),
        ("SPEC_COVERAGE".to_string(), 5.0),
        ("COMPLEXITY_PROFILE".to_string(), 3.0),
        ("DOCUMENTATION".to_string(), 2.0),
    ])
}

impl ScoringConfig {
    /// The weight table actually used for scoring.
    pub fn effective_weights(&self) -> BTreeMap<String, f64> {
        match &self.score_weights {
            Some(weights) if !weights.is_empty() => weights.clone(),
            _ => default_score_weights(),
        }
    }

    pub fn gate_caps(&self) -> BTreeMap<String, i64> {
        self.gates.caps()
    }

    pub fn task_type_weight(&self, task_type: &str) -> f64 {
        self.task_type_weights.get(task_type).copied().unwrap_or(1.0)
    }
}

/// Repo-level contract carrying the sanity-check list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoContract {
    #[serde(default)]
    pub sanity_checks: Vec<String>,
}

fn read_yaml_value(path: &Path) -> ConfigResult<serde_yaml::Value> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::NotFound(path.to_path_buf()))?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `project_map.yml` from a repo root.
///
/// Tolerant per entry: a null or malformed task entry degrades to an empty
/// declaration instead of failing the map.
pub fn load_project_map(repo_path: &Path) -> ConfigResult<ProjectMap> {
    let path = repo_path.join(PROJECT_MAP_FILE);
    let value = read_yaml_value(&path)?;
    if value.is_null() {
        return Ok(ProjectMap::new());
    }
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_value(value).map_err(|source| ConfigError::Schema {
            path: path.clone(),
            source,
        })?;

    let mut map = ProjectMap::new();
    for (task_id, entry) in raw {
        let parsed = match entry {
            serde_yaml::Value::Null => TaskEntry::default(),
            other => serde_yaml::from_value(other).unwrap_or_else(|err| {
                debug!(task_id = %task_id, error = %err, "malformed task entry, using empty declaration");
                TaskEntry::default()
            }),
        };
        map.insert(task_id, parsed);
    }
    Ok(map)
}

/// Load `scoring_kpis.yml` from a repo root.
pub fn load_scoring_config(repo_path: &Path) -> ConfigResult<ScoringConfig> {
    let path = repo_path.join(SCORING_KPIS_FILE);
    let value = read_yaml_value(&path)?;
    if value.is_null() {
        return Ok(ScoringConfig::default());
    }
    serde_yaml::from_value(value).map_err(|source| ConfigError::Schema { path, source })
}

/// Load `repo_contract.yml` from a repo root. Returns `None` when the file
/// is absent or unreadable; the sanity gate treats that as "no extra
/// checks", never as a blocking condition.
pub fn load_repo_contract(repo_path: &Path) -> Option<RepoContract> {
    let path = repo_path.join(REPO_CONTRACT_FILE);
    match read_yaml_value(&path) {
        Ok(value) => serde_yaml::from_value(value).ok(),
        Err(ConfigError::NotFound(_)) => None,
        Err(err) => {
            debug!(error = %err, "repo contract unreadable, ignoring");
            None
        }
    }
}
