//! Index persistence and rolling progress history
//!
//! The aggregated index persists as YAML with deterministic key ordering
//! (JSON as a fallback). Each save folds the repo's mean final score into
//! a rolling history series rendered as a block-character sparkline.

use crate::models::RepoIndex;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_HISTORY_LEN: usize = 20;

const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render a 0-100 series as an 8-level sparkline.
pub fn render_sparkline(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            let x = if v.is_finite() { *v } else { 0.0 };
            let idx = ((x / 100.0) * 7.0).round().clamp(0.0, 7.0) as usize;
            SPARK_BLOCKS[idx]
        })
        .collect()
}

/// Serialize the index to `out_path`, YAML preferred with JSON fallback.
pub fn save_index(index: &RepoIndex, out_path: &Path) -> Result<()> {
    let serialized = match serde_yaml::to_string(index) {
        Ok(yaml) => yaml,
        Err(err) => {
            debug!(error = %err, "YAML serialization failed, falling back to JSON");
            serde_json::to_string_pretty(index)?
        }
    };
    std::fs::write(out_path, serialized)
        .with_context(|| format!("Failed to write index: {}", out_path.display()))
}

/// Save the index while appending each repo's mean final score to its
/// rolling progress history (FIFO, capped at `history_len`).
///
/// Prior history is loaded tolerantly from the existing file: YAML or
/// JSON, with absence or corruption treated as an empty history.
pub fn save_index_with_history(
    index: &mut RepoIndex,
    out_path: &Path,
    history_len: usize,
) -> Result<()> {
    let prev = load_previous(out_path);

    for (repo_name, entry) in index.iter_mut() {
        let scores: Vec<f64> = entry
            .scoring
            .values()
            .map(|r| r.final_score as f64)
            .collect();
        let avg = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let mut values = previous_history(&prev, repo_name);
        values.push(avg);
        if values.len() > history_len {
            let overflow = values.len() - history_len;
            values.drain(0..overflow);
        }

        entry.progress_history = render_sparkline(&values);
        entry.progress_history_values = values;
    }

    save_index(index, out_path)
}

/// Load whatever was at `out_path` before, if anything parseable.
fn load_previous(out_path: &Path) -> serde_yaml::Value {
    let Ok(text) = std::fs::read_to_string(out_path) else {
        return serde_yaml::Value::Null;
    };
    // serde_yaml accepts JSON input too, which covers the fallback format.
    serde_yaml::from_str(&text).unwrap_or(serde_yaml::Value::Null)
}

fn previous_history(prev: &serde_yaml::Value, repo_name: &str) -> Vec<f64> {
    prev.as_mapping()
        .and_then(|m| m.get(repo_name))
        .and_then(|entry| entry.as_mapping())
        .and_then(|m| m.get("progress_history_values"))
        .and_then(|v| v.as_sequence())
        .map(|seq| seq.iter().filter_map(|v| v.as_f64()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RepoIndexEntry, TaskScoreResult};

    fn index_with_score(score: i64) -> RepoIndex {
        let mut scoring = std::collections::BTreeMap::new();
        scoring.insert(
            "task_a".to_string(),
            TaskScoreResult {
                final_score: score,
                ..Default::default()
            },
        );
        let mut index = RepoIndex::new();
        index.insert(
            "repo_one".to_string(),
            RepoIndexEntry {
                repo_path: "/tmp/repo_one".to_string(),
                scoring,
                ..Default::default()
            },
        );
        index
    }

    #[test]
    fn sparkline_levels() {
        assert_eq!(render_sparkline(&[0.0]), "▁");
        assert_eq!(render_sparkline(&[100.0]), "█");
        assert_eq!(render_sparkline(&[0.0, 50.0, 100.0]), "▁▄█");
    }

    #[test]
    fn history_accumulates_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("index.yml");

        let mut first = index_with_score(40);
        save_index_with_history(&mut first, &out, DEFAULT_HISTORY_LEN).unwrap();
        assert_eq!(first["repo_one"].progress_history_values, vec![40.0]);

        let mut second = index_with_score(90);
        save_index_with_history(&mut second, &out, DEFAULT_HISTORY_LEN).unwrap();
        let values = &second["repo_one"].progress_history_values;
        assert_eq!(values, &vec![40.0, 90.0]);

        // non-decreasing scores render non-decreasing glyphs
        let glyphs: Vec<char> = second["repo_one"].progress_history.chars().collect();
        assert_eq!(glyphs.len(), 2);
        assert!(glyphs[0] <= glyphs[1]);
    }

    #[test]
    fn history_truncates_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("index.yml");

        for i in 0..5 {
            let mut index = index_with_score(i * 10);
            save_index_with_history(&mut index, &out, 3).unwrap();
        }
        let text = std::fs::read_to_string(&out).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let values = value["repo_one"]["progress_history_values"]
            .as_sequence()
            .unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_f64(), Some(20.0));
        assert_eq!(values[2].as_f64(), Some(40.0));
    }

    #[test]
    fn corrupt_prior_index_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("index.yml");
        std::fs::write(&out, ": not : valid : yaml : {{{{").unwrap();

        let mut index = index_with_score(70);
        save_index_with_history(&mut index, &out, DEFAULT_HISTORY_LEN).unwrap();
        assert_eq!(index["repo_one"].progress_history_values, vec![70.0]);
    }

    #[test]
    fn repo_without_tasks_records_zero() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("index.yml");
        let mut index = RepoIndex::new();
        index.insert("empty_repo".to_string(), RepoIndexEntry::default());
        save_index_with_history(&mut index, &out, DEFAULT_HISTORY_LEN).unwrap();
        assert_eq!(index["empty_repo"].progress_history_values, vec![0.0]);
    }
}
