//! `taskgauge drift` - artifact drift against a stored baseline

use crate::scanner::RepoScanner;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(path: &Path, baseline: Option<&Path>, save_baseline: Option<&Path>) -> Result<()> {
    let scanner = RepoScanner::new(path);

    let prior: Option<BTreeMap<String, String>> = match baseline {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read baseline: {}", file.display()))?;
            Some(serde_json::from_str(&text).with_context(|| {
                format!("Baseline is not a JSON hash map: {}", file.display())
            })?)
        }
        None => None,
    };

    let report = scanner.version_and_drift(prior.as_ref());
    println!("{}", serde_yaml::to_string(&report)?);

    if let Some(out) = save_baseline {
        let hashes = scanner.current_artifact_hashes();
        std::fs::write(out, serde_json::to_string_pretty(&hashes)?)
            .with_context(|| format!("Failed to write baseline: {}", out.display()))?;
        eprintln!("baseline written to {}", out.display());
    }
    Ok(())
}
