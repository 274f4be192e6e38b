//! `taskgauge sanity` - run only the repo sanity gate

use crate::scanner::RepoScanner;
use anyhow::{bail, Result};
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let scanner = RepoScanner::new(path);
    let report = scanner.run_sanity_gate();
    println!("{}", serde_yaml::to_string(&report)?);
    if !report.healthy {
        bail!("sanity gate failed for {}", path.display());
    }
    Ok(())
}
