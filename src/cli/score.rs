//! `taskgauge score` - score one repository's tasks

use crate::models::TaskScoreResult;
use crate::scanner::RepoScanner;
use crate::scoring::{self, ScoringOutcome};
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct Sentinel<'a> {
    status: &'a str,
    explanation: &'a str,
    sanity: &'a BTreeMap<String, bool>,
}

pub fn run(path: &Path, format: &str, strict: bool) -> Result<()> {
    let scanner = RepoScanner::new(path);
    match scoring::scoring_loop(&scanner) {
        ScoringOutcome::Scored(results) => {
            print_serialized(&results, format)?;
            print_summary(&results);
            Ok(())
        }
        ScoringOutcome::UnableToScore {
            explanation,
            sanity,
        } => {
            let sentinel = Sentinel {
                status: scoring::UNABLE_TO_SCORE,
                explanation: &explanation,
                sanity: &sanity.details,
            };
            print_serialized(&sentinel, format)?;
            if strict {
                bail!("repository cannot be scored: {explanation}");
            }
            Ok(())
        }
    }
}

fn print_serialized<T: Serialize>(value: &T, format: &str) -> Result<()> {
    let out = match format {
        "json" => serde_json::to_string_pretty(value)?,
        _ => serde_yaml::to_string(value)?,
    };
    println!("{out}");
    Ok(())
}

fn print_summary(results: &BTreeMap<String, TaskScoreResult>) {
    if results.is_empty() {
        eprintln!("{}", console::style("no tasks declared").dim());
        return;
    }
    for (task_id, result) in results {
        let score = result.final_score;
        let styled = if score >= crate::aggregate::DONE_THRESHOLD {
            console::style(score).green()
        } else {
            console::style(score).yellow()
        };
        eprintln!(
            "{}  final={} progress={} compliance={}",
            console::style(task_id).bold(),
            styled,
            result.progress_score,
            result.compliance_score
        );
    }
}
