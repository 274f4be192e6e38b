//! `taskgauge aggregate` - scan several repos and persist the index

use crate::aggregate::{self, AggregateOptions};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub fn run(
    paths: &[PathBuf],
    output: &Path,
    history_len: usize,
    no_history: bool,
    timestamps: bool,
) -> Result<()> {
    let options = AggregateOptions {
        include_timestamps: timestamps,
    };
    let mut index = aggregate::aggregate_all(paths, &options);

    if no_history {
        aggregate::save_index(&index, output)?;
    } else {
        aggregate::save_index_with_history(&mut index, output, history_len)?;
    }

    for (repo_name, entry) in &index {
        if let Some(status) = &entry.status {
            eprintln!(
                "{}  {}",
                console::style(repo_name).bold(),
                console::style(status).red()
            );
            continue;
        }
        let done = entry
            .tasks
            .values()
            .filter(|t| t.status == "done")
            .count();
        eprintln!(
            "{}  {}/{} done  {}",
            console::style(repo_name).bold(),
            done,
            entry.tasks.len(),
            entry.progress_history
        );
    }
    eprintln!("index written to {}", output.display());
    Ok(())
}
