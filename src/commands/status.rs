use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::GradeRunSummary;
use crate::store::{DEFAULT_DB_FILE, open_store, store_counts};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DEFAULT_DB_FILE));

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_grade_manifest(&manifest_dir)? {
        Some(path) => {
            let summary: GradeRunSummary = read_json(&path)?;
            let counts = summary.counts.as_ref();

            info!(
                path = %path.display(),
                run_id = %summary.run_id.unwrap_or_default(),
                status = %summary.status.unwrap_or_default(),
                match_mode = %summary.match_mode.unwrap_or_default(),
                started_at = %summary.started_at.unwrap_or_default(),
                updated_at = %summary.updated_at.unwrap_or_default(),
                key_records = counts.and_then(|value| value.key_record_count).unwrap_or_default(),
                excluded_rows = counts.and_then(|value| value.excluded_row_count).unwrap_or_default(),
                graded_documents = counts.and_then(|value| value.graded_document_count).unwrap_or_default(),
                failed_documents = counts.and_then(|value| value.failed_document_count).unwrap_or_default(),
                correct = counts.and_then(|value| value.correct_total).unwrap_or_default(),
                incorrect = counts.and_then(|value| value.incorrect_total).unwrap_or_default(),
                "loaded latest grade manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no grade run manifest found"),
    }

    if db_path.exists() {
        let connection = open_store(&db_path)?;
        let counts = store_counts(&connection)?;
        info!(
            path = %db_path.display(),
            runs = counts.runs,
            documents = counts.documents,
            results = counts.results,
            "grade store status"
        );
    } else {
        warn!(path = %db_path.display(), "grade store missing");
    }

    Ok(())
}

/// Manifest names embed a compact UTC timestamp, so the lexically greatest one is the newest.
fn latest_grade_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_grade_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("grade_run_") && name.ends_with(".json"));
        if !is_grade_manifest {
            continue;
        }

        if latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_grade_manifest_picks_newest_timestamp() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in [
            "grade_run_20261015T090000Z.json",
            "grade_run_20261016T080000Z.json",
            "other.json",
        ] {
            fs::write(dir.path().join(name), "{}").expect("write manifest");
        }

        let latest = latest_grade_manifest(dir.path())
            .expect("dir is readable")
            .expect("manifest exists");

        assert_eq!(
            latest.file_name().and_then(|name| name.to_str()),
            Some("grade_run_20261016T080000Z.json")
        );
    }

    #[test]
    fn latest_grade_manifest_handles_missing_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(
            latest_grade_manifest(&dir.path().join("manifests")).expect("no error"),
            None
        );
    }
}
