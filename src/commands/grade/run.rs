use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::answer_key::load_answer_keys;
use crate::cli::{GradeArgs, OcrMode, RecognizerKind};
use crate::grading::{BatchSummary, GradeError, GradeReport, build_index, grade_document};
use crate::model::{
    FailedDocument, GradeCounts, GradePaths, GradeRunManifest, GradedDocumentEntry,
    RecognizedDocument,
};
use crate::recognizer::{OcrEngine, discover_documents, recognizer_for};
use crate::store::{DEFAULT_DB_FILE, GradeRunRecord, GradedDocumentRecord, insert_run, open_store};
use crate::util::{
    document_label, ensure_directory, now_utc_string, run_stamp, sha256_file, write_json_pretty,
};

use super::output::{write_json_response, write_text_response};

pub fn run(args: GradeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let stamp = run_stamp(started_ts);
    let run_id = format!("grade-{stamp}");

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join(format!("grade_run_{stamp}.json")));
    let db_path = if args.no_store {
        None
    } else {
        Some(
            args.db_path
                .clone()
                .unwrap_or_else(|| cache_root.join(DEFAULT_DB_FILE)),
        )
    };

    info!(
        run_id = %run_id,
        match_mode = args.match_mode.as_str(),
        recognizer = args.recognizer.recognizer.as_str(),
        "starting grade run"
    );

    let answer_key = load_answer_keys(&args.key.keys, &args.key.columns())?;
    if answer_key.records.is_empty() {
        warn!(
            sources = answer_key.sources.len(),
            excluded = answer_key.excluded.len(),
            "every answer key row was excluded"
        );
        bail!(GradeError::NoKeyRecords);
    }

    let documents = collect_documents(&args.documents, args.document_dir.as_deref())?;
    if documents.is_empty() {
        bail!(GradeError::NoDocuments);
    }
    let labels = unique_labels(&documents);

    let ocr_settings = args.recognizer.ocr_settings();
    let mut graded = Vec::<GradedDocumentEntry>::new();
    let mut failed = Vec::<FailedDocument>::new();
    let mut warnings = Vec::<String>::new();
    let mut empty_document_count = 0usize;

    for (path, label) in documents.iter().zip(&labels) {
        let recognizer = recognizer_for(args.recognizer.recognizer, path, &ocr_settings);
        let budget = DocumentTimeoutBudget::new(args.document_timeout_ms);

        let recognized = recognizer
            .recognize(path)
            .and_then(|document| enforce_timeout(budget, label).map(|_| document));
        let document = match recognized {
            Ok(document) => document,
            Err(error) => {
                warn!(document = %label, error = %error, "recognition failed; skipping document");
                failed.push(FailedDocument {
                    path: path.display().to_string(),
                    reason: format!("{error:#}"),
                });
                continue;
            }
        };

        let sha256 = sha256_file(path)?;
        if build_index(&document).is_empty() {
            empty_document_count += 1;
            warnings.push(format!(
                "{label}: recognized text is empty; every item resolves to not found"
            ));
        }

        let report = grade_recognized(label, &document, &answer_key.records, &args)?;
        info!(
            document = %label,
            correct = report.correct_count,
            incorrect = report.incorrect_count,
            not_found = report.not_found_count(),
            "graded document"
        );

        graded.push(GradedDocumentEntry {
            path: path.display().to_string(),
            sha256,
            recognizer: recognizer.name().to_string(),
            report,
        });
    }

    let reports: Vec<GradeReport> = graded.iter().map(|entry| entry.report.clone()).collect();
    let summary = BatchSummary::from_reports(&reports, failed.len());

    if let Some(db_path) = &db_path {
        let mut connection = open_store(db_path)?;
        let records: Vec<GradedDocumentRecord<'_>> = graded
            .iter()
            .map(|entry| GradedDocumentRecord {
                sha256: &entry.sha256,
                report: &entry.report,
            })
            .collect();
        insert_run(
            &mut connection,
            &GradeRunRecord {
                run_id: &run_id,
                started_at: &started_at,
                match_mode: args.match_mode.as_str(),
                key_record_count: answer_key.records.len(),
                excluded_row_count: answer_key.excluded.len(),
            },
            &records,
        )?;
        info!(path = %db_path.display(), documents = records.len(), "stored grade run");
    }

    let status = if graded.is_empty() {
        "failed"
    } else if failed.is_empty() {
        "completed"
    } else {
        "completed_with_failures"
    };

    let manifest = GradeRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_grade_command(&args),
        match_mode: args.match_mode.as_str().to_string(),
        tool_versions: OcrEngine::initialized().map(|engine| engine.versions().clone()),
        paths: GradePaths {
            cache_root: cache_root.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
            db_path: db_path.as_ref().map(|path| path.display().to_string()),
        },
        counts: GradeCounts {
            key_source_count: answer_key.sources.len(),
            key_record_count: answer_key.records.len(),
            excluded_row_count: answer_key.excluded.len(),
            document_count: documents.len(),
            graded_document_count: summary.documents_graded,
            failed_document_count: summary.documents_failed,
            empty_document_count,
            correct_total: summary.correct_total,
            incorrect_total: summary.incorrect_total,
        },
        key_sources: answer_key.sources,
        excluded_rows: answer_key.excluded,
        documents: graded,
        failed_documents: failed,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote grade run manifest");

    if args.json {
        write_json_response(&manifest)?;
    } else {
        write_text_response(&manifest, &summary)?;
    }

    if manifest.documents.is_empty() {
        bail!(
            "none of the {} documents could be recognized; see {}",
            manifest.counts.document_count,
            manifest_path.display()
        );
    }

    info!(
        run_id = %run_id,
        graded = summary.documents_graded,
        failed = summary.documents_failed,
        "grade run completed"
    );
    Ok(())
}

fn grade_recognized(
    label: &str,
    document: &RecognizedDocument,
    records: &[crate::model::KeyRecord],
    args: &GradeArgs,
) -> Result<GradeReport> {
    grade_document(label, document, records, args.match_mode)
        .with_context(|| format!("failed to grade {label}"))
}

/// Explicit documents first, then directory entries; repeated paths are graded once.
fn collect_documents(explicit: &[PathBuf], document_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut documents = explicit.to_vec();
    if let Some(dir) = document_dir {
        documents.extend(discover_documents(dir)?);
    }

    let mut seen = HashSet::new();
    documents.retain(|path| seen.insert(path.clone()));
    Ok(documents)
}

/// File names label documents unless two documents share one, in which case the full path is used.
fn unique_labels(documents: &[PathBuf]) -> Vec<String> {
    let names: Vec<String> = documents.iter().map(|path| document_label(path)).collect();

    let mut counts = HashMap::<&str, usize>::new();
    for name in &names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }

    documents
        .iter()
        .zip(&names)
        .map(|(path, name)| {
            if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
                path.display().to_string()
            } else {
                name.clone()
            }
        })
        .collect()
}

#[derive(Clone, Copy)]
struct DocumentTimeoutBudget {
    started: Instant,
    timeout_ms: u64,
}

impl DocumentTimeoutBudget {
    fn new(timeout_ms: u64) -> Option<Self> {
        if timeout_ms == 0 {
            return None;
        }
        Some(Self {
            started: Instant::now(),
            timeout_ms,
        })
    }

    fn elapsed_ms(self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn enforce(self, document: &str) -> Result<()> {
        let elapsed_ms = self.elapsed_ms();
        if elapsed_ms <= self.timeout_ms as f64 {
            return Ok(());
        }

        bail!(
            "recognition of {} exceeded its time budget (elapsed {:.1} ms > budget {} ms); increase --document-timeout-ms",
            document,
            elapsed_ms,
            self.timeout_ms
        )
    }
}

fn enforce_timeout(budget: Option<DocumentTimeoutBudget>, document: &str) -> Result<()> {
    if let Some(budget) = budget {
        budget.enforce(document)?;
    }
    Ok(())
}

fn render_grade_command(args: &GradeArgs) -> String {
    let mut command = vec!["word-grader".to_string(), "grade".to_string()];

    for key in &args.key.keys {
        command.push("--key".to_string());
        command.push(key.display().to_string());
    }
    command.push("--question-column".to_string());
    command.push(args.key.question_column.clone());
    command.push("--answer-column".to_string());
    command.push(args.key.answer_column.clone());

    for document in &args.documents {
        command.push("--document".to_string());
        command.push(document.display().to_string());
    }
    if let Some(dir) = &args.document_dir {
        command.push("--document-dir".to_string());
        command.push(dir.display().to_string());
    }

    command.push("--match-mode".to_string());
    command.push(args.match_mode.as_str().to_string());
    command.push("--recognizer".to_string());
    command.push(args.recognizer.recognizer.as_str().to_string());

    if args.recognizer.recognizer != RecognizerKind::Text {
        command.push("--ocr-mode".to_string());
        command.push(args.recognizer.ocr_mode.as_str().to_string());
        if args.recognizer.ocr_mode != OcrMode::Off {
            command.push("--ocr-lang".to_string());
            command.push(args.recognizer.ocr_lang.clone());
            command.push("--ocr-min-text-chars".to_string());
            command.push(args.recognizer.ocr_min_text_chars.to_string());
        }
    }
    if args.document_timeout_ms > 0 {
        command.push("--document-timeout-ms".to_string());
        command.push(args.document_timeout_ms.to_string());
    }

    command.push("--cache-root".to_string());
    command.push(args.cache_root.display().to_string());
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if args.no_store {
        command.push("--no-store".to_string());
    }
    if args.json {
        command.push("--json".to_string());
    }

    command.join(" ")
}
