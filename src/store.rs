use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::grading::GradeReport;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";
pub const DEFAULT_DB_FILE: &str = "grades.sqlite";

pub struct GradeRunRecord<'a> {
    pub run_id: &'a str,
    pub started_at: &'a str,
    pub match_mode: &'a str,
    pub key_record_count: usize,
    pub excluded_row_count: usize,
}

pub struct GradedDocumentRecord<'a> {
    pub sha256: &'a str,
    pub report: &'a GradeReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub runs: i64,
    pub documents: i64,
    pub results: i64,
}

pub fn open_store(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
          run_id TEXT PRIMARY KEY,
          started_at TEXT NOT NULL,
          match_mode TEXT NOT NULL,
          key_record_count INTEGER NOT NULL,
          excluded_row_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
          run_id TEXT NOT NULL,
          document_label TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          correct_count INTEGER NOT NULL,
          incorrect_count INTEGER NOT NULL,
          not_found_count INTEGER NOT NULL,
          PRIMARY KEY (run_id, document_label)
        );

        CREATE TABLE IF NOT EXISTS results (
          run_id TEXT NOT NULL,
          document_label TEXT NOT NULL,
          seq INTEGER NOT NULL,
          question TEXT NOT NULL,
          expected_answer TEXT NOT NULL,
          claimed_answer TEXT NOT NULL,
          outcome TEXT NOT NULL,
          source_label TEXT,
          matched_line INTEGER,
          PRIMARY KEY (run_id, document_label, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_results_outcome ON results(outcome);
        ",
        )
        .context("failed to create grade store schema")?;

    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

/// Writes a run with all of its reports in one transaction; reports are stored with their results.
pub fn insert_run(
    connection: &mut Connection,
    run: &GradeRunRecord<'_>,
    documents: &[GradedDocumentRecord<'_>],
) -> Result<()> {
    let tx = connection
        .transaction()
        .context("failed to start grade store transaction")?;

    tx.execute(
        "INSERT INTO runs(run_id, started_at, match_mode, key_record_count, excluded_row_count)
         VALUES(?1, ?2, ?3, ?4, ?5)",
        params![
            run.run_id,
            run.started_at,
            run.match_mode,
            run.key_record_count as i64,
            run.excluded_row_count as i64
        ],
    )
    .with_context(|| format!("failed to insert run {}", run.run_id))?;

    {
        let mut document_stmt = tx.prepare(
            "INSERT INTO documents(run_id, document_label, sha256, correct_count, incorrect_count, not_found_count)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut result_stmt = tx.prepare(
            "INSERT INTO results(run_id, document_label, seq, question, expected_answer, claimed_answer, outcome, source_label, matched_line)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;

        for document in documents {
            let report = document.report;
            document_stmt
                .execute(params![
                    run.run_id,
                    report.document_label,
                    document.sha256,
                    report.correct_count as i64,
                    report.incorrect_count as i64,
                    report.not_found_count() as i64
                ])
                .with_context(|| format!("failed to insert document {}", report.document_label))?;

            for (seq, result) in report.results.iter().enumerate() {
                result_stmt.execute(params![
                    run.run_id,
                    report.document_label,
                    seq as i64,
                    result.question,
                    result.expected_answer,
                    result.claimed_answer,
                    result.outcome.as_str(),
                    result.source_label,
                    result.matched_line.map(|line| line as i64)
                ])?;
            }
        }
    }

    tx.commit().context("failed to commit grade store transaction")?;
    Ok(())
}

pub fn store_counts(connection: &Connection) -> Result<StoreCounts> {
    Ok(StoreCounts {
        runs: count_rows(connection, "SELECT COUNT(*) FROM runs")?,
        documents: count_rows(connection, "SELECT COUNT(*) FROM documents")?,
        results: count_rows(connection, "SELECT COUNT(*) FROM results")?,
    })
}

fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{MatchMode, build_index, build_report, grade};
    use crate::model::{KeyRecord, RecognizedDocument};

    fn sample_report(label: &str) -> GradeReport {
        let records = vec![
            KeyRecord::new("apple", "사과", Some("k.json".to_string())),
            KeyRecord::new("dog", "개", None),
            KeyRecord::new("run", "달리다", None),
        ];
        let lines = build_index(&RecognizedDocument::from_text("apple 사과\ndog 고양이"));
        build_report(label, MatchMode::Line, grade(&records, &lines, MatchMode::Line))
    }

    fn memory_store() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory db");
        ensure_schema(&connection).expect("schema");
        connection
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let connection = memory_store();
        ensure_schema(&connection).expect("second call succeeds");
        assert_eq!(store_counts(&connection).expect("counts"), StoreCounts::default());
    }

    #[test]
    fn insert_run_stores_reports_with_results() {
        let mut connection = memory_store();
        let first = sample_report("quiz1.png");
        let second = sample_report("quiz2.png");

        insert_run(
            &mut connection,
            &GradeRunRecord {
                run_id: "run-1",
                started_at: "2026-10-16T00:00:00Z",
                match_mode: "line",
                key_record_count: 3,
                excluded_row_count: 0,
            },
            &[
                GradedDocumentRecord {
                    sha256: "aa",
                    report: &first,
                },
                GradedDocumentRecord {
                    sha256: "bb",
                    report: &second,
                },
            ],
        )
        .expect("insert succeeds");

        let counts = store_counts(&connection).expect("counts");
        assert_eq!(counts.runs, 1);
        assert_eq!(counts.documents, 2);
        assert_eq!(counts.results, 6);

        let (correct, incorrect, not_found): (i64, i64, i64) = connection
            .query_row(
                "SELECT correct_count, incorrect_count, not_found_count FROM documents WHERE document_label = 'quiz1.png'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("document row");
        assert_eq!((correct, incorrect, not_found), (1, 2, 1));

        let claimed: String = connection
            .query_row(
                "SELECT claimed_answer FROM results WHERE document_label = 'quiz1.png' AND seq = 1",
                [],
                |row| row.get(0),
            )
            .expect("result row");
        assert_eq!(claimed, "고양이");
    }

    #[test]
    fn duplicate_run_id_is_rejected_without_partial_writes() {
        let mut connection = memory_store();
        let report = sample_report("quiz.png");
        let run = GradeRunRecord {
            run_id: "run-dup",
            started_at: "2026-10-16T00:00:00Z",
            match_mode: "blob",
            key_record_count: 3,
            excluded_row_count: 1,
        };
        let documents = [GradedDocumentRecord {
            sha256: "cc",
            report: &report,
        }];

        insert_run(&mut connection, &run, &documents).expect("first insert");
        assert!(insert_run(&mut connection, &run, &documents).is_err());

        let counts = store_counts(&connection).expect("counts");
        assert_eq!(counts.runs, 1);
        assert_eq!(counts.results, 3);
    }
}
