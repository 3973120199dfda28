//! Month chunking and audit records for long historical scans
//!
//! A full historical extract is broken into one scan per calendar month:
//! each chunk gets its own `WHENMODIFIED` filter predicate and a `YYYY_MM`
//! file prefix so its pages land beside the other months without
//! colliding. An audit record per chunk tracks totals, remaining count,
//! pages, and status, and is persisted after every chunk so an interrupted
//! extract shows exactly how far it got.

use crate::error::{Error, Result};
use crate::scan::{ScanRequest, Scanner};
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::path::Path;

/// Field the month filters are expressed against
pub const DATE_FIELD: &str = "WHENMODIFIED";

/// One calendar month of a historical extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthChunk {
    /// First day of the month
    pub start: NaiveDate,
    /// Last day of the month
    pub end: NaiveDate,
    /// `YYYY_MM` prefix for this chunk's page files
    pub file_prefix: String,
}

impl MonthChunk {
    /// Filter predicate covering this chunk's date range
    pub fn filter(&self) -> String {
        format!(
            "{DATE_FIELD} >= {} AND {DATE_FIELD} <= {}",
            self.start.format("%m/%d/%Y"),
            self.end.format("%m/%d/%Y")
        )
    }
}

/// Whole calendar months fully contained in `[start, end]`.
///
/// A month is included only when both its first and last day fall inside
/// the range, so `end` is effectively the date *after* the last day to
/// scan when it is a month boundary. Partial months at either edge are
/// dropped; an empty range yields no chunks.
pub fn months_to_scan(start: NaiveDate, end: NaiveDate) -> Vec<MonthChunk> {
    let mut chunks = Vec::new();

    let mut month_start = if start.day() == 1 {
        start
    } else {
        match start
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
        {
            Some(next) => next,
            None => return chunks,
        }
    };

    loop {
        let Some(next_month) = month_start.checked_add_months(Months::new(1)) else {
            break;
        };
        let Some(month_end) = next_month.pred_opt() else {
            break;
        };
        if month_end > end {
            break;
        }
        chunks.push(MonthChunk {
            start: month_start,
            end: month_end,
            file_prefix: month_start.format("%Y_%m").to_string(),
        });
        month_start = next_month;
    }

    chunks
}

/// Progress of one chunk in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Chunk has not been scanned yet
    NeedsLoading,
    /// Chunk scanned to completion
    Finished,
    /// Chunk aborted with an error
    Failed,
}

/// Per-chunk audit record persisted after every chunk completes
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Filter predicate the chunk ran with
    pub query: String,
    /// First day of the chunk
    pub start_date: NaiveDate,
    /// Last day of the chunk
    pub end_date: NaiveDate,
    /// File prefix the chunk's pages were written under
    pub file_prefix: String,
    /// Total records the gateway reported, once scanned
    pub total_rows: Option<u64>,
    /// Records remaining after the final page, once scanned
    pub number_remaining: Option<u64>,
    /// Pages written, once scanned
    pub pages: Option<u32>,
    /// Chunk status
    pub status: AuditStatus,
}

impl AuditRecord {
    fn pending(chunk: &MonthChunk) -> Self {
        Self {
            query: chunk.filter(),
            start_date: chunk.start,
            end_date: chunk.end,
            file_prefix: chunk.file_prefix.clone(),
            total_rows: None,
            number_remaining: None,
            pages: None,
            status: AuditStatus::NeedsLoading,
        }
    }
}

/// Persist the audit log as pretty-printed JSON
pub async fn write_audit(path: &Path, records: &[AuditRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Run a full historical extract for `entity`, one scan per month.
///
/// The audit log at `audit_path` is rewritten after every chunk. The
/// extract stops at the first failing chunk: its record is marked
/// [`AuditStatus::Failed`], the audit is persisted, and the scan error is
/// returned. Chunks already finished keep their pages and audit entries.
pub async fn run_full_extract(
    scanner: &Scanner,
    entity: &str,
    start: NaiveDate,
    end: NaiveDate,
    audit_path: &Path,
) -> Result<Vec<AuditRecord>> {
    let chunks = months_to_scan(start, end);
    let mut audit: Vec<AuditRecord> = chunks.iter().map(AuditRecord::pending).collect();
    tracing::info!(entity, chunks = chunks.len(), "starting full extract");

    for (index, chunk) in chunks.iter().enumerate() {
        let request =
            ScanRequest::new(entity, chunk.filter()).with_run_prefix(&chunk.file_prefix);

        match scanner.run(&request).await {
            Ok(outcome) => {
                audit[index].total_rows = Some(outcome.total_record_count);
                audit[index].number_remaining = Some(outcome.records_remaining);
                audit[index].pages = Some(outcome.pages_written);
                audit[index].status = AuditStatus::Finished;
            }
            Err(scan_error) => {
                audit[index].status = AuditStatus::Failed;
                if let Err(audit_error) = write_audit(audit_path, &audit).await {
                    tracing::warn!(error = %audit_error, "failed to persist audit log");
                }
                return Err(Error::Scan(Box::new(scan_error)));
            }
        }

        write_audit(audit_path, &audit).await?;
        tracing::info!(
            entity,
            prefix = %chunk.file_prefix,
            "finished chunk, audit log saved"
        );
    }

    Ok(audit)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SageConfig, StorageConfig};
    use crate::sink::testing::MemorySink;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn six_whole_months_between_january_and_july() {
        let chunks = months_to_scan(date(2022, 1, 1), date(2022, 7, 1));
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].start, date(2022, 1, 1));
        assert_eq!(chunks[0].end, date(2022, 1, 31));
        assert_eq!(chunks[0].file_prefix, "2022_01");
        assert_eq!(
            chunks[0].filter(),
            "WHENMODIFIED >= 01/01/2022 AND WHENMODIFIED <= 01/31/2022"
        );
        assert_eq!(chunks[5].start, date(2022, 6, 1));
        assert_eq!(chunks[5].end, date(2022, 6, 30));
        assert_eq!(chunks[5].file_prefix, "2022_06");
    }

    #[test]
    fn partial_months_at_the_edges_are_dropped() {
        let chunks = months_to_scan(date(2022, 1, 15), date(2022, 4, 10));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start, date(2022, 2, 1));
        assert_eq!(chunks[1].end, date(2022, 3, 31));
    }

    #[test]
    fn year_boundary_is_handled() {
        let chunks = months_to_scan(date(2021, 12, 1), date(2022, 2, 1));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].file_prefix, "2021_12");
        assert_eq!(chunks[1].file_prefix, "2022_01");
    }

    #[test]
    fn empty_or_inverted_range_yields_no_chunks() {
        assert!(months_to_scan(date(2022, 3, 1), date(2022, 3, 15)).is_empty());
        assert!(months_to_scan(date(2022, 6, 1), date(2022, 1, 1)).is_empty());
    }

    #[tokio::test]
    async fn full_extract_audits_every_chunk() {
        let server = MockServer::start().await;
        let timeout = (Utc::now() + Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%z")
            .to_string();
        Mock::given(method("POST"))
            .and(body_string_contains("getAPISession"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<response><operation><authentication>\
                 <sessiontimeout>{timeout}</sessiontimeout></authentication>\
                 <result><data><api><sessionid>tok-1</sessionid></api></data></result>\
                 </operation></response>"
            )))
            .mount(&server)
            .await;
        // Every month resolves in a single page of 5 records.
        Mock::given(method("POST"))
            .and(body_string_contains("readByQuery"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<response><operation><result>\
                 <data listtype=\"customer\" count=\"5\" numremaining=\"0\" totalcount=\"5\"/>\
                 </result></operation></response>",
            ))
            .expect(2)
            .mount(&server)
            .await;

        let config = Config {
            sage: SageConfig {
                company_id: "acme".into(),
                user_id: "svc".into(),
                user_password: "pw".into(),
                sender_id: "sender".into(),
                sender_password: "pw".into(),
                endpoint: server.uri(),
                page_size: 1000,
                request_timeout_secs: 600,
                max_attempts: 3,
            },
            storage: StorageConfig::default(),
        };
        let sink = Arc::new(MemorySink::new());
        let scanner = Scanner::new(config, sink.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("CUSTOMER_audit.json");
        let audit = run_full_extract(
            &scanner,
            "CUSTOMER",
            date(2022, 1, 1),
            date(2022, 3, 1),
            &audit_path,
        )
        .await
        .unwrap();

        assert_eq!(audit.len(), 2);
        for record in &audit {
            assert_eq!(record.status, AuditStatus::Finished);
            assert_eq!(record.total_rows, Some(5));
            assert_eq!(record.number_remaining, Some(0));
            assert_eq!(record.pages, Some(1));
        }
        assert_eq!(sink.paths().len(), 2);
        assert!(sink.paths()[0].contains("2022_01_CUSTOMER_0.xml"));
        assert!(sink.paths()[1].contains("2022_02_CUSTOMER_0.xml"));

        let persisted = std::fs::read_to_string(&audit_path).unwrap();
        assert!(persisted.contains("\"finished\""));
        assert!(persisted.contains("2022_02"));
    }
}
