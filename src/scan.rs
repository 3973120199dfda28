//! Pagination cursor state machine
//!
//! Drives one scan: obtain a valid session, issue the `readByQuery`, then
//! alternate `readMore` fetches while the gateway reports records remaining,
//! writing each page durably before advancing. The cursor is strictly
//! sequential by construction (page N+1 requires page N's result handle),
//! so the loop is a single logical thread of control:
//!
//! ```text
//! Start -> FetchedFirstPage -> (FetchingNextPage <-> FetchedNextPage)* -> Done
//! ```
//!
//! The session is re-validated *before* every page fetch, not only after a
//! failure. Any parse failure is fatal for the scan; pages already written
//! remain on the sink and the error carries the completed-page count.

use crate::config::Config;
use crate::error::{Error, Result, ScanError};
use crate::request::{Operation, build_request};
use crate::session::SessionManager;
use crate::sink::{PageSink, page_path};
use crate::transport::Transport;
use crate::wire;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Pagination metadata parsed from one query response
///
/// Consumed immediately to decide continuation; not retained across pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// List type reported by the gateway (lowercased entity name)
    pub entity: String,
    /// Continuation token for the next page, if the gateway returned one
    pub result_handle: Option<String>,
    /// Records in this page
    pub count: u64,
    /// Records remaining after this page
    pub remaining: u64,
    /// Total records matching the query
    pub total: u64,
}

/// Parameters for one scan, immutable for its lifetime
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Entity name, e.g. `CUSTOMER`
    pub entity: String,
    /// Filter predicate passed to `readByQuery`
    pub filter: String,
    /// Records per page
    pub page_size: u32,
    /// Prefix baked into every page's file name; re-running with the same
    /// prefix overwrites prior pages
    pub run_prefix: String,
}

impl ScanRequest {
    /// Scan request with the default page size (1000) and `adhoc` run prefix
    pub fn new(entity: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filter: filter.into(),
            page_size: 1000,
            run_prefix: "adhoc".to_string(),
        }
    }

    /// Replace the run prefix (e.g. a `YYYY_MM` chunk prefix)
    pub fn with_run_prefix(mut self, run_prefix: impl Into<String>) -> Self {
        self.run_prefix = run_prefix.into();
        self
    }
}

/// Terminal summary of a completed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    /// Total records the gateway reported for the query
    pub total_record_count: u64,
    /// Records remaining after the final page; 0 on success
    pub records_remaining: u64,
    /// Pages durably written
    pub pages_written: u32,
}

/// Runs scans against one gateway with one sink
pub struct Scanner {
    config: Config,
    transport: Transport,
    sessions: SessionManager,
    sink: Arc<dyn PageSink>,
}

impl Scanner {
    /// Build a scanner from configuration and a durable sink
    pub fn new(config: Config, sink: Arc<dyn PageSink>) -> Result<Self> {
        let transport = Transport::new(&config.sage)?;
        let sessions = SessionManager::new(config.sage.clone(), transport.clone());
        Ok(Self {
            config,
            transport,
            sessions,
            sink,
        })
    }

    /// Run one scan to completion.
    ///
    /// Returns the terminal [`ScanOutcome`] once the gateway reports no
    /// records remaining, or a [`ScanError`] carrying the entity and the
    /// number of pages durably written before the failure.
    pub async fn run(&self, request: &ScanRequest) -> std::result::Result<ScanOutcome, ScanError> {
        let mut pages_written = 0;
        match self.run_inner(request, &mut pages_written).await {
            Ok(outcome) => Ok(outcome),
            Err(source) => Err(ScanError {
                entity: request.entity.clone(),
                pages_written,
                source,
            }),
        }
    }

    async fn run_inner(
        &self,
        request: &ScanRequest,
        pages_written: &mut u32,
    ) -> Result<ScanOutcome> {
        let started = Instant::now();
        tracing::info!(entity = %request.entity, filter = %request.filter, "starting scan");

        let mut session = self.sessions.ensure_valid(None).await?;
        let operation = Operation::Query {
            entity: &request.entity,
            fields: "*",
            filter: &request.filter,
            page_size: request.page_size,
        };
        let document = build_request(&self.config.sage, Some(&session), &operation)?;
        let body = self.transport.send(&document).await?;
        let mut page = parse_page_result(&body)?;
        self.write_page(request, 0, &body).await?;
        *pages_written = 1;
        tracing::info!(
            entity = %request.entity,
            page = 0,
            remaining = page.remaining,
            total = page.total,
            "finished page"
        );

        let mut sequence: u32 = 1;
        while page.remaining > 0 {
            // Proactive renewal; no fetch is spent on an expired token.
            session = self.sessions.ensure_valid(Some(session)).await?;

            let handle = page.result_handle.take().ok_or_else(|| Error::PageParse {
                detail: "resultId attribute required to fetch next page".to_string(),
            })?;
            let operation = Operation::NextPage {
                result_handle: &handle,
            };
            let document = build_request(&self.config.sage, Some(&session), &operation)?;
            let body = self.transport.send(&document).await?;

            let previous_remaining = page.remaining;
            page = parse_page_result(&body)?;
            if page.remaining >= previous_remaining {
                tracing::warn!(
                    entity = %request.entity,
                    page = sequence,
                    previous = previous_remaining,
                    remaining = page.remaining,
                    "records remaining did not decrease"
                );
            }

            self.write_page(request, sequence, &body).await?;
            *pages_written += 1;
            tracing::info!(
                entity = %request.entity,
                page = sequence,
                remaining = page.remaining,
                total = page.total,
                "finished page"
            );
            sequence += 1;
        }

        tracing::info!(
            entity = %request.entity,
            pages = *pages_written,
            total = page.total,
            elapsed = ?started.elapsed(),
            "scan complete"
        );
        Ok(ScanOutcome {
            total_record_count: page.total,
            records_remaining: page.remaining,
            pages_written: *pages_written,
        })
    }

    async fn write_page(&self, request: &ScanRequest, sequence: u32, body: &str) -> Result<()> {
        let path = page_path(
            &self.config.storage.collection,
            &request.entity,
            &request.run_prefix,
            sequence,
        );
        self.sink.write(&path, body.as_bytes()).await
    }
}

/// Parse pagination metadata from a query response.
///
/// The gateway reports it as attributes of the `<data>` element:
/// `listtype`, `resultId`, `count`, `numremaining`, `totalcount`.
/// `resultId` is optional (absent once nothing remains); the counters and
/// list type are mandatory and their absence is a [`Error::PageParse`].
pub fn parse_page_result(xml: &str) -> Result<PageResult> {
    let attributes =
        wire::first_element_attributes(xml, "data")?.ok_or_else(|| Error::PageParse {
            detail: "<data> element not present in response".to_string(),
        })?;

    let entity = attributes
        .get("listtype")
        .cloned()
        .ok_or_else(|| missing("listtype attribute"))?;
    let count = counter(&attributes, "count")?;
    let remaining = counter(&attributes, "numremaining")?;
    let total = counter(&attributes, "totalcount")?;

    Ok(PageResult {
        entity,
        result_handle: attributes.get("resultId").cloned(),
        count,
        remaining,
        total,
    })
}

fn counter(attributes: &std::collections::HashMap<String, String>, name: &str) -> Result<u64> {
    let raw = attributes
        .get(name)
        .ok_or_else(|| missing(&format!("{name} attribute")))?;
    raw.trim()
        .parse()
        .map_err(|_| missing(&format!("numeric {name} attribute (got {raw:?})")))
}

fn missing(detail: &str) -> Error {
    Error::PageParse {
        detail: detail.to_string(),
    }
}
