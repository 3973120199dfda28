//! Durable page sinks
//!
//! The core hands a sink a relative path and raw page bytes and requires a
//! durable acknowledgement before the scan advances. Path generation is a
//! deterministic function of collection, entity, run prefix, and page
//! sequence number, so re-running an interrupted scan with the same prefix
//! overwrites rather than duplicates prior pages.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Destination path for one page:
/// `<collection>/<entity>/<run_prefix>_<entity>_<sequence>.xml`
pub fn page_path(collection: &str, entity: &str, run_prefix: &str, sequence: u32) -> String {
    format!("{collection}/{entity}/{run_prefix}_{entity}_{sequence}.xml")
}

/// Durable storage boundary for extracted pages
///
/// A successful return means the page is durably persisted; the scan does
/// not advance past a page until its write is acknowledged. Write failures
/// are not retried by the core.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Durably write `content` at the sink-relative `path`, overwriting any
    /// previous object there.
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
}

/// Sink writing pages beneath a local directory root
///
/// Writes then verifies by re-reading the on-disk length, mirroring the
/// upload-then-verify contract a remote durable store would give.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    /// Sink rooted at `root`; directories are created on demand
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PageSink for LocalDirSink {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let destination = self.root.join(path);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| sink_error(path, &e))?;
        }
        tokio::fs::write(&destination, content)
            .await
            .map_err(|e| sink_error(path, &e))?;

        let written = tokio::fs::metadata(&destination)
            .await
            .map_err(|e| sink_error(path, &e))?
            .len();
        if written != content.len() as u64 {
            return Err(Error::Sink {
                path: path.to_string(),
                message: format!("verification found {written} bytes, expected {}", content.len()),
            });
        }

        tracing::debug!(path, bytes = content.len(), "page persisted");
        Ok(())
    }
}

fn sink_error(path: &str, e: &std::io::Error) -> Error {
    Error::Sink {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! In-memory sinks for exercising the scan loop without a filesystem.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Records every write in order
    pub(crate) struct MemorySink {
        writes: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MemorySink {
        pub(crate) fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn paths(&self) -> Vec<String> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .map(|(path, _)| path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl PageSink for MemorySink {
        async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
            self.writes
                .lock()
                .unwrap()
                .push((path.to_string(), content.to_vec()));
            Ok(())
        }
    }

    /// Succeeds for the first `succeed` writes, then fails every write
    pub(crate) struct FailingSink {
        succeed: u32,
        attempted: AtomicU32,
    }

    impl FailingSink {
        pub(crate) fn after(succeed: u32) -> Self {
            Self {
                succeed,
                attempted: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSink for FailingSink {
        async fn write(&self, path: &str, _content: &[u8]) -> Result<()> {
            let n = self.attempted.fetch_add(1, Ordering::SeqCst);
            if n < self.succeed {
                Ok(())
            } else {
                Err(Error::Sink {
                    path: path.to_string(),
                    message: "simulated storage outage".to_string(),
                })
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_paths_are_deterministic() {
        assert_eq!(
            page_path("Sage_Intacct/data_download", "CUSTOMER", "adhoc", 0),
            "Sage_Intacct/data_download/CUSTOMER/adhoc_CUSTOMER_0.xml"
        );
        assert_eq!(
            page_path("Sage_Intacct/data_download", "VENDOR", "2022_06", 17),
            "Sage_Intacct/data_download/VENDOR/2022_06_VENDOR_17.xml"
        );
    }

    #[tokio::test]
    async fn writes_and_verifies_page_content() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());

        let path = page_path("col", "CUSTOMER", "adhoc", 0);
        sink.write(&path, b"<response/>").await.unwrap();

        let on_disk = std::fs::read(dir.path().join(&path)).unwrap();
        assert_eq!(on_disk, b"<response/>");
    }

    #[tokio::test]
    async fn rerun_with_same_prefix_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());
        let path = page_path("col", "CUSTOMER", "adhoc", 0);

        sink.write(&path, b"first run").await.unwrap();
        sink.write(&path, b"second").await.unwrap();

        let on_disk = std::fs::read(dir.path().join(&path)).unwrap();
        assert_eq!(on_disk, b"second");
    }

    #[tokio::test]
    async fn unwritable_destination_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy the collection path with a file so directory creation fails.
        std::fs::write(dir.path().join("col"), b"blocker").unwrap();
        let sink = LocalDirSink::new(dir.path());

        let err = sink
            .write(&page_path("col", "CUSTOMER", "adhoc", 0), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink { .. }));
    }
}
