//! Binary Fetcher (spec section 4.2, component C2): downloads the original
//! binary for each pending row, streaming it to a year-partitioned local
//! directory while computing its SHA-256 incrementally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use fppc_core::models::Document;
use fppc_core::{CoreResult, PipelineConfig, StateStore};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("download failed after retries: {0}")]
    Exhausted(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of fetching one document, used for run-level accounting by the
/// binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { size_bytes: i64 },
    Adopted { size_bytes: i64 },
    Failed,
}

pub struct Fetcher {
    store: StateStore,
    config: PipelineConfig,
    client: reqwest::Client,
}

/// Last path segment of `pdf_url`, guaranteed to end in `.pdf` (spec 4.2 /
/// the Python original's `get_pdf_path`).
pub fn filename_from_url(pdf_url: &str) -> String {
    let trimmed = pdf_url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if last.to_lowercase().ends_with(".pdf") {
        last.to_string()
    } else {
        format!("{last}.pdf")
    }
}

/// Resolve `pdf_url` (which may be a site-relative path) against the FPPC
/// domain.
pub fn absolute_url(pdf_url: &str) -> String {
    if pdf_url.starts_with('/') {
        format!("https://fppc.ca.gov{pdf_url}")
    } else {
        pdf_url.to_string()
    }
}

impl Fetcher {
    pub fn new(store: StateStore, config: PipelineConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("FPPC-Research-Bot/1.0 (academic research)")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("reqwest client configuration is always valid");
        Self { store, config, client }
    }

    pub fn local_path(&self, doc: &Document) -> PathBuf {
        let year = doc.year_tag.unwrap_or(0);
        self.config.raw_dir(year).join(filename_from_url(&doc.pdf_url))
    }

    /// Process a single row: adopt an existing local file without
    /// re-downloading (B2), otherwise stream-download with bounded
    /// exponential-backoff retries and hash incrementally.
    pub async fn fetch_one(&self, doc: &Document) -> CoreResult<FetchOutcome> {
        let dest = self.local_path(doc);

        if dest.exists() {
            let (size, sha256) = hash_existing_file(&dest)?;
            self.store.mark_downloaded(doc.id, size as i64, &sha256)?;
            info!(id = doc.id, path = %dest.display(), "adopted existing local file (B2)");
            return Ok(FetchOutcome::Adopted { size_bytes: size as i64 });
        }

        match self.download_with_retry(&absolute_url(&doc.pdf_url), &dest).await {
            Ok((size, sha256)) => {
                self.store.mark_downloaded(doc.id, size as i64, &sha256)?;
                info!(id = doc.id, bytes = size, "downloaded");
                Ok(FetchOutcome::Downloaded { size_bytes: size as i64 })
            }
            Err(err) => {
                warn!(id = doc.id, error = %err, "download failed after retries");
                let _ = std::fs::remove_file(&dest);
                self.store.mark_download_failed(doc.id)?;
                Ok(FetchOutcome::Failed)
            }
        }
    }

    async fn download_with_retry(&self, url: &str, dest: &Path) -> Result<(u64, String), FetchError> {
        let max_attempts = self.config.retry_max_attempts;
        let mut attempt = 0;
        loop {
            match self.download_once(url, dest).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    let delay = Duration::from_millis(
                        self.config.retry_backoff_base_ms.saturating_mul(1u64 << attempt.min(6)),
                    );
                    warn!(%url, attempt, ?delay, error = %err, "download attempt failed, retrying");
                    let _ = std::fs::remove_file(dest);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<(u64, String), FetchError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Exhausted(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Exhausted(e.to_string()))?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut file = tokio::fs::File::create(dest).await?;
        use tokio::io::AsyncWriteExt;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Exhausted(e.to_string()))?
        {
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok((size, hex::encode(hasher.finalize())))
    }

    /// Politeness delay between successive downloads (spec 4.2).
    pub async fn politeness_delay(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn pending(&self, limit: Option<i64>) -> CoreResult<Vec<Document>> {
        self.store.pending_downloads(limit)
    }
}

fn hash_existing_file(path: &Path) -> CoreResult<(u64, String)> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fppc_core::models::NewDocument;

    fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.data_root = tempfile::tempdir().unwrap().into_path();
        config.retry_max_attempts = 2;
        config.retry_backoff_base_ms = 1;
        config
    }

    fn insert_pending(store: &StateStore, url: &str, year: i32) -> Document {
        store
            .insert_new_document(&NewDocument {
                pdf_url: url.to_string(),
                title_text: None,
                year_tag: Some(year),
                tags: None,
                source_page_url: None,
                requestor_name: None,
                letter_id: None,
                letter_date: None,
                city: None,
            })
            .unwrap();
        store.get_by_url(url).unwrap().unwrap()
    }

    #[test]
    fn filename_from_url_appends_pdf_extension_when_missing() {
        assert_eq!(filename_from_url("https://x/y/24006"), "24006.pdf");
        assert_eq!(filename_from_url("https://x/y/24006.pdf"), "24006.pdf");
        assert_eq!(filename_from_url("https://x/y/24006.pdf/"), "24006.pdf");
    }

    #[test]
    fn absolute_url_resolves_relative_paths_against_fppc_domain() {
        assert_eq!(absolute_url("/advice-letters/2024/24006.pdf"), "https://fppc.ca.gov/advice-letters/2024/24006.pdf");
        assert_eq!(absolute_url("https://fppc.ca.gov/x.pdf"), "https://fppc.ca.gov/x.pdf");
    }

    #[tokio::test]
    async fn downloads_and_marks_row_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/doc.pdf")
            .with_status(200)
            .with_body(b"%PDF-1.4 fake content".to_vec())
            .create_async()
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let url = format!("{}/doc.pdf", server.url());
        let doc = insert_pending(&store, &url, 2024);

        let store2 = store.clone();
        let fetcher = Fetcher::new(store2, test_config());
        let outcome = fetcher.fetch_one(&doc).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Downloaded { .. }));

        let refreshed = fetcher.store().get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(refreshed.download_status, fppc_core::models::DownloadStatus::Downloaded);
        assert!(refreshed.pdf_sha256.is_some());
    }

    #[tokio::test]
    async fn existing_local_file_is_adopted_without_redownload_b2() {
        let store = StateStore::open_in_memory().unwrap();
        let doc = insert_pending(&store, "https://example.test/never-fetched.pdf", 2024);

        let config = test_config();
        let fetcher = Fetcher::new(store.clone(), config);
        let dest = fetcher.local_path(&doc);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"pre-existing bytes").unwrap();

        let outcome = fetcher.fetch_one(&doc).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Adopted { size_bytes } if size_bytes == 19));

        let refreshed = fetcher.store().get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(refreshed.download_status, fppc_core::models::DownloadStatus::Downloaded);
    }

    #[tokio::test]
    async fn persistent_failure_marks_row_failed() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone.pdf")
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let url = format!("{}/gone.pdf", server.url());
        let doc = insert_pending(&store, &url, 2024);

        let fetcher = Fetcher::new(store.clone(), test_config());
        let outcome = fetcher.fetch_one(&doc).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Failed);

        let refreshed = fetcher.store().get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(refreshed.download_status, fppc_core::models::DownloadStatus::Failed);
    }
}
