//! Catalog Crawler (spec section 4.1, component C1): enumerates the FPPC
//! advice-letter catalog by year and page, and records one row per
//! discovered document in the State Store.

pub mod html;
pub mod http;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fppc_core::checkpoint;
use fppc_core::models::NewDocument;
use fppc_core::{PipelineConfig, StateStore};

use crate::http::fetch_page;

/// Crawler checkpoint file shape (spec section 6: `checkpoint.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    pub last_completed_year: i32,
    pub last_completed_page: u32,
    pub timestamp: String,
}

/// Summary returned by a completed crawl run (spec 4.1: `crawl(...) ->
/// runSummary`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub years_attempted: u32,
    pub years_skipped: u32,
    pub documents_found: u64,
    pub documents_inserted: u64,
}

pub struct Crawler {
    store: StateStore,
    config: PipelineConfig,
    client: reqwest::Client,
}

impl Crawler {
    pub fn new(store: StateStore, config: PipelineConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("FPPC-Research-Bot/1.0 (academic research)")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("reqwest client configuration is always valid");
        Self { store, config, client }
    }

    fn build_year_url(&self, year: i32, page: u32) -> String {
        let mut url = format!(
            "{}?SearchTerm=&tag1=/etc/tags/fppc/year/{year}&tagCount=1",
            self.config.catalog_base_url
        );
        if page > 1 {
            url.push_str(&format!("&page={page}"));
        }
        url
    }

    fn checkpoint_path(&self) -> std::path::PathBuf {
        self.config.checkpoint_path()
    }

    /// Crawl a single year across all its pages (spec 4.1 state machine:
    /// `(start) -> page 1 -> page N -> year-complete`). Returns the number
    /// of results found. Fatal if page 1 cannot be fetched (B1): the year
    /// is skipped and the checkpoint is not advanced past it.
    pub async fn crawl_year(&self, year: i32, start_page: u32) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut page = start_page.max(1);

        let first_url = self.build_year_url(year, page);
        info!(year, page, url = %first_url, "crawling catalog page");
        let Ok(first_html) = fetch_page(
            &self.client,
            &first_url,
            self.config.retry_max_attempts,
            self.config.retry_backoff_base_ms,
        )
        .await
        else {
            warn!(year, "failed to fetch page 1, skipping year (B1)");
            summary.years_skipped = 1;
            return summary;
        };

        let total_results = html::get_result_count(&first_html);
        let total_pages = html::get_page_count(&first_html).unwrap_or(1);

        if total_results.unwrap_or(0) == 0 {
            info!(year, "no results for year");
            return summary;
        }
        summary.years_attempted = 1;

        let mut current_html = Some(first_html);
        loop {
            let html_body = if let Some(body) = current_html.take() {
                body
            } else {
                let url = self.build_year_url(year, page);
                info!(year, page, total_pages, url = %url, "crawling catalog page");
                match fetch_page(
                    &self.client,
                    &url,
                    self.config.retry_max_attempts,
                    self.config.retry_backoff_base_ms,
                )
                .await
                {
                    Ok(body) => body,
                    Err(err) => {
                        warn!(year, page, error = %err, "page fetch failed, skipping page");
                        if page >= total_pages {
                            break;
                        }
                        page += 1;
                        tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;
                        continue;
                    }
                }
            };

            let results = html::parse_results(&html_body);
            if results.is_empty() {
                warn!(year, page, "no results found on page, skipping (parse-failed)");
            }
            summary.documents_found += results.len() as u64;

            let source_page_url = self.build_year_url(year, page);
            for result in &results {
                let result_year = html::extract_year_from_tags(&result.tags)
                    .or_else(|| html::extract_year_from_url(&result.pdf_url))
                    .unwrap_or(year);
                let meta = html::parse_title_metadata(&result.title);

                let new_doc = NewDocument {
                    pdf_url: result.pdf_url.clone(),
                    title_text: Some(result.title.clone()),
                    year_tag: Some(result_year),
                    tags: Some(result.tags.clone()),
                    source_page_url: Some(source_page_url.clone()),
                    requestor_name: meta.requestor_name,
                    letter_id: meta.letter_id,
                    letter_date: meta.letter_date,
                    city: meta.city,
                };

                match self.store.insert_new_document(&new_doc) {
                    Ok(true) => summary.documents_inserted += 1,
                    Ok(false) => {} // duplicate URL: benign no-op (I1)
                    Err(err) => warn!(url = %result.pdf_url, error = %err, "failed to insert document"),
                }
            }

            if let Err(err) = checkpoint::write_checkpoint(
                &self.checkpoint_path(),
                &CrawlCheckpoint {
                    last_completed_year: year,
                    last_completed_page: page,
                    timestamp: fppc_core::models::now_string(),
                },
            ) {
                warn!(error = %err, "failed to write checkpoint");
            }

            if page >= total_pages {
                break;
            }
            page += 1;
            tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;
        }

        summary
    }

    /// Crawl a year range (spec 4.1: `crawl(yearRange, resumePoint?)`). If
    /// `resume_point` is `None`, resumes from the checkpoint (the year
    /// after the last completed one) when present.
    pub async fn crawl(&self, year_range: std::ops::RangeInclusive<i32>, resume_point: Option<i32>) -> RunSummary {
        let start_year = match resume_point {
            Some(year) => year,
            None => match checkpoint::read_checkpoint::<CrawlCheckpoint>(&self.checkpoint_path()) {
                Ok(Some(cp)) => {
                    info!(last_completed_year = cp.last_completed_year, "resuming from checkpoint");
                    cp.last_completed_year + 1
                }
                _ => *year_range.start(),
            },
        };

        let mut total = RunSummary::default();
        for year in start_year..=*year_range.end() {
            let summary = self.crawl_year(year, 1).await;
            total.years_attempted += summary.years_attempted;
            total.years_skipped += summary.years_skipped;
            total.documents_found += summary.documents_found;
            total.documents_inserted += summary.documents_inserted;

            if year < *year_range.end() {
                tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;
            }
        }
        total
    }

    pub fn clear_checkpoint(&self) -> fppc_core::CoreResult<()> {
        checkpoint::clear_checkpoint(&self.checkpoint_path())
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }
}

pub fn load_checkpoint(path: &Path) -> fppc_core::CoreResult<Option<CrawlCheckpoint>> {
    checkpoint::read_checkpoint(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.catalog_base_url = base_url;
        config.politeness_delay_ms = 1;
        config.retry_max_attempts = 2;
        config.retry_backoff_base_ms = 1;
        config.data_root = tempfile::tempdir().unwrap().into_path();
        config
    }

    fn single_hit_page(total: &str, pages: &str) -> String {
        format!(
            r#"<div>{total} results, Page 1 of {pages}</div>
            <div class="hit"><a href="/advice-letters/2024/24006.pdf">Smith - A-24-006 - January 23, 2024 - Sacramento</a>
            <div class="hit-tags">Filed under: Advice Letter, 2024</div></div>"#
        )
    }

    #[tokio::test]
    async fn crawl_year_inserts_discovered_documents() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Regex("tag1=.*2024".to_string()))
            .with_status(200)
            .with_body(single_hit_page("1", "1"))
            .create_async()
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let crawler = Crawler::new(store, test_config(server.url()));
        let summary = crawler.crawl_year(2024, 1).await;

        assert_eq!(summary.documents_found, 1);
        assert_eq!(summary.documents_inserted, 1);
        assert_eq!(summary.years_skipped, 0);

        let doc = crawler.store().get_by_url("/advice-letters/2024/24006.pdf").unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn first_page_failure_skips_year_b1() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let crawler = Crawler::new(store, test_config(server.url()));
        let summary = crawler.crawl_year(1999, 1).await;

        assert_eq!(summary.years_skipped, 1);
        assert_eq!(summary.documents_found, 0);
        // B1: checkpoint must not advance past a skipped year.
        assert!(load_checkpoint(&crawler.config.checkpoint_path()).unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_url_is_a_benign_noop_across_reruns() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Regex("tag1=.*2024".to_string()))
            .with_status(200)
            .with_body(single_hit_page("1", "1"))
            .expect(2)
            .create_async()
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let crawler = Crawler::new(store, test_config(server.url()));
        let first = crawler.crawl_year(2024, 1).await;
        let second = crawler.crawl_year(2024, 1).await;

        assert_eq!(first.documents_inserted, 1);
        assert_eq!(second.documents_inserted, 0);
    }
}
