//! The State Store (spec section 3/6): the single shared SQLite-backed
//! relational datastore holding one row per Document and its lifecycle
//! statuses. Every write is a short-held, single-row `UPDATE`; no cross-row
//! transaction is ever required (spec section 5 "Shared-resource policy").

use std::path::Path;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{CoreError, CoreResult};
use crate::models::document::now_string;
use crate::models::enums::{DownloadStatus, ExtractionStatus, FidelityRisk};
use crate::models::{Document, NewDocument};
use crate::schema::documents::dsl as d;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledSqlite = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

/// Aggregate counts by download status (`--stats`, spec appendix B:
/// `get_download_stats` in the Python original).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DownloadStats {
    pub pending: i64,
    pub downloaded: i64,
    pub failed: i64,
    pub total_bytes: i64,
}

/// Aggregate counts across the whole pipeline (`--stats`, `get_stats`).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineStats {
    pub total_documents: i64,
    pub by_download_status: Vec<(String, i64)>,
    pub by_extraction_status: Vec<(String, i64)>,
    pub by_fidelity_risk: Vec<(String, i64)>,
    pub by_year: Vec<(i32, i64)>,
    pub needs_llm_extraction: i64,
}

impl StateStore {
    /// Open (creating if absent) the SQLite file at `path` and run any
    /// pending migrations.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let database_url = path.to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&database_url);
        let pool = Pool::builder()
            .build(manager)
            .map_err(|e| CoreError::PoolBuild(e.to_string()))?;

        {
            let mut conn = pool.get()?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| CoreError::Migration(e.to_string()))?;
        }

        Ok(Self { pool })
    }

    /// In-memory store, used by unit and integration tests.
    pub fn open_in_memory() -> CoreResult<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| CoreError::PoolBuild(e.to_string()))?;
        {
            let mut conn = pool.get()?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| CoreError::Migration(e.to_string()))?;
        }
        Ok(Self { pool })
    }

    fn conn(&self) -> CoreResult<PooledSqlite> {
        Ok(self.pool.get()?)
    }

    /// Insert a freshly-crawled catalog row. A duplicate `pdf_url` (I1) is
    /// a benign no-op — the crawler may safely re-enumerate a page it has
    /// already seen.
    pub fn insert_new_document(&self, new_doc: &NewDocument) -> CoreResult<bool> {
        let mut conn = self.conn()?;
        let result = diesel::insert_into(d::documents)
            .values(new_doc)
            .execute(&mut conn);
        match result {
            Ok(n) => Ok(n > 0),
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_by_id(&self, id: i32) -> CoreResult<Option<Document>> {
        let mut conn = self.conn()?;
        Ok(d::documents
            .filter(d::id.eq(id))
            .first::<Document>(&mut conn)
            .optional()?)
    }

    pub fn get_by_url(&self, url: &str) -> CoreResult<Option<Document>> {
        let mut conn = self.conn()?;
        Ok(d::documents
            .filter(d::pdf_url.eq(url))
            .first::<Document>(&mut conn)
            .optional()?)
    }

    /// Rows awaiting the Binary Fetcher, ascending year then surrogate key
    /// (spec section 5 "Ordering guarantees").
    pub fn pending_downloads(&self, limit: Option<i64>) -> CoreResult<Vec<Document>> {
        let mut conn = self.conn()?;
        let mut query = d::documents
            .filter(d::download_status.eq(DownloadStatus::Pending))
            .order((d::year_tag.asc(), d::id.asc()))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(query.load::<Document>(&mut conn)?)
    }

    pub fn mark_downloaded(
        &self,
        id: i32,
        size_bytes: i64,
        sha256: &str,
    ) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::download_status.eq(DownloadStatus::Downloaded),
                d::downloaded_at.eq(now_string()),
                d::pdf_size_bytes.eq(size_bytes),
                d::pdf_sha256.eq(sha256),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn mark_download_failed(&self, id: i32) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::download_status.eq(DownloadStatus::Failed),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Rows awaiting the Text Extractor (I2: must already be downloaded).
    pub fn pending_extractions(&self, limit: Option<i64>) -> CoreResult<Vec<Document>> {
        let mut conn = self.conn()?;
        let mut query = d::documents
            .filter(d::download_status.eq(DownloadStatus::Downloaded))
            .filter(d::extraction_status.eq(ExtractionStatus::Pending))
            .order((d::year_tag.asc(), d::id.asc()))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(query.load::<Document>(&mut conn)?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mark_extracted(
        &self,
        id: i32,
        method: &str,
        quality_score: f32,
        page_count: i32,
        word_count: i32,
        section_confidence: f32,
        json_path: &str,
        needs_llm_extraction: bool,
    ) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::extraction_status.eq(ExtractionStatus::Extracted),
                d::extraction_method.eq(method),
                d::extraction_quality.eq(quality_score),
                d::page_count.eq(page_count),
                d::word_count.eq(word_count),
                d::extracted_at.eq(now_string()),
                d::section_confidence.eq(section_confidence),
                d::json_path.eq(json_path),
                d::needs_llm_extraction.eq(needs_llm_extraction as i32),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn mark_extraction_error(&self, id: i32, _note: &str) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::extraction_status.eq(ExtractionStatus::Error),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Set fidelity columns directly (used by I4's native-trusted shortcut,
    /// by Verifier phases, and by synthetic backfill).
    pub fn update_fidelity(
        &self,
        id: i32,
        score: f32,
        method: &str,
        risk: FidelityRisk,
    ) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::fidelity_score.eq(score),
                d::fidelity_method.eq(method),
                d::fidelity_risk.eq(risk),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Rows flagged for LLM synthesis: extracted, flag set, not yet run.
    pub fn pending_llm_synthesis(&self, limit: Option<i64>) -> CoreResult<Vec<Document>> {
        let mut conn = self.conn()?;
        let mut query = d::documents
            .filter(d::extraction_status.eq(ExtractionStatus::Extracted))
            .filter(d::needs_llm_extraction.eq(1))
            .filter(d::llm_extracted_at.is_null())
            .order((d::year_tag.asc(), d::id.asc()))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(query.load::<Document>(&mut conn)?)
    }

    pub fn mark_synthesised(&self, id: i32, section_confidence: f32) -> CoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(d::documents.filter(d::id.eq(id)))
            .set((
                d::needs_llm_extraction.eq(0),
                d::llm_extracted_at.eq(now_string()),
                d::section_confidence.eq(section_confidence),
                d::updated_at.eq(now_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Documents whose extraction method is vision-OCR (Verifier Phase 1
    /// candidates, spec 4.7).
    pub fn vision_ocr_documents(&self) -> CoreResult<Vec<Document>> {
        let mut conn = self.conn()?;
        Ok(d::documents
            .filter(d::extraction_method.eq("vision-ocr"))
            .order((d::year_tag.asc(), d::id.asc()))
            .load::<Document>(&mut conn)?)
    }

    pub fn documents_with_risk(&self, risk: FidelityRisk) -> CoreResult<Vec<Document>> {
        let mut conn = self.conn()?;
        Ok(d::documents
            .filter(d::fidelity_risk.eq(risk))
            .order((d::year_tag.asc(), d::id.asc()))
            .load::<Document>(&mut conn)?)
    }

    /// Retroactively stamp fidelity columns on any already-extracted
    /// `embedded`/`embedded+vision-ocr` row missing them (SPEC_FULL.md B,
    /// `backfill_native_fidelity` in the Python original's `scraper/db.py`).
    /// I4 asserts embedded extraction is a-priori trusted, so this is not a
    /// re-assessment, purely a column backfill. Returns the number updated.
    pub fn backfill_native_fidelity(&self) -> CoreResult<usize> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            d::documents
                .filter(d::extraction_status.eq(ExtractionStatus::Extracted))
                .filter(
                    d::extraction_method
                        .eq("embedded")
                        .or(d::extraction_method.eq("embedded+vision-ocr")),
                )
                .filter(d::fidelity_score.is_null()),
        )
        .set((
            d::fidelity_score.eq(1.0_f32),
            d::fidelity_method.eq("native-trusted"),
            d::fidelity_risk.eq(FidelityRisk::Verified),
            d::updated_at.eq(now_string()),
        ))
        .execute(&mut conn)?;
        Ok(updated)
    }

    /// Diagnostic query for a store that should structurally never contain
    /// duplicates (I1); retained as a corruption canary (SPEC_FULL.md B,
    /// `check_duplicates`).
    pub fn find_duplicate_urls(&self) -> CoreResult<Vec<(String, i64)>> {
        let mut conn = self.conn()?;
        let rows: Vec<Document> = d::documents.load(&mut conn)?;
        let mut counts = std::collections::HashMap::<String, i64>::new();
        for row in rows {
            *counts.entry(row.pdf_url).or_insert(0) += 1;
        }
        let mut dupes: Vec<(String, i64)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
        dupes.sort();
        Ok(dupes)
    }

    pub fn download_stats(&self) -> CoreResult<DownloadStats> {
        let mut conn = self.conn()?;
        let rows: Vec<(DownloadStatus, Option<i64>)> = d::documents
            .select((d::download_status, d::pdf_size_bytes))
            .load(&mut conn)?;
        let mut stats = DownloadStats::default();
        for (status, size) in rows {
            match status {
                DownloadStatus::Pending => stats.pending += 1,
                DownloadStatus::Downloaded => {
                    stats.downloaded += 1;
                    stats.total_bytes += size.unwrap_or(0);
                }
                DownloadStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    pub fn stats(&self) -> CoreResult<PipelineStats> {
        let mut conn = self.conn()?;
        let total_documents = d::documents.count().get_result::<i64>(&mut conn)?;
        let needs_llm_extraction = d::documents
            .filter(d::needs_llm_extraction.eq(1))
            .count()
            .get_result::<i64>(&mut conn)?;

        let rows: Vec<Document> = d::documents.load(&mut conn)?;
        let mut by_download = std::collections::HashMap::<String, i64>::new();
        let mut by_extraction = std::collections::HashMap::<String, i64>::new();
        let mut by_fidelity = std::collections::HashMap::<String, i64>::new();
        let mut by_year = std::collections::HashMap::<i32, i64>::new();
        for row in &rows {
            *by_download.entry(row.download_status.to_string()).or_insert(0) += 1;
            *by_extraction
                .entry(row.extraction_status.to_string())
                .or_insert(0) += 1;
            *by_fidelity.entry(row.fidelity_risk.to_string()).or_insert(0) += 1;
            if let Some(year) = row.year_tag {
                *by_year.entry(year).or_insert(0) += 1;
            }
        }

        let mut by_download_status: Vec<_> = by_download.into_iter().collect();
        by_download_status.sort();
        let mut by_extraction_status: Vec<_> = by_extraction.into_iter().collect();
        by_extraction_status.sort();
        let mut by_fidelity_risk: Vec<_> = by_fidelity.into_iter().collect();
        by_fidelity_risk.sort();
        let mut by_year_vec: Vec<_> = by_year.into_iter().collect();
        by_year_vec.sort();

        Ok(PipelineStats {
            total_documents,
            by_download_status,
            by_extraction_status,
            by_fidelity_risk,
            by_year: by_year_vec,
            needs_llm_extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_doc(url: &str) -> NewDocument {
        NewDocument {
            pdf_url: url.to_string(),
            title_text: Some("Smith - A-24-001 - 1/1/2024 - Sacramento".into()),
            year_tag: Some(2024),
            tags: Some("2024".into()),
            source_page_url: Some("https://fppc.ca.gov/page?tag1=2024".into()),
            requestor_name: Some("Smith".into()),
            letter_id: Some("A-24-001".into()),
            letter_date: Some("1/1/2024".into()),
            city: Some("Sacramento".into()),
        }
    }

    #[test]
    fn duplicate_url_insert_is_benign_noop() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store
            .insert_new_document(&sample_new_doc("https://x/a.pdf"))
            .unwrap());
        assert!(!store
            .insert_new_document(&sample_new_doc("https://x/a.pdf"))
            .unwrap());
        assert!(store.find_duplicate_urls().unwrap().is_empty());
    }

    #[test]
    fn lifecycle_transitions_advance_in_order() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .insert_new_document(&sample_new_doc("https://x/b.pdf"))
            .unwrap();
        let doc = store.get_by_url("https://x/b.pdf").unwrap().unwrap();
        assert_eq!(doc.download_status, DownloadStatus::Pending);

        store.mark_downloaded(doc.id, 1234, "deadbeef").unwrap();
        let doc = store.get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(doc.download_status, DownloadStatus::Downloaded);
        assert_eq!(doc.pdf_size_bytes, Some(1234));

        store
            .mark_extracted(doc.id, "embedded", 0.95, 3, 400, 0.9, "extracted/2024/a.json", false)
            .unwrap();
        let doc = store.get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(doc.extraction_status, ExtractionStatus::Extracted);
        assert_eq!(doc.extraction_method.as_deref(), Some("embedded"));
    }

    #[test]
    fn backfill_native_fidelity_stamps_embedded_rows_only() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .insert_new_document(&sample_new_doc("https://x/c.pdf"))
            .unwrap();
        let doc = store.get_by_url("https://x/c.pdf").unwrap().unwrap();
        store.mark_downloaded(doc.id, 10, "aa").unwrap();
        store
            .mark_extracted(doc.id, "embedded", 0.9, 1, 100, 0.9, "p.json", false)
            .unwrap();

        let updated = store.backfill_native_fidelity().unwrap();
        assert_eq!(updated, 1);
        let doc = store.get_by_id(doc.id).unwrap().unwrap();
        assert_eq!(doc.fidelity_risk, FidelityRisk::Verified);
        assert_eq!(doc.fidelity_score, Some(1.0));

        // idempotent: second backfill touches nothing.
        assert_eq!(store.backfill_native_fidelity().unwrap(), 0);
    }

    #[test]
    fn pending_downloads_orders_by_year_then_id() {
        let store = StateStore::open_in_memory().unwrap();
        let mut later = sample_new_doc("https://x/late.pdf");
        later.year_tag = Some(2010);
        let mut earlier = sample_new_doc("https://x/early.pdf");
        earlier.year_tag = Some(1990);
        store.insert_new_document(&later).unwrap();
        store.insert_new_document(&earlier).unwrap();

        let pending = store.pending_downloads(None).unwrap();
        assert_eq!(pending[0].pdf_url, "https://x/early.pdf");
        assert_eq!(pending[1].pdf_url, "https://x/late.pdf");
    }
}
