use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::documents;

use super::enums::{DownloadStatus, ExtractionMethod, ExtractionStatus, FidelityMethod, FidelityRisk};

/// One row of the `documents` table (spec section 3 / 6).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Document {
    pub id: i32,

    // Catalog facet
    pub pdf_url: String,
    pub title_text: Option<String>,
    pub year_tag: Option<i32>,
    pub tags: Option<String>,
    pub source_page_url: Option<String>,

    // Title-parsed facet
    pub requestor_name: Option<String>,
    pub letter_id: Option<String>,
    pub letter_date: Option<String>,
    pub city: Option<String>,

    // Binary facet
    pub download_status: DownloadStatus,
    pub downloaded_at: Option<String>,
    pub pdf_size_bytes: Option<i64>,
    pub pdf_sha256: Option<String>,

    // Extraction facet
    pub extraction_status: ExtractionStatus,
    pub extraction_method: Option<String>,
    pub extraction_quality: Option<f32>,
    pub page_count: Option<i32>,
    pub word_count: Option<i32>,
    pub extracted_at: Option<String>,
    pub section_confidence: Option<f32>,
    pub json_path: Option<String>,
    pub needs_llm_extraction: i32,
    pub llm_extracted_at: Option<String>,

    // Fidelity facet
    pub fidelity_score: Option<f32>,
    pub fidelity_method: Option<String>,
    pub fidelity_risk: FidelityRisk,

    // Timestamps
    pub scraped_at: String,
    pub updated_at: Option<String>,
}

impl Document {
    pub fn needs_llm_extraction(&self) -> bool {
        self.needs_llm_extraction != 0
    }
}

/// A newly discovered catalog entry, not yet persisted (spec 4.1).
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub pdf_url: String,
    pub title_text: Option<String>,
    pub year_tag: Option<i32>,
    pub tags: Option<String>,
    pub source_page_url: Option<String>,
    pub requestor_name: Option<String>,
    pub letter_id: Option<String>,
    pub letter_date: Option<String>,
    pub city: Option<String>,
}

impl NewDocument {
    pub fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}
