//! Citation Graph (spec section 3 "Derived entity"): a post-pass over the
//! whole extracted corpus that resolves each document's `prior_opinions`
//! citations against every other document's `letter_id`, writes the reverse
//! `cited_by` index back into each Structured Record, and reports citation
//! targets that don't resolve to any document in the corpus. Grounded on the
//! original `build_citation_graph.py`.

pub mod error;

pub use error::{CitegraphError, CitegraphResult};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use fppc_core::models::StructuredRecord;
use fppc_parser::self_citation::letter_id_variants;

/// One dangling citation target: cited by the corpus but not present in it
/// (spec: known_gaps report, `build_citation_graph.py`'s `known_gaps.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub cited_by_count: usize,
    pub example_citing_docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnownGapsReport {
    pub description: String,
    pub total_gaps: usize,
    pub total_dangling_edges: usize,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphSummary {
    pub documents: usize,
    pub total_edges: usize,
    pub resolved_edges: usize,
    pub dangling_edges: usize,
    pub documents_updated: usize,
    pub documents_unchanged: usize,
    pub most_cited: Option<(String, usize)>,
}

/// One loaded Structured Record, kept alongside the path it was read from
/// so the graph builder can write it back in place.
struct LoadedDoc {
    path: PathBuf,
    record: StructuredRecord,
}

/// Build a variant->canonical lookup over every known `letter_id`, reusing
/// the same variant-generation rules the self-citation filter uses (spec
/// 4.5.3), rather than re-deriving FPPC's identifier quirks a second time.
fn build_id_lookup(known_ids: &BTreeSet<String>) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    for canonical in known_ids {
        lookup.insert(canonical.clone(), canonical.clone());
        for variant in letter_id_variants(canonical) {
            lookup.entry(variant).or_insert_with(|| canonical.clone());
        }
    }
    lookup
}

fn load_all(extracted_dir: &Path) -> CitegraphResult<Vec<LoadedDoc>> {
    let mut docs = Vec::new();
    for entry in WalkDir::new(extracted_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let body = match std::fs::read_to_string(entry.path()) {
            Ok(body) => body,
            Err(_) => continue,
        };
        let record: StructuredRecord = match serde_json::from_str(&body) {
            Ok(record) => record,
            Err(_) => continue,
        };
        docs.push(LoadedDoc { path: entry.path().to_path_buf(), record });
    }
    Ok(docs)
}

/// Build the citation graph over every Structured Record under
/// `extracted_dir`, writing the resolved `cited_by` index back into each
/// file (unless `dry_run`), and returning a summary plus the dangling-gap
/// report.
pub fn build_graph(extracted_dir: &Path, dry_run: bool) -> CitegraphResult<(GraphSummary, KnownGapsReport)> {
    let mut docs = load_all(extracted_dir)?;

    let known_ids: BTreeSet<String> = docs.iter().map(|d| d.record.letter_id.clone()).collect();
    let lookup = build_id_lookup(&known_ids);

    let mut cited_by: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut dangling: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut total_edges = 0usize;
    let mut resolved_edges = 0usize;

    for doc in &docs {
        for cited_id in &doc.record.citations.prior_opinions {
            total_edges += 1;
            match lookup.get(cited_id) {
                Some(canonical) => {
                    cited_by.entry(canonical.clone()).or_default().insert(doc.record.letter_id.clone());
                    resolved_edges += 1;
                }
                None => {
                    dangling.entry(cited_id.clone()).or_default().insert(doc.record.letter_id.clone());
                }
            }
        }
    }

    let mut summary = GraphSummary {
        documents: docs.len(),
        total_edges,
        resolved_edges,
        dangling_edges: total_edges - resolved_edges,
        ..Default::default()
    };

    for doc in &mut docs {
        let new_cited_by: Vec<String> = cited_by
            .get(&doc.record.letter_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        if new_cited_by == doc.record.citations.cited_by {
            summary.documents_unchanged += 1;
            continue;
        }
        doc.record.citations.cited_by = new_cited_by;
        summary.documents_updated += 1;
        if !dry_run {
            let json = serde_json::to_string_pretty(&doc.record)?;
            std::fs::write(&doc.path, json)?;
        }
    }

    summary.most_cited = cited_by
        .iter()
        .max_by_key(|(_, citing)| citing.len())
        .map(|(id, citing)| (id.clone(), citing.len()));

    let mut gaps: Vec<Gap> = dangling
        .into_iter()
        .map(|(id, citing)| Gap {
            id,
            cited_by_count: citing.len(),
            example_citing_docs: citing.into_iter().take(10).collect(),
        })
        .collect();
    gaps.sort_by(|a, b| b.cited_by_count.cmp(&a.cited_by_count).then_with(|| a.id.cmp(&b.id)));

    let report = KnownGapsReport {
        description: "FPPC advice letters cited by the corpus but not found as documents".to_string(),
        total_gaps: gaps.len(),
        total_dangling_edges: summary.dangling_edges,
        gaps,
    };

    Ok((summary, report))
}

pub fn write_known_gaps_report(data_root: &Path, report: &KnownGapsReport, dry_run: bool) -> CitegraphResult<()> {
    if dry_run {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(data_root.join("known_gaps.json"), json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fppc_core::models::{
        Classification, CitationSet, Content, EmbeddingPayload, Extraction, ExtractionMethod,
        Fidelity, ParsedMetadata, Sections, SourceMetadata,
    };

    fn sample(letter_id: &str, prior_opinions: Vec<&str>) -> StructuredRecord {
        StructuredRecord {
            id: 1,
            year: 2022,
            letter_id: letter_id.to_string(),
            pdf_url: format!("https://fppc.ca.gov/{letter_id}.pdf"),
            pdf_sha256: "abc".into(),
            local_pdf_path: "raw/2022/x.pdf".into(),
            source_metadata: SourceMetadata::default(),
            extraction: Extraction {
                method: ExtractionMethod::Embedded,
                extracted_at: "2022-01-01T00:00:00+00:00".into(),
                quality_score: 0.9,
                page_count: 1,
                word_count: 100,
                char_count: 500,
                api_cost_usd: 0.0,
                section_confidence: 0.9,
                needs_llm_extraction: false,
                llm_synthesised_at: None,
            },
            content: Content { full_text: "text".into(), formatted_text: None },
            parsed: ParsedMetadata::default(),
            sections: Sections::default(),
            citations: CitationSet {
                government_code: vec![],
                regulations: vec![],
                prior_opinions: prior_opinions.into_iter().map(String::from).collect(),
                external: vec![],
                cited_by: vec![],
            },
            classification: Classification::default(),
            embedding: EmbeddingPayload::default(),
            fidelity: Fidelity::default(),
        }
    }

    #[test]
    fn resolves_variant_spellings_and_populates_cited_by() {
        let tmp = tempfile::tempdir().unwrap();
        let target = sample("A-82-060", vec![]);
        let citing = sample("A-22-078", vec!["82-060"]);
        std::fs::write(tmp.path().join("target.json"), serde_json::to_string(&target).unwrap()).unwrap();
        std::fs::write(tmp.path().join("citing.json"), serde_json::to_string(&citing).unwrap()).unwrap();

        let (summary, gaps) = build_graph(tmp.path(), false).unwrap();
        assert_eq!(summary.total_edges, 1);
        assert_eq!(summary.resolved_edges, 1);
        assert_eq!(gaps.total_gaps, 0);

        let updated: StructuredRecord =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("target.json")).unwrap()).unwrap();
        assert_eq!(updated.citations.cited_by, vec!["A-22-078".to_string()]);
    }

    #[test]
    fn records_dangling_citations_as_gaps() {
        let tmp = tempfile::tempdir().unwrap();
        let citing = sample("A-22-078", vec!["A-99-999"]);
        std::fs::write(tmp.path().join("citing.json"), serde_json::to_string(&citing).unwrap()).unwrap();

        let (summary, gaps) = build_graph(tmp.path(), true).unwrap();
        assert_eq!(summary.dangling_edges, 1);
        assert_eq!(gaps.total_gaps, 1);
        assert_eq!(gaps.gaps[0].id, "A-99-999");
        assert_eq!(gaps.gaps[0].cited_by_count, 1);
    }

    #[test]
    fn dry_run_does_not_write_files() {
        let tmp = tempfile::tempdir().unwrap();
        let target = sample("A-82-060", vec![]);
        let citing = sample("A-22-078", vec!["82-060"]);
        std::fs::write(tmp.path().join("target.json"), serde_json::to_string(&target).unwrap()).unwrap();
        std::fs::write(tmp.path().join("citing.json"), serde_json::to_string(&citing).unwrap()).unwrap();

        build_graph(tmp.path(), true).unwrap();
        let untouched: StructuredRecord =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("target.json")).unwrap()).unwrap();
        assert!(untouched.citations.cited_by.is_empty());
    }
}
