//! Structured-Record Parser (spec section 4.5): section detection, citation
//! extraction, self-citation filtering, and heuristic topic classification.
//! Consumed by the Text Extractor (fppc-extractor) and independently
//! re-runnable over any already-extracted record.

pub mod citations;
pub mod classifier;
pub mod sections;
pub mod self_citation;

pub use citations::extract_citations;
pub use classifier::classify_by_citations;
pub use sections::parse_sections;
pub use self_citation::{filter_self_citations, letter_id_variants};
