//! Quality Scorer (spec section 4.3) and the token-level similarity helpers
//! the Fidelity Verifier uses for its canary and adjudication comparisons
//! (spec section 4.7).

pub mod dictionary;
pub mod scorer;
pub mod similarity;

pub use scorer::{compute_quality_score, should_use_vision_ocr, QualityMetrics};
pub use similarity::{
    detect_description_mode, has_description_mode_marker, normalize_for_comparison,
    token_similarity_ratio,
};
