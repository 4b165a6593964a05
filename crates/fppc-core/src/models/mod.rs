pub mod document;
pub mod enums;
pub mod record;

pub use document::{now_string, Document, NewDocument};
pub use enums::{
    DocumentType, DownloadStatus, ExtractionMethod, ExtractionStatus, FidelityMethod,
    FidelityRisk, LetterPrefix, QaSource,
};
pub use record::{
    CitationSet, Classification, Content, EmbeddingPayload, Extraction, Fidelity, ParsedMetadata,
    Sections, SourceMetadata, StructuredRecord,
};
