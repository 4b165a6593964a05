// @generated by `diesel print-schema`, kept hand-synced with
// migrations/2024-01-01-000000_init_documents.

diesel::table! {
    documents (id) {
        id -> Integer,
        pdf_url -> Text,
        title_text -> Nullable<Text>,
        year_tag -> Nullable<Integer>,
        tags -> Nullable<Text>,
        source_page_url -> Nullable<Text>,
        requestor_name -> Nullable<Text>,
        letter_id -> Nullable<Text>,
        letter_date -> Nullable<Text>,
        city -> Nullable<Text>,
        download_status -> Text,
        downloaded_at -> Nullable<Text>,
        pdf_size_bytes -> Nullable<BigInt>,
        pdf_sha256 -> Nullable<Text>,
        extraction_status -> Text,
        extraction_method -> Nullable<Text>,
        extraction_quality -> Nullable<Float>,
        page_count -> Nullable<Integer>,
        word_count -> Nullable<Integer>,
        extracted_at -> Nullable<Text>,
        section_confidence -> Nullable<Float>,
        json_path -> Nullable<Text>,
        needs_llm_extraction -> Integer,
        llm_extracted_at -> Nullable<Text>,
        fidelity_score -> Nullable<Float>,
        fidelity_method -> Nullable<Text>,
        fidelity_risk -> Text,
        scraped_at -> Text,
        updated_at -> Nullable<Text>,
    }
}
