//! Power BI template ingestion for pbidoc
//!
//! Turns a `.pbit` package into a [`ReportModel`]:
//! - [`archive`]: rename the package into container form and back, read entries
//! - [`decode`]: UTF-16LE document decoding
//! - [`layout`]: `Report/Layout` → pages and visuals (two-stage visual parse)
//! - [`schema`]: `DataModelSchema` → tables, columns, measures, relationships
//! - [`model`]: the canonical, serializable model and its assembler
//!
//! Malformed input is tolerated item by item: an unreadable document becomes
//! an empty one, an unparseable visual is skipped. Only archive access fails
//! the whole run.

pub mod archive;
pub mod decode;
pub mod error;
pub mod layout;
pub mod model;
pub mod paths;
pub mod schema;

pub use archive::{ArchiveLease, PackageDocuments, LAYOUT_ENTRY, MODEL_ENTRY};
pub use error::{FragmentParseError, IngestError, Utf16Error};
pub use layout::{extract_pages, LayoutExtraction, SkippedVisual, VisualConfig};
pub use model::*;
pub use paths::{first_free_path, versioned_output_path};
pub use schema::{extract_model, MissingEndpointPolicy, ModelExtraction};

use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub missing_endpoint: MissingEndpointPolicy,
}

/// The assembled model plus what was dropped on the way.
#[derive(Debug)]
pub struct ReportExtraction {
    pub model: ReportModel,
    pub skipped_visuals: Vec<SkippedVisual>,
    pub excluded_tables: usize,
    pub excluded_relationships: usize,
}

/// Extract from already-parsed documents.
///
/// Layout and model extraction share nothing and run on `rayon::join`.
pub fn extract_report(layout: &Value, model_doc: &Value, options: ExtractOptions) -> ReportExtraction {
    let (layout_out, model_out) = rayon::join(
        || extract_pages(layout),
        || extract_model(model_doc, options.missing_endpoint),
    );

    tracing::info!(
        pages = layout_out.pages.len(),
        skipped_visuals = layout_out.skipped.len(),
        tables = model_out.tables.len(),
        relationships = model_out.relationships.len(),
        "report extracted"
    );

    ReportExtraction {
        model: assemble(layout_out.pages, model_out.tables, model_out.relationships),
        skipped_visuals: layout_out.skipped,
        excluded_tables: model_out.excluded_tables,
        excluded_relationships: model_out.excluded_relationships,
    }
}

/// Decode raw package documents and extract. Decode failures degrade to an
/// empty document.
pub fn extract_documents(docs: &PackageDocuments, options: ExtractOptions) -> ReportExtraction {
    let layout = decode::parse_document_or_empty("layout", &docs.layout);
    let model_doc = decode::parse_document_or_empty("data model", &docs.model);
    extract_report(&layout, &model_doc, options)
}
