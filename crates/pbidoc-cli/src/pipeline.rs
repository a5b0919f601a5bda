//! The `document` and `extract` runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use pbidoc_docx::{assemble, save_versioned, AssemblyReport, DocxDocument};
use pbidoc_ingest_pbit::{
    extract_documents, ArchiveLease, PackageDocuments, ReportExtraction, LAYOUT_ENTRY, MODEL_ENTRY,
};
use pbidoc_narrative::{enrich, Narrator, TextGenerator};

use crate::config::PbidocConfig;

/// Result of a successful `document` run.
#[derive(Debug)]
pub struct DocumentRun {
    pub output: PathBuf,
    pub extraction: ReportExtraction,
    pub assembly: AssemblyReport,
}

/// Rename the package, read both documents, and put the package back.
///
/// The package is restored before any read error is reported.
pub fn read_package(config: &PbidocConfig, extract_dir: Option<&Path>) -> Result<PackageDocuments> {
    let package = config.package_path();
    let lease = ArchiveLease::acquire(&package, &config.container_path())
        .with_context(|| format!("cannot open report package {}", package.display()))?;

    let docs = lease.read_documents();
    let extracted = match (extract_dir, &docs) {
        (Some(dir), Ok(_)) => Some(lease.extract_entries_to(dir, &[LAYOUT_ENTRY, MODEL_ENTRY])),
        _ => None,
    };
    lease
        .restore()
        .with_context(|| format!("failed to restore report package {}", package.display()))?;

    let docs = docs.with_context(|| format!("failed to read report package {}", package.display()))?;
    if let Some(written) = extracted {
        let written = written.context("failed to extract package entries")?;
        tracing::info!(files = written.len(), "package entries extracted");
    }
    Ok(docs)
}

/// Package → model, with skipped and excluded items logged.
pub fn extract(config: &PbidocConfig, extract_dir: Option<&Path>) -> Result<ReportExtraction> {
    let docs = read_package(config, extract_dir)?;
    let extraction = extract_documents(&docs, config.extract_options());
    for skipped in &extraction.skipped_visuals {
        tracing::warn!(
            page = %skipped.page,
            container = skipped.container_index,
            error = %skipped.error,
            "visual skipped"
        );
    }
    Ok(extraction)
}

/// The full run: template check, extraction, narrative, assembly, save.
///
/// Narrative failures never fail the run; archive and output errors do.
pub fn document(
    config: &PbidocConfig,
    generator: &dyn TextGenerator,
    today: NaiveDate,
    extract_dir: Option<&Path>,
) -> Result<DocumentRun> {
    // Fail on a bad template before the package is renamed or any call is paid for.
    let mut doc = DocxDocument::open(&config.template_path)
        .with_context(|| format!("cannot use template {}", config.template_path.display()))?;

    let extraction = extract(config, extract_dir)?;

    let narrator = Narrator::new(generator);
    let narration = enrich(
        &extraction.model,
        &narrator,
        config.narrative.mode,
        &config.enrich_options(),
    );

    let assembly = assemble(
        &mut doc,
        &narration,
        config.strategy(),
        &config.report_name,
        today,
        &config.assembly_options(),
    )
    .context("failed to assemble document")?;

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("cannot create output directory {}", config.output_dir.display()))?;
    let output = save_versioned(&doc, &config.output_path()).context("failed to save document")?;

    Ok(DocumentRun {
        output,
        extraction,
        assembly,
    })
}
