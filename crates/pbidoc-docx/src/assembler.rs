//! Output assembly: template population and versioned save.
//!
//! Two strategies over any [`TemplateDocument`]:
//! - markers: each content block replaces the paragraph holding its title;
//! - append: a page break, a heading, then the narrative paragraphs.
//!
//! Both start by rewriting the date and report-name label paragraphs.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pbidoc_ingest_pbit::versioned_output_path;
use pbidoc_narrative::{ContentBlock, Narration};

use crate::document::{ParagraphStyle, TemplateDocument};
use crate::markdown::markdown_to_paragraphs;
use crate::DocxError;

pub const DEFAULT_DATE_LABEL: &str = "Documentation date:";
pub const DEFAULT_NAME_LABEL: &str = "Report name:";
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";
pub const DEFAULT_HEADING: &str = "Automated Technical Analysis (AI)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStrategy {
    /// Replace title paragraphs with content blocks.
    Markers,
    /// Page break, heading and narrative at the end of the document.
    Append,
}

/// How appended narrative text becomes paragraphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// One paragraph per line, blank lines included.
    Lines,
    /// Markdown converted to styled paragraphs.
    #[default]
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub date_label: String,
    pub name_label: String,
    pub date_format: String,
    pub heading: String,
    pub render: RenderMode,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            date_label: DEFAULT_DATE_LABEL.to_string(),
            name_label: DEFAULT_NAME_LABEL.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            heading: DEFAULT_HEADING.to_string(),
            render: RenderMode::default(),
        }
    }
}

/// What assembly did to the template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub labels_replaced: usize,
    pub blocks_inserted: Vec<String>,
    /// Blocks whose title paragraph was not in the template.
    pub blocks_dropped: Vec<String>,
    pub paragraphs_appended: usize,
}

pub fn format_date(date: NaiveDate, format: &str) -> Result<String, DocxError> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).map_err(|_| DocxError::DateFormat {
        format: format.to_string(),
    })?;
    Ok(out)
}

/// Rewrite every paragraph containing a label as `"{label} {value}"`.
/// The date label wins when a paragraph contains both. Returns the number of
/// paragraphs rewritten.
pub fn substitute_labels(
    doc: &mut dyn TemplateDocument,
    report_name: &str,
    date: &str,
    options: &AssemblyOptions,
) -> Result<usize, DocxError> {
    let mut replaced = 0;
    for i in 0..doc.paragraph_count() {
        let Some(text) = doc.paragraph_text(i) else {
            continue;
        };
        let new_text = if contains_label(&text, &options.date_label) {
            format!("{} {date}", options.date_label)
        } else if contains_label(&text, &options.name_label) {
            format!("{} {report_name}", options.name_label)
        } else {
            continue;
        };
        doc.set_paragraph_text(i, &new_text)?;
        replaced += 1;
    }
    Ok(replaced)
}

/// An empty label matches nothing.
fn contains_label(text: &str, label: &str) -> bool {
    !label.trim().is_empty() && text.contains(label)
}

fn find_title(doc: &dyn TemplateDocument, title: &str) -> Option<usize> {
    let wanted = title.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    (0..doc.paragraph_count()).find(|&i| {
        doc.paragraph_text(i)
            .is_some_and(|text| text.trim().to_lowercase() == wanted)
    })
}

/// Put each block where its title paragraph is and remove the title.
/// Only the first matching paragraph is used; a block without one is dropped.
pub fn insert_blocks(
    doc: &mut dyn TemplateDocument,
    blocks: &[ContentBlock],
    report: &mut AssemblyReport,
) -> Result<(), DocxError> {
    for block in blocks {
        match find_title(doc, &block.title) {
            Some(i) => {
                doc.insert_paragraph_before(i, &block.body, ParagraphStyle::Normal)?;
                doc.remove_paragraph(i + 1)?;
                report.blocks_inserted.push(block.title.clone());
            }
            None => {
                tracing::debug!(title = %block.title, "no marker paragraph for block; dropped");
                report.blocks_dropped.push(block.title.clone());
            }
        }
    }
    Ok(())
}

/// Add `text` as paragraphs at the end of the document. Returns how many.
pub fn append_text(doc: &mut dyn TemplateDocument, text: &str, render: RenderMode) -> usize {
    match render {
        RenderMode::Lines => {
            let mut count = 0;
            for line in text.split('\n') {
                doc.add_paragraph(line.trim_end_matches('\r'), ParagraphStyle::Normal);
                count += 1;
            }
            count
        }
        RenderMode::Markdown => {
            let paragraphs = markdown_to_paragraphs(text);
            for p in &paragraphs {
                doc.add_paragraph(&p.text, p.style);
            }
            paragraphs.len()
        }
    }
}

/// Page break and heading, then the narrative.
pub fn append_narrative(
    doc: &mut dyn TemplateDocument,
    narration: &Narration,
    options: &AssemblyOptions,
) -> usize {
    doc.add_page_break();
    doc.add_heading(&options.heading, 1);
    match narration {
        Narration::Report(text) => append_text(doc, text, options.render),
        Narration::Sections(blocks) => blocks
            .iter()
            .map(|block| {
                doc.add_heading(&block.title, 2);
                1 + append_text(doc, &block.body, RenderMode::Lines)
            })
            .sum(),
    }
}

/// Populate the template in place.
pub fn assemble(
    doc: &mut dyn TemplateDocument,
    narration: &Narration,
    strategy: AssemblyStrategy,
    report_name: &str,
    today: NaiveDate,
    options: &AssemblyOptions,
) -> Result<AssemblyReport, DocxError> {
    let date = format_date(today, &options.date_format)?;
    let mut report = AssemblyReport {
        labels_replaced: substitute_labels(doc, report_name, &date, options)?,
        ..Default::default()
    };

    match (strategy, narration) {
        (AssemblyStrategy::Markers, Narration::Sections(blocks)) => {
            insert_blocks(doc, blocks, &mut report)?;
        }
        (AssemblyStrategy::Markers, Narration::Report(text)) => {
            let block = ContentBlock {
                title: options.heading.clone(),
                body: text.clone(),
            };
            insert_blocks(doc, std::slice::from_ref(&block), &mut report)?;
        }
        (AssemblyStrategy::Append, narration) => {
            report.paragraphs_appended = append_narrative(doc, narration, options);
        }
    }

    tracing::info!(
        labels = report.labels_replaced,
        inserted = report.blocks_inserted.len(),
        dropped = report.blocks_dropped.len(),
        appended = report.paragraphs_appended,
        "template assembled"
    );
    Ok(report)
}

/// Attempts made when a chosen name is taken before it can be created.
const SAVE_ATTEMPTS: usize = 8;

/// Save under the first free version of `path` and return where it went.
/// Existing files are never overwritten.
pub fn save_versioned(doc: &dyn TemplateDocument, path: &Path) -> Result<PathBuf, DocxError> {
    let mut attempt = 1;
    loop {
        let target = versioned_output_path(path);
        match doc.save(&target) {
            Ok(()) => {
                tracing::info!(path = %target.display(), "document saved");
                return Ok(target);
            }
            Err(DocxError::OutputExists { .. }) if attempt < SAVE_ATTEMPTS => {
                tracing::debug!(path = %target.display(), "output name taken; retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
