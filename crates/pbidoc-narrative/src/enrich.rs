//! Per-item and whole-report enrichment.
//!
//! Per-item mode makes one call per page, one per table that has columns, and
//! one for all relationships together, and produces titled content blocks for
//! marker insertion. Whole-report mode makes exactly one call with the full
//! serialized model.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pbidoc_ingest_pbit::ReportModel;

use crate::fragments::{page_fragment, relationships_fragment, table_fragment};
use crate::{Narrator, NarrativeKind, FALLBACK_ON_ERROR};

/// Separator between item blocks inside one content block.
pub const ITEM_SEPARATOR_WIDTH: usize = 40;

pub const NO_PAGES: &str = "No pages found in the report.";
pub const NO_TABLES: &str = "No tables with columns found in the model.";
pub const NO_RELATIONSHIPS: &str = "No relationships found in the model.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeMode {
    #[default]
    PerItem,
    WholeReport,
}

/// Marker titles the per-item blocks are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionTitles {
    pub pages: String,
    pub tables: String,
    pub relationships: String,
}

impl Default for SectionTitles {
    fn default() -> Self {
        Self {
            pages: "Pages".to_string(),
            tables: "Tables".to_string(),
            relationships: "Relationships".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    pub titles: SectionTitles,
    /// Issue per-item calls concurrently. Block order still follows the model.
    pub parallel: bool,
}

/// A titled block of text destined for one marker paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narration {
    /// Per-item mode: pages, tables, relationships, in that order.
    Sections(Vec<ContentBlock>),
    /// Whole-report mode: one narrative, usually Markdown.
    Report(String),
}

pub fn enrich(
    model: &ReportModel,
    narrator: &Narrator<'_>,
    mode: NarrativeMode,
    options: &EnrichOptions,
) -> Narration {
    match mode {
        NarrativeMode::PerItem => Narration::Sections(per_item(model, narrator, options)),
        NarrativeMode::WholeReport => Narration::Report(whole_report(model, narrator)),
    }
}

pub fn whole_report(model: &ReportModel, narrator: &Narrator<'_>) -> String {
    match model.to_json_pretty() {
        Ok(payload) => {
            tracing::info!(bytes = payload.len(), "requesting whole-report narrative");
            narrator.summarize(&payload, NarrativeKind::FullReport)
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not serialize report model");
            FALLBACK_ON_ERROR.to_string()
        }
    }
}

pub fn per_item(model: &ReportModel, narrator: &Narrator<'_>, options: &EnrichOptions) -> Vec<ContentBlock> {
    let page_blocks = map_ordered(&model.pages, options.parallel, |page| {
        tracing::info!(page = %page.name, "analyzing page");
        let details = page_fragment(page);
        let analysis = narrator.summarize(&details, NarrativeKind::Page);
        item_block("PAGE", &page.name, &analysis, &details)
    });

    let tables: Vec<_> = model.narratable_tables().collect();
    let table_blocks = map_ordered(&tables, options.parallel, |table| {
        tracing::info!(table = %table.name, "analyzing table");
        let details = table_fragment(table);
        let analysis = narrator.summarize(&details, NarrativeKind::Table);
        item_block("TABLE", &table.name, &analysis, &details)
    });

    let relationships = if model.relationships.is_empty() {
        NO_RELATIONSHIPS.to_string()
    } else {
        tracing::info!(count = model.relationships.len(), "analyzing relationships");
        let details = relationships_fragment(&model.relationships);
        let analysis = narrator.summarize(&details, NarrativeKind::Relationship);
        format!("AI Overall Analysis:\n{analysis}\n\nTechnical Details:\n{details}")
    };

    vec![
        ContentBlock {
            title: options.titles.pages.clone(),
            body: join_items(page_blocks, NO_PAGES),
        },
        ContentBlock {
            title: options.titles.tables.clone(),
            body: join_items(table_blocks, NO_TABLES),
        },
        ContentBlock {
            title: options.titles.relationships.clone(),
            body: relationships,
        },
    ]
}

fn item_block(label: &str, name: &str, analysis: &str, details: &str) -> String {
    format!(
        "{label}: {}\n\nAI Analysis:\n{analysis}\n\nTechnical Details:\n{details}",
        name.to_uppercase()
    )
}

fn join_items(items: Vec<String>, when_empty: &str) -> String {
    if items.is_empty() {
        return when_empty.to_string();
    }
    let separator = format!("\n\n{}\n\n", "-".repeat(ITEM_SEPARATOR_WIDTH));
    items.join(&separator)
}

/// `map` that keeps input order whether or not it runs in parallel.
fn map_ordered<T, F>(items: &[T], parallel: bool, f: F) -> Vec<String>
where
    T: Sync,
    F: Fn(&T) -> String + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockGenerator;
    use pbidoc_ingest_pbit::{assemble, Column, Page, Relationship, Table};

    fn table(name: &str, columns: usize) -> Table {
        Table {
            name: name.into(),
            columns: (0..columns)
                .map(|i| Column {
                    name: format!("c{i}"),
                    data_type: "string".into(),
                    is_calculated: false,
                })
                .collect(),
            measures: vec![],
        }
    }

    #[test]
    fn columnless_tables_get_no_call() {
        let model = assemble(vec![], vec![table("Measures", 0), table("Sales", 2)], vec![]);
        let gen = MockGenerator::always("fact table");
        let blocks = per_item(&model, &Narrator::new(&gen), &EnrichOptions::default());

        assert_eq!(gen.prompts().len(), 1);
        assert!(blocks[1].body.starts_with("TABLE: SALES\n\nAI Analysis:\nfact table"));
        assert!(!blocks[1].body.contains("MEASURES"));
        assert_eq!(blocks[2].body, NO_RELATIONSHIPS);
        assert_eq!(blocks[0].body, NO_PAGES);
    }

    #[test]
    fn relationships_are_one_call() {
        let rel = |f: &str, t: &str| Relationship {
            from_table: f.into(),
            from_column: "k".into(),
            to_table: t.into(),
            to_column: "k".into(),
        };
        let model = assemble(vec![], vec![], vec![rel("A", "B"), rel("C", "D")]);
        let gen = MockGenerator::always("star schema");
        let blocks = per_item(&model, &Narrator::new(&gen), &EnrichOptions::default());

        assert_eq!(gen.prompts().len(), 1);
        assert_eq!(
            blocks[2].body,
            "AI Overall Analysis:\nstar schema\n\nTechnical Details:\n- From 'A' (k) To 'B' (k)\n- From 'C' (k) To 'D' (k)"
        );
    }

    #[test]
    fn page_blocks_are_separated() {
        let pages = vec![
            Page { name: "One".into(), visuals: vec![] },
            Page { name: "Two".into(), visuals: vec![] },
        ];
        let gen = MockGenerator::always("x");
        let blocks = per_item(&assemble(pages, vec![], vec![]), &Narrator::new(&gen), &EnrichOptions::default());
        let sep = format!("\n\n{}\n\n", "-".repeat(40));
        let parts: Vec<_> = blocks[0].body.split(&sep).collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("PAGE: ONE"));
        assert!(parts[1].starts_with("PAGE: TWO"));
    }

    #[test]
    fn whole_report_is_a_single_call_with_the_model_json() {
        let model = assemble(vec![Page { name: "Sales".into(), visuals: vec![] }], vec![table("T", 1)], vec![]);
        let gen = MockGenerator::always("# Report\n\nBody");
        let out = enrich(&model, &Narrator::new(&gen), NarrativeMode::WholeReport, &EnrichOptions::default());

        assert_eq!(out, Narration::Report("# Report\n\nBody".into()));
        let prompts = gen.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"pages\""));
        assert!(prompts[0].contains("\"name\": \"Sales\""));
    }

    #[test]
    fn parallel_mode_keeps_model_order() {
        let pages: Vec<Page> = (0..16)
            .map(|i| Page { name: format!("p{i:02}"), visuals: vec![] })
            .collect();
        let model = assemble(pages, vec![], vec![]);
        let gen = MockGenerator::always("ok");
        let options = EnrichOptions { parallel: true, ..Default::default() };
        let blocks = per_item(&model, &Narrator::new(&gen), &options);

        let order: Vec<_> = blocks[0]
            .body
            .lines()
            .filter_map(|l| l.strip_prefix("PAGE: "))
            .collect();
        let expected: Vec<String> = (0..16).map(|i| format!("P{i:02}")).collect();
        assert_eq!(order, expected);
    }
}
