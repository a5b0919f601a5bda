//! Plain-text fragments of a report model.
//!
//! The same text is sent to the generator and printed under "Technical
//! Details" in the document, so the reader sees exactly what was analyzed.

use pbidoc_ingest_pbit::{Page, Relationship, Table};

/// Measure expressions longer than this are cut in table fragments.
pub const MEASURE_PREVIEW_CHARS: usize = 100;

pub fn page_fragment(page: &Page) -> String {
    let visuals: Vec<String> = page
        .visuals
        .iter()
        .map(|v| {
            format!(
                "  - Type: {}, Measures: {}",
                v.visual_type.as_deref().unwrap_or("unknown"),
                v.measure_refs.join(", ")
            )
        })
        .collect();
    format!("Page name: {}\nVisuals:\n{}", page.name, visuals.join("\n"))
}

pub fn table_fragment(table: &Table) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            format!(
                "  - {} ({}), Calculated: {}",
                c.name,
                c.data_type,
                if c.is_calculated { "Yes" } else { "No" }
            )
        })
        .collect();
    let mut out = format!("Table name: {}\nColumns:\n{}", table.name, columns.join("\n"));

    if !table.measures.is_empty() {
        let measures: Vec<String> = table
            .measures
            .iter()
            .map(|m| format!("  - {}: {}...", m.name, preview(&m.expression)))
            .collect();
        out.push_str("\nMeasures in table:\n");
        out.push_str(&measures.join("\n"));
    }
    out
}

pub fn relationships_fragment(relationships: &[Relationship]) -> String {
    relationships
        .iter()
        .map(|r| {
            format!(
                "- From '{}' ({}) To '{}' ({})",
                r.from_table, r.from_column, r.to_table, r.to_column
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(expression: &str) -> String {
    expression.chars().take(MEASURE_PREVIEW_CHARS).collect()
}
