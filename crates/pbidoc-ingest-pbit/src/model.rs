//! Canonical report model.
//!
//! `ReportModel` is the only value that crosses into narrative enrichment and
//! document assembly. It owns plain strings only, so it can be serialized,
//! cloned and shared freely once built.

use serde::{Deserialize, Serialize};

/// Placeholder recorded for a visual that references no measure.
pub const NO_EXPLICIT_MEASURE: &str = "No explicit measure";

/// Page name used when a section has no display name.
pub const UNNAMED_PAGE: &str = "Unnamed";

/// Prefixes of the calendar tables Power BI generates on its own.
pub const AUTO_DATE_TABLE_PREFIXES: [&str; 2] = ["DateTableTemplate", "LocalDateTable"];

/// Column type tags that mark a calculated column.
pub const CALCULATED_COLUMN_TYPES: [&str; 2] = ["calculatedTableColumn", "calculated"];

/// Case-sensitive prefix check against [`AUTO_DATE_TABLE_PREFIXES`].
pub fn is_auto_date_table(name: &str) -> bool {
    AUTO_DATE_TABLE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// `true` iff the raw column `type` is exactly one of [`CALCULATED_COLUMN_TYPES`].
pub fn is_calculated_column_type(tag: Option<&str>) -> bool {
    tag.is_some_and(|t| CALCULATED_COLUMN_TYPES.contains(&t))
}

/// Join expression fragments: blank fragments are dropped and the rest joined
/// with single spaces. Spacing inside a kept fragment is preserved.
pub fn flatten_expression<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fragments
        .into_iter()
        .filter(|f| !f.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Layout side
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub name: String,
    pub visuals: Vec<Visual>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visual {
    pub visual_type: Option<String>,
    /// Never empty: holds [`NO_EXPLICIT_MEASURE`] when nothing was projected.
    pub measure_refs: Vec<String>,
}

impl Visual {
    pub fn new(visual_type: Option<String>, measure_refs: Vec<String>) -> Self {
        let measure_refs = if measure_refs.is_empty() {
            vec![NO_EXPLICIT_MEASURE.to_string()]
        } else {
            measure_refs
        };
        Self {
            visual_type,
            measure_refs,
        }
    }
}

// ============================================================================
// Data model side
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub measures: Vec<Measure>,
}

impl Table {
    /// Tables without columns are measure containers or orphans; they are
    /// kept in the model but not sent for narrative.
    pub fn is_narratable(&self) -> bool {
        !self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub is_calculated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl Relationship {
    pub fn touches_auto_date_table(&self) -> bool {
        is_auto_date_table(&self.from_table) || is_auto_date_table(&self.to_table)
    }
}

// ============================================================================
// Assembled model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
}

impl ReportModel {
    pub fn narratable_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.is_narratable())
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.tables.is_empty() && self.relationships.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Structural merge of the two extractors' output. Order-preserving, no filtering.
pub fn assemble(
    pages: Vec<Page>,
    tables: Vec<Table>,
    relationships: Vec<Relationship>,
) -> ReportModel {
    ReportModel {
        pages,
        tables,
        relationships,
    }
}
