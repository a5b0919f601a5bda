//! Instruction templates, one per narrative kind.

use serde::{Deserialize, Serialize};

/// What a payload describes. Selects the instruction sent with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    Page,
    Table,
    Relationship,
    FullReport,
    /// Anything else: a plain "summarize the following data" request.
    Generic,
}

impl NarrativeKind {
    /// Map a free-form label to a kind; unknown labels become [`NarrativeKind::Generic`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "page" => NarrativeKind::Page,
            "table" => NarrativeKind::Table,
            "relationship" | "relationships" => NarrativeKind::Relationship,
            "full_report" | "report" => NarrativeKind::FullReport,
            _ => NarrativeKind::Generic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NarrativeKind::Page => "page",
            NarrativeKind::Table => "table",
            NarrativeKind::Relationship => "relationship",
            NarrativeKind::FullReport => "full_report",
            NarrativeKind::Generic => "generic",
        }
    }
}

const PAGE_INSTRUCTION: &str = "\
Analyze the data of the following Power BI report page.
Describe, in one short paragraph of business language, the likely purpose of this page,
based on its visual types and the measures it uses.

PAGE DATA:
";

const TABLE_INSTRUCTION: &str = "\
Analyze the structure of the following table from a Power BI data model.
Describe, in one short paragraph, the likely purpose of this table (for example a fact table
or a customer dimension) and what kind of information it stores, based on its columns and measures.

TABLE DATA:
";

const RELATIONSHIP_INSTRUCTION: &str = "\
Analyze the following relationships of a Power BI data model.
Write one sentence explaining what this set of relationships means for the data model.

RELATIONSHIP DATA:
";

const FULL_REPORT_INSTRUCTION: &str = "\
You are a technical assistant specialized in Power BI.
Analyze the complete report below, describing:
1. The overall objective of the report;
2. The likely purpose of each page;
3. The role of each table (e.g. fact, dimension);
4. The overall relationship structure;
5. Which business indicators or KPIs are likely being presented.

Write the answer in technical Markdown, with well-structured headings and subheadings.

=== COMPLETE REPORT DATA ===
";

const GENERIC_INSTRUCTION: &str = "Summarize the following data: ";

/// Full prompt text for `payload`.
pub fn render_prompt(kind: NarrativeKind, payload: &str) -> String {
    let instruction = match kind {
        NarrativeKind::Page => PAGE_INSTRUCTION,
        NarrativeKind::Table => TABLE_INSTRUCTION,
        NarrativeKind::Relationship => RELATIONSHIP_INSTRUCTION,
        NarrativeKind::FullReport => FULL_REPORT_INSTRUCTION,
        NarrativeKind::Generic => GENERIC_INSTRUCTION,
    };
    format!("{instruction}{payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_labels_fall_back_to_generic() {
        assert_eq!(NarrativeKind::from_label("Table"), NarrativeKind::Table);
        assert_eq!(NarrativeKind::from_label("chart"), NarrativeKind::Generic);
        assert_eq!(
            render_prompt(NarrativeKind::from_label("chart"), "x=1"),
            "Summarize the following data: x=1"
        );
    }

    #[test]
    fn prompts_end_with_the_payload() {
        for kind in [
            NarrativeKind::Page,
            NarrativeKind::Table,
            NarrativeKind::Relationship,
            NarrativeKind::FullReport,
        ] {
            let prompt = render_prompt(kind, "PAYLOAD");
            assert!(prompt.ends_with("PAYLOAD"), "{kind:?}");
            assert!(prompt.len() > "PAYLOAD".len() + 40);
        }
    }
}
