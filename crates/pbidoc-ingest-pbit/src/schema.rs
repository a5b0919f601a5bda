//! Model extraction: `DataModelSchema` → tables and relationships.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    flatten_expression, is_auto_date_table, is_calculated_column_type, Column, Measure,
    Relationship, Table,
};

/// What to do with a relationship whose `fromTable` or `toTable` is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEndpointPolicy {
    /// Keep it; the missing endpoint becomes an empty string.
    #[default]
    Keep,
    /// Drop it and count it as excluded.
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelExtraction {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub excluded_tables: usize,
    pub excluded_relationships: usize,
}

pub fn extract_model(doc: &Value, policy: MissingEndpointPolicy) -> ModelExtraction {
    let (tables, excluded_tables) = extract_tables(doc);
    let (relationships, excluded_relationships) = extract_relationships(doc, policy);
    ModelExtraction {
        tables,
        relationships,
        excluded_tables,
        excluded_relationships,
    }
}

/// Tables under `model.tables`, minus auto-generated date tables.
/// Returns the kept tables and the number excluded.
pub fn extract_tables(doc: &Value) -> (Vec<Table>, usize) {
    let mut tables = Vec::new();
    let mut excluded = 0;

    for raw in model_array(doc, "tables") {
        let name = str_field(raw, "name");
        if is_auto_date_table(&name) {
            excluded += 1;
            continue;
        }

        let columns = items(raw, "columns")
            .iter()
            .map(|c| Column {
                name: str_field(c, "name"),
                data_type: str_field(c, "dataType"),
                is_calculated: is_calculated_column_type(c.get("type").and_then(Value::as_str)),
            })
            .collect();

        let measures = items(raw, "measures")
            .iter()
            .map(|m| Measure {
                name: str_field(m, "name"),
                expression: measure_expression(m.get("expression")),
            })
            .collect();

        tables.push(Table {
            name,
            columns,
            measures,
        });
    }

    if excluded > 0 {
        tracing::debug!(excluded, "excluded auto-generated date tables");
    }
    (tables, excluded)
}

/// Relationships under `model.relationships`, minus those touching an
/// auto-generated date table (either endpoint).
pub fn extract_relationships(
    doc: &Value,
    policy: MissingEndpointPolicy,
) -> (Vec<Relationship>, usize) {
    let mut relationships = Vec::new();
    let mut excluded = 0;

    for raw in model_array(doc, "relationships") {
        let from_table = raw.get("fromTable").and_then(Value::as_str);
        let to_table = raw.get("toTable").and_then(Value::as_str);

        if policy == MissingEndpointPolicy::Reject && (from_table.is_none() || to_table.is_none()) {
            tracing::warn!("dropping relationship with a missing endpoint table");
            excluded += 1;
            continue;
        }

        let rel = Relationship {
            from_table: from_table.unwrap_or_default().to_string(),
            from_column: str_field(raw, "fromColumn"),
            to_table: to_table.unwrap_or_default().to_string(),
            to_column: str_field(raw, "toColumn"),
        };
        if rel.touches_auto_date_table() {
            excluded += 1;
            continue;
        }
        relationships.push(rel);
    }

    (relationships, excluded)
}

/// A measure expression is either one string or a list of line fragments.
fn measure_expression(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => flatten_expression(parts.iter().filter_map(Value::as_str)),
        _ => String::new(),
    }
}

fn model_array<'a>(doc: &'a Value, key: &str) -> &'a [Value] {
    doc.get("model")
        .map(|m| items(m, key))
        .unwrap_or(&[])
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
