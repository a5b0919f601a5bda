//! Layout extraction: `Report/Layout` → pages and visuals.
//!
//! Each section becomes one [`Page`]. Each visual container carries its real
//! configuration as a JSON document serialized into the `config` string, so
//! visuals go through a second, separately typed parse ([`VisualConfig`]).
//! A container whose config cannot be parsed is skipped and recorded; it never
//! aborts the page.

use serde_json::Value;

use crate::error::FragmentParseError;
use crate::model::{Page, Visual, UNNAMED_PAGE};

/// The parts of an embedded visual configuration we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualConfig {
    pub visual_type: Option<String>,
    /// Every `queryRef` under `singleVisual.projections.*`, roles flattened in
    /// document order. Duplicates are kept.
    pub query_refs: Vec<String>,
}

impl VisualConfig {
    /// Read the `config` field of a visual container. A container without one
    /// parses as an empty configuration.
    pub fn from_container(container: &Value) -> Result<Self, FragmentParseError> {
        match container.get("config") {
            None => Self::parse("{}"),
            Some(Value::String(raw)) => Self::parse(raw),
            Some(_) => Err(FragmentParseError::NotAString),
        }
    }

    /// Parse the embedded configuration document.
    pub fn parse(raw: &str) -> Result<Self, FragmentParseError> {
        let doc: Value = serde_json::from_str(raw)?;
        let root = doc
            .as_object()
            .ok_or(FragmentParseError::UnexpectedShape("config is not an object"))?;

        let single = match root.get("singleVisual") {
            None => return Ok(Self::default()),
            Some(Value::Object(single)) => single,
            Some(_) => {
                return Err(FragmentParseError::UnexpectedShape(
                    "singleVisual is not an object",
                ))
            }
        };

        let visual_type = single
            .get("visualType")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut query_refs = Vec::new();
        match single.get("projections") {
            None => {}
            Some(Value::Object(roles)) => {
                for items in roles.values() {
                    let items = items.as_array().ok_or(FragmentParseError::UnexpectedShape(
                        "projection role is not a list",
                    ))?;
                    for item in items {
                        let item = item.as_object().ok_or(
                            FragmentParseError::UnexpectedShape("projection item is not an object"),
                        )?;
                        if let Some(query_ref) = item.get("queryRef").and_then(Value::as_str) {
                            if !query_ref.is_empty() {
                                query_refs.push(query_ref.to_string());
                            }
                        }
                    }
                }
            }
            Some(_) => {
                return Err(FragmentParseError::UnexpectedShape(
                    "projections is not an object",
                ))
            }
        }

        Ok(Self {
            visual_type,
            query_refs,
        })
    }

    pub fn into_visual(self) -> Visual {
        Visual::new(self.visual_type, self.query_refs)
    }
}

/// A visual container that was left out of its page.
#[derive(Debug)]
pub struct SkippedVisual {
    pub page: String,
    pub container_index: usize,
    pub error: FragmentParseError,
}

#[derive(Debug, Default)]
pub struct LayoutExtraction {
    pub pages: Vec<Page>,
    pub skipped: Vec<SkippedVisual>,
}

/// Extract pages from a parsed layout document.
pub fn extract_pages(layout: &Value) -> LayoutExtraction {
    let mut out = LayoutExtraction::default();

    for section in array_field(layout, "sections") {
        let name = section
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED_PAGE)
            .to_string();

        let mut visuals = Vec::new();
        for (container_index, container) in array_field(section, "visualContainers").iter().enumerate() {
            match VisualConfig::from_container(container) {
                Ok(config) => visuals.push(config.into_visual()),
                Err(error) => {
                    tracing::warn!(page = %name, container_index, %error, "skipping visual");
                    out.skipped.push(SkippedVisual {
                        page: name.clone(),
                        container_index,
                        error,
                    });
                }
            }
        }

        out.pages.push(Page { name, visuals });
    }

    out
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NO_EXPLICIT_MEASURE;
    use serde_json::json;

    fn container(config: &Value) -> Value {
        json!({ "x": 0, "config": config.to_string() })
    }

    #[test]
    fn roles_flatten_in_document_order() {
        let cfg = VisualConfig::parse(
            r#"{"singleVisual":{"visualType":"clusteredColumnChart","projections":{
                "Y":[{"queryRef":"Sum(Sales.Amount)"}],
                "Category":[{"queryRef":"Date.Year"},{"active":true}]}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.visual_type.as_deref(), Some("clusteredColumnChart"));
        assert_eq!(cfg.query_refs, vec!["Sum(Sales.Amount)", "Date.Year"]);
    }

    #[test]
    fn missing_config_is_an_empty_visual() {
        let cfg = VisualConfig::from_container(&json!({})).unwrap();
        assert_eq!(cfg.into_visual().measure_refs, vec![NO_EXPLICIT_MEASURE]);
    }

    #[test]
    fn shape_errors_are_typed() {
        assert!(matches!(
            VisualConfig::parse("[1,2]"),
            Err(FragmentParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            VisualConfig::parse(r#"{"singleVisual":null}"#),
            Err(FragmentParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            VisualConfig::parse(r#"{"singleVisual":{"projections":{"Y":"oops"}}}"#),
            Err(FragmentParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            VisualConfig::parse("{not json"),
            Err(FragmentParseError::Malformed(_))
        ));
        assert!(matches!(
            VisualConfig::from_container(&json!({"config": 7})),
            Err(FragmentParseError::NotAString)
        ));
    }

    #[test]
    fn malformed_visuals_are_skipped_not_fatal() {
        let layout = json!({
            "sections": [{
                "displayName": "Overview",
                "visualContainers": [
                    container(&json!({"singleVisual": {"visualType": "card",
                        "projections": {"Values": [{"queryRef": "Sales.Total"}]}}})),
                    {"config": "{broken"},
                    container(&json!({"singleVisual": {"visualType": "slicer"}})),
                ]
            }]
        });
        let out = extract_pages(&layout);
        assert_eq!(out.pages.len(), 1);
        assert_eq!(out.pages[0].visuals.len(), 2);
        assert_eq!(out.pages[0].visuals[1].measure_refs, vec![NO_EXPLICIT_MEASURE]);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].container_index, 1);
        assert_eq!(out.skipped[0].page, "Overview");
    }

    #[test]
    fn section_without_name_or_containers() {
        let out = extract_pages(&json!({"sections": [{}, {"displayName": "Sales"}]}));
        assert_eq!(out.pages[0].name, UNNAMED_PAGE);
        assert_eq!(out.pages[1].name, "Sales");
        assert!(out.pages[1].visuals.is_empty());
    }

    #[test]
    fn empty_document_has_no_pages() {
        assert!(extract_pages(&json!({})).pages.is_empty());
    }
}
