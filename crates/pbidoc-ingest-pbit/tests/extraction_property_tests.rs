use pbidoc_ingest_pbit::schema::{extract_relationships, extract_tables};
use pbidoc_ingest_pbit::{
    extract_pages, flatten_expression, is_calculated_column_type, MissingEndpointPolicy,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn table_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z][A-Za-z0-9_]{0,10}",
        "[A-Za-z0-9_]{0,6}".prop_map(|s| format!("DateTableTemplate{s}")),
        "[A-Za-z0-9_]{0,6}".prop_map(|s| format!("LocalDateTable{s}")),
    ]
}

/// A visual container that either parses or is broken in one of several ways.
fn container() -> impl Strategy<Value = (Value, bool)> {
    prop_oneof![
        proptest::collection::vec("[A-Za-z.()]{1,12}", 0..4).prop_map(|refs| {
            let items: Vec<Value> = refs.iter().map(|r| json!({ "queryRef": r })).collect();
            let cfg = json!({"singleVisual": {"visualType": "card", "projections": {"Values": items}}});
            (json!({ "config": cfg.to_string() }), true)
        }),
        Just((json!({}), true)),
        Just((json!({ "config": "{\"singleVisual\":" }), false)),
        Just((json!({ "config": "[]" }), false)),
        Just((json!({ "config": 3 }), false)),
        Just((json!({ "config": "{\"singleVisual\":{\"projections\":[]}}" }), false)),
    ]
}

proptest! {
    #[test]
    fn no_auto_date_artifacts_survive(
        names in proptest::collection::vec(table_name(), 0..12),
        ends in proptest::collection::vec((table_name(), table_name()), 0..12),
    ) {
        let tables: Vec<Value> = names.iter().map(|n| json!({"name": n, "columns": []})).collect();
        let rels: Vec<Value> = ends.iter().map(|(f, t)| json!({"fromTable": f, "toTable": t})).collect();
        let doc = json!({"model": {"tables": tables, "relationships": rels}});

        let (kept_tables, excluded_tables) = extract_tables(&doc);
        let (kept_rels, excluded_rels) = extract_relationships(&doc, MissingEndpointPolicy::Keep);

        for t in &kept_tables {
            prop_assert!(!t.name.starts_with("DateTableTemplate"));
            prop_assert!(!t.name.starts_with("LocalDateTable"));
        }
        for r in &kept_rels {
            for end in [&r.from_table, &r.to_table] {
                prop_assert!(!end.starts_with("DateTableTemplate"));
                prop_assert!(!end.starts_with("LocalDateTable"));
            }
        }
        prop_assert_eq!(kept_tables.len() + excluded_tables, names.len());
        prop_assert_eq!(kept_rels.len() + excluded_rels, ends.len());
    }

    #[test]
    fn is_calculated_only_for_the_two_tags(tag in proptest::option::of("[A-Za-z]{0,24}")) {
        let expected = matches!(tag.as_deref(), Some("calculatedTableColumn") | Some("calculated"));
        prop_assert_eq!(is_calculated_column_type(tag.as_deref()), expected);
    }

    #[test]
    fn flattening_is_idempotent(fragments in proptest::collection::vec("[ \\tA-Za-z()\\[\\]]{0,8}", 0..8)) {
        let once = flatten_expression(fragments.iter().map(String::as_str));
        let twice = flatten_expression([once.as_str()]);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn one_page_per_section_and_one_visual_per_parsed_container(
        sections in proptest::collection::vec(proptest::collection::vec(container(), 0..6), 0..5),
    ) {
        let raw_sections: Vec<Value> = sections
            .iter()
            .enumerate()
            .map(|(i, cs)| json!({
                "displayName": format!("Page {i}"),
                "visualContainers": cs.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>(),
            }))
            .collect();
        let out = extract_pages(&json!({ "sections": raw_sections }));

        prop_assert_eq!(out.pages.len(), sections.len());
        let mut expected_skipped = 0;
        for (page, cs) in out.pages.iter().zip(&sections) {
            let ok = cs.iter().filter(|(_, ok)| *ok).count();
            prop_assert_eq!(page.visuals.len(), ok);
            expected_skipped += cs.len() - ok;
            for v in &page.visuals {
                prop_assert!(!v.measure_refs.is_empty());
            }
        }
        prop_assert_eq!(out.skipped.len(), expected_skipped);
    }
}
