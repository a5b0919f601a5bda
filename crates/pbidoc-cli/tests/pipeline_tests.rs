use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use pbidoc_cli::{document, extract, PbidocConfig};
use pbidoc_ingest_pbit::decode::encode_utf16le;
use pbidoc_ingest_pbit::{LAYOUT_ENTRY, MODEL_ENTRY};
use pbidoc_narrative::MockGenerator;
use zip::write::FileOptions;
use zip::ZipWriter;

const LAYOUT: &str = r#"{"sections":[{"displayName":"Overview","visualContainers":[{"config":"{\"singleVisual\":{\"visualType\":\"card\",\"projections\":{\"Values\":[{\"queryRef\":\"Sales.Total\"}]}}}"},{"config":"{broken"}]}]}"#;

const MODEL: &str = r#"{"model":{"tables":[{"name":"LocalDateTable_1","columns":[{"name":"Date"}]},{"name":"Sales","columns":[{"name":"Amount","dataType":"double"}]}],"relationships":[{"fromTable":"Sales","fromColumn":"Date","toTable":"LocalDateTable_1","toColumn":"Date"}]}}"#;

fn write_pbit(path: &Path) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file(LAYOUT_ENTRY, FileOptions::default()).unwrap();
    zip.write_all(&encode_utf16le(LAYOUT)).unwrap();
    zip.start_file(MODEL_ENTRY, FileOptions::default()).unwrap();
    zip.write_all(&encode_utf16le(MODEL)).unwrap();
    zip.finish().unwrap();
}

fn config_in(dir: &Path) -> PbidocConfig {
    PbidocConfig {
        report_dir: dir.to_path_buf(),
        report_name: "Sales".into(),
        template_path: dir.join("template.docx"),
        output_dir: dir.join("out"),
        ..Default::default()
    }
}

#[test]
fn extract_reports_skips_and_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    write_pbit(&dir.path().join("Sales.pbit"));
    let config = config_in(dir.path());

    let raw_dir = dir.path().join("raw");
    let out = extract(&config, Some(&raw_dir)).unwrap();

    assert_eq!(out.model.pages.len(), 1);
    assert_eq!(out.model.pages[0].visuals.len(), 1);
    assert_eq!(out.skipped_visuals.len(), 1);
    assert_eq!(out.excluded_tables, 1);
    assert_eq!(out.excluded_relationships, 1);
    assert!(raw_dir.join("Report").join("Layout").exists());
    assert!(raw_dir.join("DataModelSchema").exists());

    assert!(dir.path().join("Sales.pbit").exists());
    assert!(!dir.path().join("Sales.zip").exists());
}

#[test]
fn missing_template_fails_before_the_package_is_touched() {
    let dir = tempfile::tempdir().unwrap();
    let pbit = dir.path().join("Sales.pbit");
    write_pbit(&pbit);
    let before = fs::read(&pbit).unwrap();

    let gen = MockGenerator::always("unused");
    let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let err = document(&config_in(dir.path()), &gen, today, None).unwrap_err();

    assert!(format!("{err:#}").contains("template"));
    assert_eq!(gen.calls(), 0);
    assert_eq!(fs::read(&pbit).unwrap(), before);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn unreadable_package_is_fatal_but_restored() {
    let dir = tempfile::tempdir().unwrap();
    let pbit = dir.path().join("Sales.pbit");
    fs::write(&pbit, b"this is not a zip archive").unwrap();

    let err = extract(&config_in(dir.path()), None).unwrap_err();
    assert!(format!("{err:#}").contains("Sales.pbit"));
    assert!(pbit.exists());
    assert!(!dir.path().join("Sales.zip").exists());
}

#[test]
fn missing_package_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract(&config_in(dir.path()), None).unwrap_err();
    assert!(format!("{err:#}").contains("cannot open report package"));
}
