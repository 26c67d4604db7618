use std::fs;
use std::path::Path;

use chatscope_core::{DataKind, SessionData};
use chatscope_engine::{ensure_output_dir, kind_from_filename, load_export, ExportWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("exports").join("today");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn export_replaces_previous_file() {
    let temp = TempDir::new().unwrap();
    let writer = ExportWriter::new(temp.path());

    let first = writer.write("analysis_report.json", "{}").unwrap();
    assert_eq!(first.file_name().unwrap(), "analysis_report.json");

    let second = writer
        .write("analysis_report.json", "{\n  \"a\": 1\n}")
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "{\n  \"a\": 1\n}");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn export_into_a_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = ExportWriter::new(file_path.clone());
    assert!(writer.write("report.json", "{}").is_err());
    assert!(!file_path.with_file_name("report.json").exists());
}

#[test]
fn exported_data_loads_back() {
    let temp = TempDir::new().unwrap();
    let writer = ExportWriter::new(temp.path());
    let path = writer
        .write(
            DataKind::Report.default_filename(),
            "{\n  \"dataset_overview\": {\n    \"total_messages\": 3\n  }\n}",
        )
        .unwrap();

    let data = load_export(DataKind::Report, &path).unwrap();
    assert_eq!(data.kind(), DataKind::Report);
    assert!(matches!(data, SessionData::Report(report) if report.module("dataset_overview").is_some()));
}

#[test]
fn load_export_reports_unreadable_and_invalid_files() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.json");
    assert!(load_export(DataKind::Processed, &missing)
        .unwrap_err()
        .contains("could not read"));

    let broken = temp.path().join("broken.json");
    fs::write(&broken, "[{\"sender\": 1}").unwrap();
    assert!(load_export(DataKind::Processed, &broken).is_err());
}

#[test]
fn kind_is_inferred_from_export_names() {
    assert_eq!(
        kind_from_filename(Path::new("out/processed_messages.json")),
        Some(DataKind::Processed)
    );
    assert_eq!(
        kind_from_filename(Path::new("My Filtered Chat.json")),
        Some(DataKind::Filtered)
    );
    assert_eq!(
        kind_from_filename(Path::new("weekly_report.json")),
        Some(DataKind::Report)
    );
    assert_eq!(kind_from_filename(Path::new("chat.json")), None);
}
