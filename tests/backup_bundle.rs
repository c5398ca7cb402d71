#[path = "../src/backup.rs"]
mod backup;

use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};

#[test]
fn bundle_export_and_import_roundtrip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let bundle_path = dir.path().join("nested").join("homework-backup.zip");
    let snapshot = json!({
        "classes": [{ "id": "c1", "name": "M.1/1", "createdAt": "2026-01-01T00:00:00.000Z" }],
        "config": { "currentTerm": "1", "academicYear": "2569", "schoolName": "Test" },
    });

    let export = backup::export_snapshot_bundle(&snapshot, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 2);
    assert_eq!(export.checksum.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    assert!(manifest.contains(&export.checksum));
    archive
        .by_name("data/snapshot.json")
        .expect("snapshot entry in bundle");

    let (restored, import) = backup::import_snapshot_bundle(&bundle_path).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(restored, snapshot);
}

#[test]
fn tampered_snapshot_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tampered.zip");
    let manifest = json!({
        "format": backup::BUNDLE_FORMAT_V1,
        "version": 1,
        "snapshotSha256": "0".repeat(64),
    });

    let mut zip = zip::ZipWriter::new(File::create(&path).expect("create bundle"));
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest");
    zip.write_all(manifest.to_string().as_bytes()).expect("write manifest");
    zip.start_file("data/snapshot.json", opts).expect("snapshot");
    zip.write_all(br#"{"users":[]}"#).expect("write snapshot");
    zip.finish().expect("finish");

    let err = backup::import_snapshot_bundle(&path).expect_err("checksum mismatch");
    assert!(err.to_string().contains("checksum"));
}

#[test]
fn plain_json_snapshot_import_is_supported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, r#"{"users":[]}"#).expect("write snapshot");

    let (snapshot, import) = backup::import_snapshot_bundle(&path).expect("import plain json");
    assert_eq!(import.bundle_format_detected, backup::PLAIN_JSON_FORMAT);
    assert_eq!(snapshot, json!({ "users": [] }));

    std::fs::write(&path, "not json").expect("write garbage");
    assert!(backup::import_snapshot_bundle(&path).is_err());
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("other.zip");
    let mut zip = zip::ZipWriter::new(File::create(&path).expect("create bundle"));
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest");
    zip.write_all(br#"{"format":"something-else"}"#).expect("write manifest");
    zip.finish().expect("finish");

    let err = backup::import_snapshot_bundle(&path).expect_err("unsupported format");
    assert!(err.to_string().contains("unsupported bundle format"));
}
