mod common;

use cestt::instrumentation::{candidate_paths, discover, DiscoveryOptions, InstrumentationManifest};
use common::write_file;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn manifest(doc: Value) -> InstrumentationManifest {
    match doc {
        Value::Object(map) => InstrumentationManifest::from_document(None, map),
        _ => panic!("manifest documents are objects"),
    }
}

#[test]
fn test_candidate_order_for_plain_engine_path() {
    let candidates = candidate_paths(Some(Path::new("/d/engine")), &DiscoveryOptions::default());
    assert_eq!(
        candidates,
        vec![
            PathBuf::from("/d/engine.cestt.json"),
            PathBuf::from("/d/engine.cestt"),
            PathBuf::from("/d/engine.cestt.json"),
            PathBuf::from("/d/engine.cestt.json"),
            PathBuf::from("/d/cestt_manifest.json"),
            PathBuf::from("/d/cestt-instrumentation.json"),
        ]
    );
}

#[test]
fn test_existing_override_is_sole_candidate() {
    let dir = TempDir::new().unwrap();
    let override_path = write_file(dir.path(), "custom.json", r#"{"package": "custom"}"#);
    let options = DiscoveryOptions {
        manifest_override: Some(override_path.clone()),
        force_advanced: false,
    };
    assert_eq!(
        candidate_paths(Some(Path::new("/d/engine")), &options),
        vec![override_path.clone()]
    );

    let found = discover(Some(Path::new("/d/engine")), &options);
    assert_eq!(found.package(), Some("custom"));
    assert_eq!(found.source(), Some(override_path.as_path()));
}

#[test]
fn test_first_parsed_candidate_wins() {
    let dir = TempDir::new().unwrap();
    let engine = write_file(dir.path(), "engine", "#!/bin/sh\n");
    write_file(dir.path(), "engine.cestt", "package=flat\ncapabilities.professional=true\n");
    write_file(dir.path(), "cestt_manifest.json", r#"{"package": "generic"}"#);

    let found = discover(Some(&engine), &DiscoveryOptions::default());
    assert_eq!(found.package(), Some("flat"));
    assert!(found.supports_professional_suite());
    assert_eq!(found.source(), Some(dir.path().join("engine.cestt").as_path()));
    assert!(found.error().is_none());
}

#[test]
fn test_parse_failure_moves_to_next_candidate() {
    let dir = TempDir::new().unwrap();
    let engine = write_file(dir.path(), "engine", "#!/bin/sh\n");
    write_file(dir.path(), "engine.cestt.json", "[1, 2]");
    write_file(dir.path(), "cestt-instrumentation.json", r#"{"package": "fallback"}"#);

    let found = discover(Some(&engine), &DiscoveryOptions::default());
    assert_eq!(found.package(), Some("fallback"));
}

#[test]
fn test_last_error_kept_when_nothing_parses() {
    let dir = TempDir::new().unwrap();
    let engine = write_file(dir.path(), "engine", "#!/bin/sh\n");
    write_file(dir.path(), "cestt_manifest.json", "{ broken");

    let found = discover(Some(&engine), &DiscoveryOptions::default());
    assert!(!found.is_detected());
    assert_eq!(found.describe(), "no instrumentation");
    let error = found.error().unwrap_or_default();
    assert!(error.starts_with("failed to load"), "{error}");
    assert!(error.contains("cestt_manifest.json"));
}

#[test]
fn test_nothing_found_is_empty_manifest() {
    let dir = TempDir::new().unwrap();
    let engine = write_file(dir.path(), "engine", "#!/bin/sh\n");
    let found = discover(Some(&engine), &DiscoveryOptions::default());
    assert!(!found.is_detected());
    assert!(!found.is_available());
    assert!(found.error().is_none());
    assert!(found.warnings().is_empty());
}

#[test]
fn test_available_from_each_source_independently() {
    assert!(manifest(json!({"capabilities": {"assembly_debug": true}})).is_available());
    assert!(manifest(json!({"capabilities": {"professional": true}})).is_available());
    assert!(manifest(json!({"capabilities": {"pro_tests": "yes"}})).is_available());
    assert!(manifest(json!({"pro_tests": {"stability": {"samples": 2}}})).is_available());

    assert!(!manifest(json!({"package": "hooks"})).is_available());
    assert!(!manifest(json!({
        "capabilities": {"assembly_debug": false, "professional": 0, "pro_tests": ""},
        "pro_tests": []
    }))
    .is_available());
}

#[test]
fn test_trace_preview_returns_tail() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..100u8).map(|i| b'a' + i % 26).collect();
    let trace = write_file(dir.path(), "trace.bin", &bytes);
    let m = manifest(json!({
        "trace_pipe": trace.display().to_string(),
        "trace_preview_bytes": 10
    }));

    let preview = m.capture_trace_preview();
    assert!(preview.is_success());
    let expected = String::from_utf8(bytes[90..].to_vec()).unwrap();
    assert_eq!(preview.value(), Some(&expected));
    assert!(m.warnings().is_empty());
}

#[test]
fn test_trace_preview_missing_file_warns_once() {
    let dir = TempDir::new().unwrap();
    let m = manifest(json!({"trace_pipe": dir.path().join("absent.trace").display().to_string()}));

    let preview = m.capture_trace_preview();
    assert_eq!(preview.value().map(String::as_str), Some(""));
    assert_eq!(m.warnings().len(), 1);
    assert!(m.warnings()[0].contains("not found"));
}

#[test]
fn test_trace_preview_decodes_invalid_utf8() {
    let dir = TempDir::new().unwrap();
    let trace = write_file(dir.path(), "trace.bin", [b'o', b'k', 0xff, 0xfe, b'!']);
    let m = manifest(json!({"trace_pipe": trace.display().to_string()}));

    let preview = m.capture_trace_preview();
    assert_eq!(preview.value().map(String::as_str), Some("ok\u{fffd}\u{fffd}!"));
    assert_eq!(m.trace_preview_bytes(), 4096);
}
