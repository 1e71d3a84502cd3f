//! Integration tests for the binary's file plumbing, driven through the
//! library entry points plus on-disk fixtures.

use std::fs;

use unweave_passes::{deobfuscate, Config};

#[test]
fn test_deobfuscate_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("sample.js");
    fs::write(&input, "atob('c29sdmVkIQ==');").unwrap();

    let source = fs::read_to_string(&input).unwrap();
    let output = deobfuscate(&source, &Config::default()).unwrap();
    let out_path = dir.path().join("sample-deob.js");
    fs::write(&out_path, &output).unwrap();

    let written = fs::read_to_string(&out_path).unwrap();
    assert_eq!(written.trim_end(), "'solved!';");
}

#[test]
fn test_invalid_input_is_fatal() {
    let err = deobfuscate("var = broken(((", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("parse error"));
}
