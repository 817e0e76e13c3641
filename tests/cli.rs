use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn hod(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hod"))
        .args(args)
        .env_remove("HOD_PASSPHRASE")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run hod")
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn sample() -> Vec<u8> {
    let mut data = b"hello world\n".to_vec();
    data.extend_from_slice(&[0x00; 40]);
    data.extend_from_slice(&[0xFF, 0x0F, 0xAA, 0x80]);
    data
}

#[test]
fn json_roundtrip_with_hash_and_signature() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let keymap = dir.path().join("input.hod");
    let output = dir.path().join("output.bin");
    fs::write(&input, sample()).unwrap();

    let out = hod(&[
        "encode", s(&input), s(&keymap),
        "--strategy", "power", "--hash", "sha512", "--passphrase", "pw",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&keymap).unwrap()).unwrap();
    assert_eq!(doc["hod_version"], "2.0");
    assert_eq!(doc["strategy"], "power");
    assert_eq!(doc["original_filename"], "input.bin");
    assert_eq!(doc["input_size_bytes"], sample().len() as u64);
    assert_eq!(doc["integrity"]["file_hash_algorithm"], "sha512");
    assert!(doc["integrity"]["payload_hmac_signature"].is_string());

    let out = Command::new(env!("CARGO_BIN_EXE_hod"))
        .args(["decode", s(&keymap), s(&output)])
        .env("HOD_PASSPHRASE", "pw")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(fs::read(&output).unwrap(), sample());
}

#[test]
fn conf_roundtrip_every_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.bin");
    fs::write(&input, sample()).unwrap();

    for strategy in ["rle", "fibonacci", "power"] {
        let keymap = dir.path().join(format!("{strategy}.conf"));
        let output = dir.path().join(format!("{strategy}.out"));
        let out = hod(&["encode", s(&input), s(&keymap), "-s", strategy, "--hash", "md5"]);
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        let text = fs::read_to_string(&keymap).unwrap();
        assert!(text.starts_with("[hod_metadata]\n"));
        assert!(text.contains("\n[hod_payload]\ndata = "));

        let out = hod(&["decode", s(&keymap), s(&output)]);
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        assert_eq!(fs::read(&output).unwrap(), sample());
    }
}

#[test]
fn unknown_strategy_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let keymap = dir.path().join("input.hod");
    fs::write(&input, b"x").unwrap();

    let out = hod(&["encode", s(&input), s(&keymap), "--strategy", "unknown"]);
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("unknown strategy 'unknown'"), "{err}");
    assert!(err.contains("rle"));
    assert!(!keymap.exists());
}

#[test]
fn wrong_passphrase_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let keymap = dir.path().join("input.hod");
    let output = dir.path().join("output.bin");
    fs::write(&input, sample()).unwrap();

    assert!(hod(&["encode", s(&input), s(&keymap), "-p", "right"]).status.success());

    let out = hod(&["decode", s(&keymap), s(&output), "-p", "wrong"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("HMAC signature mismatch"));
    assert!(!output.exists());

    let out = hod(&["decode", s(&keymap), s(&output)]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("passphrase is required"));
    assert!(!output.exists());
}

#[test]
fn corrupted_file_hash_still_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let keymap = dir.path().join("input.hod");
    let output = dir.path().join("output.bin");
    fs::write(&input, sample()).unwrap();

    assert!(hod(&["encode", s(&input), s(&keymap), "--hash", "sha256"]).status.success());
    let mut doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&keymap).unwrap()).unwrap();
    doc["integrity"]["file_hash"] = "0".repeat(64).into();
    fs::write(&keymap, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let out = hod(&["decode", s(&keymap), s(&output)]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).to_lowercase().contains("mismatch"));
    assert_eq!(fs::read(&output).unwrap(), sample());
}

#[test]
fn show_payload_previews_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let keymap = dir.path().join("input.hod");
    fs::write(&input, [0xFF]).unwrap();

    assert!(hod(&["encode", s(&input), s(&keymap), "-s", "power"]).status.success());
    let out = hod(&["decode", s(&keymap), "--show-payload"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("--- HoD Symbolic Payload ---"));
    assert!(text.contains("Strategy: power"));
    assert!(text.contains("  Run 001: 1^8"));

    assert!(!hod(&["decode", s(&keymap)]).status.success());
}

#[test]
fn list_names_strategies_and_formats() {
    let out = hod(&["list"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for name in ["rle", "fibonacci", "power", "json (.hod)", "conf (.conf)"] {
        assert!(text.contains(name), "missing {name} in {text}");
    }
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let out = hod(&[
        "encode",
        s(&dir.path().join("nope.bin")),
        s(&dir.path().join("nope.hod")),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Check that the file exists"));
}

#[test]
fn progress_flag_produces_same_keymap_payload() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    let plain = dir.path().join("plain.hod");
    let bar = dir.path().join("bar.hod");
    fs::write(&input, sample()).unwrap();

    assert!(hod(&["encode", s(&input), s(&plain)]).status.success());
    assert!(hod(&["encode", s(&input), s(&bar), "--progress"]).status.success());
    let read = |p: &Path| -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap()
    };
    assert_eq!(read(&plain)["payload"], read(&bar)["payload"]);
}
