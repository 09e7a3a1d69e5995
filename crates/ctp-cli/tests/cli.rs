//! End-to-end runs of the `ctp` binary against temp directories.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// An empty config file inside `workdir`, so the user's own settings never
/// leak into a test run.
fn empty_config(workdir: &Path) -> PathBuf {
    let config = workdir.join("empty-config.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }
    config
}

fn ctp_command(workdir: &Path, config: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ctp"));
    command
        .current_dir(workdir)
        .arg("--config")
        .arg(config)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("CTP_LOG")
        .env_remove("CTP_WORKERS")
        .env_remove("CTP_PDF_BACKEND");
    command
}

fn ctp(workdir: &Path, args: &[&str]) -> Output {
    let config = empty_config(workdir);
    ctp_command(workdir, &config, args)
        .output()
        .expect("failed to run ctp")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn formats_lists_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let out = ctp(dir.path(), &["formats", "--table-style", "pipe"]);
    assert!(out.status.success());
    let text = stdout(&out);
    for label in ["pdf", "docx", "pptx", "rtf", "html", "text"] {
        assert!(text.contains(&format!("| {}", label)), "missing {label}:\n{text}");
    }
    assert!(text.contains("lopdf"));
}

#[test]
fn convert_directory_mirrors_tree_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("corpus");
    std::fs::create_dir_all(input.join("web")).unwrap();
    std::fs::write(input.join("notes.txt"), "Plain notes for the corpus.\n").unwrap();
    std::fs::write(
        input.join("web/page.html"),
        "<html><head><title>Page</title></head><body><p>Body text.</p></body></html>",
    )
    .unwrap();
    std::fs::write(input.join("letter.rtf"), "{\\rtf1\\ansi Dear reader,\\par thanks.}").unwrap();

    let out = ctp(
        dir.path(),
        &["convert", "corpus", "-o", "out", "--report", "report.json", "--quiet"],
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let notes = std::fs::read_to_string(dir.path().join("out/notes.txt")).unwrap();
    assert_eq!(notes, "Plain notes for the corpus.\n");
    let page = std::fs::read_to_string(dir.path().join("out/web/page.txt")).unwrap();
    assert!(page.contains("Page"));
    assert!(page.contains("Body text."));
    let letter = std::fs::read_to_string(dir.path().join("out/letter.txt")).unwrap();
    assert!(letter.contains("Dear reader,"));

    let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(value["stats"]["converted"], 3);
    assert!(stdout(&out).contains("SUMMARY"));
}

#[test]
fn existing_outputs_are_skipped_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "first run").unwrap();

    let first = ctp(dir.path(), &["convert", "a.txt", "-o", "out"]);
    assert!(first.status.success());
    let second = ctp(dir.path(), &["convert", "a.txt", "-o", "out"]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("skipped (output exists)"));
}

#[test]
fn output_inside_input_is_not_reconverted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/a.txt"), "only input").unwrap();

    let first = ctp(dir.path(), &["convert", "docs", "-o", "docs/out"]);
    assert!(first.status.success());
    assert!(dir.path().join("docs/out/a.txt").exists());

    let second = ctp(
        dir.path(),
        &["convert", "docs", "-o", "docs/out", "--report", "again.json"],
    );
    assert!(second.status.success());
    let report = std::fs::read_to_string(dir.path().join("again.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(value["stats"]["total"], 1);
    assert!(!dir.path().join("docs/out/out").exists());
}

#[test]
fn failed_file_sets_exit_code_three() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.txt"), "fine").unwrap();
    std::fs::write(dir.path().join("broken.pdf"), "%PDF-1.4\nthis is not a real pdf").unwrap();

    let out = ctp(
        dir.path(),
        &["convert", "good.txt", "broken.pdf", "-o", "out", "--pdf-backend", "lopdf"],
    );
    assert_eq!(out.status.code(), Some(3));
    assert!(stdout(&out).contains("Failed files:"));
    assert!(dir.path().join("out/good.txt").exists());
}

#[test]
fn missing_output_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "text").unwrap();
    let out = ctp(dir.path(), &["convert", "a.txt"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no output directory"));
}

#[test]
fn usage_error_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let out = ctp(dir.path(), &["convert", "--workers"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn clean_rewrites_legacy_encoding_as_utf8() {
    let dir = tempfile::tempdir().unwrap();
    // windows-1252 é, CRLF line ending and a whitespace run
    std::fs::write(dir.path().join("old.txt"), b"caf\xe9   menu\r\n").unwrap();

    let out = ctp(dir.path(), &["clean", "old.txt", "-o", "cleaned"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let cleaned = std::fs::read_to_string(dir.path().join("cleaned/old.txt")).unwrap();
    assert_eq!(cleaned, "café menu\n");
}

#[test]
fn inspect_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("page.htm"), "<p>Inspect me please</p>").unwrap();
    empty_config(dir.path());
    let before: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();

    let out = ctp(dir.path(), &["inspect", "page.htm", "--preview", "7"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Format:   html"));
    assert!(text.contains("Inspect..."));

    let after: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(before.len(), after.len());
}

#[test]
fn config_prints_loaded_settings() {
    let dir = tempfile::tempdir().unwrap();
    let out = ctp(dir.path(), &["config"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("built-in defaults apply"));

    let settings = dir.path().join("settings.toml");
    std::fs::write(&settings, "[output]\noverwrite = true\n\n[pdf]\nbackend = \"lopdf\"\n").unwrap();
    let out = ctp_command(dir.path(), &settings, &["config"]).output().unwrap();
    assert!(out.status.success());
    let text = stdout(&out);
    let parsed: toml::Value = toml::from_str(&text).unwrap();
    assert_eq!(parsed["output"]["overwrite"].as_bool(), Some(true));
    assert_eq!(parsed["pdf"]["backend"].as_str(), Some("lopdf"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_save_writes_user_config() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("xdg");
    let settings = dir.path().join("settings.toml");
    std::fs::write(&settings, "[input]\nrecursive = false\n").unwrap();

    let out = ctp_command(dir.path(), &settings, &["config", "--save"])
        .env("XDG_CONFIG_HOME", &home)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let saved = std::fs::read_to_string(home.join("ctp/config.toml")).unwrap();
    assert!(saved.contains("recursive = false"));
}

#[test]
fn formats_lists_table_styles() {
    let dir = tempfile::tempdir().unwrap();
    let out = ctp(dir.path(), &["formats"]);
    assert!(stdout(&out).contains("Table styles: plain, simple, grid, pipe"));
}
