//! Integration tests for the `mathcheck` binary.
//!
//! Runs the static renderer against HTML fixtures, so no browser or network
//! is needed.

#![allow(deprecated)] // cargo_bin is deprecated; its replacement is not stable yet

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `mathcheck` binary.
fn mathcheck() -> Command {
    Command::cargo_bin("mathcheck").expect("binary 'mathcheck' should be built")
}

/// `file://` URL of a fixture.
fn fixture_url(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    url::Url::from_file_path(path)
        .expect("absolute fixture path")
        .to_string()
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    mathcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: mathcheck"))
        .stdout(predicate::str::contains("--scope"))
        .stdout(predicate::str::contains("--renderer"))
        .stdout(predicate::str::contains("--granularity"));
}

#[test]
fn version_flag_shows_semver() {
    mathcheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^mathcheck \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn missing_url_exits_with_one_and_usage() {
    mathcheck()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing URL"))
        .stderr(predicate::str::contains("Usage: mathcheck"));
}

#[test]
fn unknown_renderer_is_rejected() {
    mathcheck()
        .args(["--renderer", "firefox", "https://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ─── Reports (static renderer) ───────────────────────────────────────────────

#[test]
fn clean_page_reports_no_issues_and_succeeds() {
    let url = fixture_url("clean.html");
    mathcheck()
        .args(["--renderer", "static", &url])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "Checked 50 text nodes on {url}\n"
        )))
        .stdout(predicate::str::contains("No raw math source found."))
        .stdout(predicate::str::contains("Render errors").not());
}

#[test]
fn hits_are_listed_and_exit_code_stays_zero() {
    let url = fixture_url("broken.html");
    mathcheck()
        .args(["--renderer", "static", "--scope", "#article", &url])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Checked 7 text nodes"))
        .stdout(predicate::str::contains("Potential unrendered math:"))
        .stdout(predicate::str::contains("- [1] The price is $5 and $10"))
        .stdout(predicate::str::contains("- [3] $$x^2 + y^2 = z^2$$"))
        .stdout(predicate::str::contains(r"- [4] Half is \frac{1}{2} of the whole"))
        .stdout(predicate::str::contains(r"- [5] Inline \(a + b\) stayed raw"))
        .stdout(predicate::str::contains("E = mc^2").not())
        .stdout(predicate::str::contains("Render errors: 2"))
        .stdout(predicate::str::contains("- [0] z / 0"))
        .stdout(predicate::str::contains(r"- [1] \sqrt{2"));
}

#[test]
fn default_scope_covers_whole_body() {
    let url = fixture_url("broken.html");
    mathcheck()
        .args(["--renderer", "static", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 8 text nodes"))
        .stdout(predicate::str::contains("- [7] Costs $1 or $2"));
}

#[test]
fn one_based_indices() {
    let url = fixture_url("broken.html");
    mathcheck()
        .args(["--renderer", "static", "--scope", "#article", "--one-based", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("- [2] The price is $5 and $10"))
        .stdout(predicate::str::contains("- [1] z / 0"));
}

#[test]
fn json_format() {
    let url = fixture_url("broken.html");
    let output = mathcheck()
        .args(["--renderer", "static", "--scope", "#article", "--format", "json", &url])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["units_checked"], 7);
    let hits = report["hits"].as_array().unwrap();
    assert_eq!(hits[0]["matched_by"], "inline-delimiter-pair");
    assert_eq!(hits[1]["matched_by"], "block-delimiter");
    assert_eq!(hits[2]["matched_by"], "latex-command");
    assert_eq!(hits[3]["matched_by"], "escaped-paren");
    assert!(hits
        .iter()
        .any(|h| h["kind"] == "render-error" && h["matched_by"] == "katex-error"));
}

// ─── Fatal errors ────────────────────────────────────────────────────────────

#[test]
fn missing_scope_is_fatal_with_clear_message() {
    let url = fixture_url("clean.html");
    mathcheck()
        .args(["--renderer", "static", "--scope", "#no-such-container", &url])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "scope not found: no element matches `#no-such-container`",
        ))
        .stdout(predicate::str::contains("Checked").not());
}

#[test]
fn unreadable_page_is_a_navigation_error() {
    mathcheck()
        .args(["--renderer", "static", "file:///no/such/dir/page.html"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load file:///no/such/dir/page.html"));
}

#[test]
fn invalid_selector_is_reported() {
    let url = fixture_url("clean.html");
    mathcheck()
        .args(["--renderer", "static", "--hosts", "div[", &url])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid selector `div[`"));
}
