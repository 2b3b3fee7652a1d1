#[test]
fn help_mentions_flags_and_commands() {
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("discuss"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success(), "--help should succeed");
    let text = String::from_utf8_lossy(&output.stdout);

    for needle in ["--base-url", "--timeout-ms", "--pretty", "bootstrap", "search"] {
        assert!(
            text.contains(needle),
            "help output should contain '{needle}'"
        );
    }
}

#[test]
fn search_help_mentions_limit() {
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("discuss"))
        .args(["search", "--help"])
        .output()
        .expect("run search help");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("--limit"));
    assert!(text.contains("<TERM>"));
}
