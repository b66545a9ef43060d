//! State digest workflows

use crate::common::TestTree;
use crate::treeseal;
use anyhow::Result;

#[test]
fn test_digest_reports_sizes_and_checkpoints() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}")
        .write_noise("assets/logo.png", 4096, 1)
        .write("node_modules/pkg/index.js", "module.exports = 1;");

    let result = treeseal!(tree.root(), "digest", "--top", "2").assert_success()?;

    assert!(result.contains_stdout("STATE_DIGEST.md"));
    let report = tree.read("STATE_DIGEST.md");
    assert!(report.starts_with("# State digest"));
    assert!(report.contains("| `assets` | 4.00 KB |"));
    assert!(report.contains("| `node_modules` | present |"));
    assert!(report.contains("| `.venv` | absent | - |"));
    assert!(report.contains("| `assets/logo.png` | 4.00 KB |"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_digest_runs_every_check() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}").write(
        "treeseal.toml",
        r#"
[[digest.checks]]
name = "lint"
program = "treeseal-no-such-linter"

[[digest.checks]]
name = "tests"
program = "sh"
args = ["-c", "echo 'assertion failed' >&2; exit 1"]

[[digest.checks]]
name = "format"
program = "true"
"#,
    );

    let result = treeseal!(tree.root(), "digest").assert_success()?;

    assert!(result.contains_stdout("assertion failed"));
    let report = tree.read("STATE_DIGEST.md");
    assert!(report.contains("| lint | `treeseal-no-such-linter` | **UNAVAILABLE** |"));
    assert!(report.contains("| tests | `sh -c echo 'assertion failed' >&2; exit 1` | **FAIL (EXIT 1)** |"));
    assert!(report.contains("| format | `true` | PASS |"));
    assert!(report.contains("### tests stderr"));
    Ok(())
}

#[test]
fn test_digest_to_explicit_output() -> Result<()> {
    let tree = TestTree::new();
    tree.write("a.txt", "x");
    let out = tempfile::tempdir()?;
    let target = out.path().join("reports/digest.md");

    treeseal!(tree.root(), "digest", "--output", target.to_str().unwrap()).assert_success()?;

    assert!(target.is_file());
    assert!(!tree.path("STATE_DIGEST.md").exists());
    Ok(())
}
