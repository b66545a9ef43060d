//! Snapshot archive workflows

use crate::common::TestTree;
use crate::treeseal;
use anyhow::Result;

fn leftovers(tree: &TestTree) -> Vec<String> {
    tree.root_entries()
        .into_iter()
        .filter(|name| name.starts_with(".treeseal-"))
        .collect()
}

#[test]
fn test_snapshot_within_budget_uses_primary() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}").write("README.md", "# demo");

    let result = treeseal!(tree.root(), "snapshot", "--max-size", "10000000").assert_success()?;

    assert!(result.contains_stdout("snapshot.tar.zst"));
    assert!(result.contains_stdout("2 files, primary tier"));
    assert!(tree.path("snapshot.tar.zst").is_file());
    Ok(())
}

#[test]
fn test_snapshot_falls_back_once() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}")
        .write_noise("data/blob.bin", 2 * 1024 * 1024, 7);

    let result = treeseal!(tree.root(), "snapshot", "--max-size", "100000").assert_success()?;

    assert!(result.contains_stdout("fallback tier"));
    assert!(result.contains_stdout("1 files"));
    let size = std::fs::metadata(tree.path("snapshot.tar.zst"))?.len();
    assert!(size <= 100_000);
    Ok(())
}

#[test]
fn test_snapshot_over_budget_after_fallback() -> Result<()> {
    let tree = TestTree::new();
    tree.write_noise("src/huge.bin", 2 * 1024 * 1024, 11)
        .write_noise("assets/more.bin", 512 * 1024, 12);

    let result = treeseal!(tree.root(), "snapshot", "--max-size", "1000").assert_exit(4)?;

    assert!(result.contains_stderr("budget 1000 bytes"));
    assert!(!tree.path("snapshot.tar.zst").exists());
    assert!(leftovers(&tree).is_empty());
    Ok(())
}

#[test]
fn test_failed_snapshot_keeps_previous_archive() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}");
    treeseal!(tree.root(), "snapshot").assert_success()?;
    let previous = std::fs::read(tree.path("snapshot.tar.zst"))?;

    tree.write_noise("src/huge.bin", 1024 * 1024, 3);
    treeseal!(tree.root(), "snapshot", "--max-size", "1000").assert_exit(4)?;

    assert_eq!(std::fs::read(tree.path("snapshot.tar.zst"))?, previous);
    Ok(())
}

#[test]
fn test_snapshot_of_empty_selection() -> Result<()> {
    let tree = TestTree::new();
    tree.write(".git/HEAD", "ref: refs/heads/main");

    treeseal!(tree.root(), "snapshot").assert_exit(3)?;
    assert!(!tree.path("snapshot.tar.zst").exists());
    Ok(())
}

#[test]
fn test_snapshot_gzip_format_from_config() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/main.rs", "fn main() {}")
        .write("treeseal.toml", "[snapshot]\nformat = \"tar-gz\"\n");

    treeseal!(tree.root(), "snapshot").assert_success()?;

    assert!(tree.path("snapshot.tar.gz").is_file());
    assert!(!tree.path("snapshot.tar.zst").exists());
    Ok(())
}
