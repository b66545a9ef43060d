//! Configuration command workflows

use crate::common::TestTree;
use crate::treeseal;
use anyhow::Result;

#[test]
fn test_config_example_is_valid_toml() -> Result<()> {
    let tree = TestTree::new();

    let result = treeseal!(tree.root(), "config", "example").assert_success()?;

    assert!(result.contains_stdout("[manifest]"));
    assert!(result.contains_stdout("[[digest.checks]]"));
    let parsed: toml::Value = toml::from_str(&result.stdout)?;
    assert!(parsed.get("snapshot").is_some());
    Ok(())
}

#[test]
fn test_config_show_reflects_file() -> Result<()> {
    let tree = TestTree::new();
    tree.write("treeseal.toml", "[manifest]\nalgorithm = \"blake3\"\n");

    let result = treeseal!(tree.root(), "config", "show").assert_success()?;

    assert!(result.contains_stdout("treeseal.toml"));
    assert!(result.contains_stdout("algorithm = \"blake3\""));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let tree = TestTree::new();
    tree.write("a.txt", "x")
        .write("treeseal.toml", "[snapshot]\nmax_size_bytes = 0\n");

    let result = treeseal!(tree.root(), "snapshot").assert_exit(1)?;

    assert!(result.contains_stderr("snapshot.max_size_bytes must be positive"));
    Ok(())
}
