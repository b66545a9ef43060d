//! Manifest, verify, and timestamp workflows

use crate::common::TestTree;
use crate::treeseal;
use anyhow::Result;
use treeseal_core::hash::hash_bytes;
use treeseal_core::HashAlgorithm;

fn line(content: &[u8], path: &str) -> String {
    format!("{}  {}\n", hash_bytes(HashAlgorithm::Sha256, content).to_hex(), path)
}

fn no_proof_client(tree: &TestTree) {
    tree.write(
        "treeseal.toml",
        "[proof]\nprogram = \"treeseal-no-such-ots\"\n",
    );
}

#[test]
fn test_manifest_lists_sorted_entries() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/b.txt", "y").write("src/a.txt", "x");

    let result = treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;

    assert!(result.contains_stdout("MANIFEST.sha256"));
    assert!(result.contains_stdout("2 files, sha256"));
    assert_eq!(
        tree.read("MANIFEST.sha256"),
        format!("{}{}", line(b"x", "src/a.txt"), line(b"y", "src/b.txt"))
    );
    Ok(())
}

#[test]
fn test_manifest_honors_excludes() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x")
        .write("node_modules/pkg/index.js", "module.exports = 1;")
        .write("logs/build.log", "noise")
        .write("src/deep/trace.log", "noise");

    treeseal!(tree.root(), "manifest", "--no-stamp", "--exclude", "*.log").assert_success()?;

    assert_eq!(tree.read("MANIFEST.sha256"), line(b"x", "src/a.txt"));
    Ok(())
}

#[test]
fn test_manifest_is_reproducible() -> Result<()> {
    let tree = TestTree::new();
    for i in 0..50 {
        tree.write(&format!("src/mod{}/file{}.rs", i % 7, i), format!("fn f{}() {{}}", i));
    }

    treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;
    let first = tree.read("MANIFEST.sha256");
    treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;

    assert_eq!(first, tree.read("MANIFEST.sha256"));
    assert_eq!(first.lines().count(), 50);
    Ok(())
}

#[test]
fn test_missing_proof_client_is_skipped() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    no_proof_client(&tree);

    let result = treeseal!(tree.root(), "manifest").assert_success()?;

    assert!(result.contains_stdout("skipped"));
    assert!(tree.path("MANIFEST.sha256").is_file());
    assert!(!tree.path("MANIFEST.sha256.ots").exists());
    Ok(())
}

#[test]
fn test_standalone_stamp_without_client_fails() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    no_proof_client(&tree);
    treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;

    treeseal!(tree.root(), "stamp", "MANIFEST.sha256").assert_exit(1)?;
    Ok(())
}

#[test]
fn test_blake3_manifest_named_by_algorithm() -> Result<()> {
    let tree = TestTree::new();
    tree.write("a.txt", "x");

    let result =
        treeseal!(tree.root(), "manifest", "--no-stamp", "--algorithm", "blake3").assert_success()?;

    assert!(result.contains_stdout("blake3"));
    let text = tree.read("MANIFEST.blake3");
    assert_eq!(
        text,
        format!("{}  a.txt\n", hash_bytes(HashAlgorithm::Blake3, b"x").to_hex())
    );
    assert!(!tree.path("MANIFEST.sha256").exists());
    Ok(())
}

#[test]
fn test_empty_tree_reports_nothing_to_include() -> Result<()> {
    let tree = TestTree::new();
    tree.write("node_modules/pkg/index.js", "module.exports = 1;");

    let result = treeseal!(tree.root(), "manifest", "--no-stamp").assert_exit(3)?;

    assert!(result.contains_stderr("nothing to include"));
    assert!(!tree.path("MANIFEST.sha256").exists());
    Ok(())
}

#[test]
fn test_invalid_root_exit_code() -> Result<()> {
    let tree = TestTree::new();

    treeseal!(tree.root(), "--root", "does-not-exist", "manifest", "--no-stamp").assert_exit(2)?;
    Ok(())
}

#[test]
fn test_usage_error_exit_code_differs_from_invalid_root() -> Result<()> {
    let tree = TestTree::new();

    treeseal!(tree.root(), "manifest", "--no-such-flag").assert_exit(64)?;
    treeseal!(tree.root(), "--help").assert_success()?;
    Ok(())
}

#[test]
fn test_verify_detects_tampering() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x").write("src/b.txt", "y");
    treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;

    let clean = treeseal!(tree.root(), "verify").assert_success()?;
    assert!(clean.contains_stdout("2 files match"));

    tree.write("src/a.txt", "tampered").write("src/new.txt", "z");
    std::fs::remove_file(tree.path("src/b.txt"))?;

    let result = treeseal!(tree.root(), "verify").assert_exit(6)?;
    assert!(result.contains_stdout("modified"));
    assert!(result.contains_stdout("missing"));
    assert!(result.contains_stdout("src/new.txt"));
    Ok(())
}

/// Stand-in `ots` that, like the real client, refuses to overwrite a proof
#[cfg(unix)]
fn refusing_proof_client(tree: &TestTree) {
    use std::os::unix::fs::PermissionsExt;

    tree.write("tools/ots", "#!/bin/sh\nset -C\ncat \"$2\" > \"$2.ots\"\n");
    let script = tree.path("tools/ots");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark script executable");
    tree.write(
        "treeseal.toml",
        format!("[proof]\nprogram = \"{}\"\n", script.display()),
    );
}

#[cfg(unix)]
#[test]
fn test_rebuilt_manifest_gets_fresh_proof() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    refusing_proof_client(&tree);

    treeseal!(tree.root(), "manifest").assert_success()?;
    assert_eq!(tree.read("MANIFEST.sha256.ots"), tree.read("MANIFEST.sha256"));

    tree.write("src/a.txt", "changed");
    let result = treeseal!(tree.root(), "manifest").assert_success()?;

    assert!(result.contains_stdout("removed stale proof"));
    assert!(result.contains_stdout("stamped"));
    assert_eq!(tree.read("MANIFEST.sha256.ots"), tree.read("MANIFEST.sha256"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unchanged_manifest_keeps_its_proof() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    refusing_proof_client(&tree);

    treeseal!(tree.root(), "manifest").assert_success()?;
    let proof = tree.read("MANIFEST.sha256.ots");

    // The client refuses to overwrite, so this submission fails; advisory only
    treeseal!(tree.root(), "manifest").assert_success()?;

    assert_eq!(tree.read("MANIFEST.sha256.ots"), proof);
    assert_eq!(proof, tree.read("MANIFEST.sha256"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unstamped_rebuild_drops_old_proof() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    refusing_proof_client(&tree);
    treeseal!(tree.root(), "manifest").assert_success()?;

    tree.write("src/a.txt", "changed");
    treeseal!(tree.root(), "manifest", "--no-stamp").assert_success()?;

    assert!(tree.path("MANIFEST.sha256").is_file());
    assert!(!tree.path("MANIFEST.sha256.ots").exists());
    Ok(())
}

#[test]
fn test_custom_output_records_algorithm() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");

    let result = treeseal!(
        tree.root(),
        "manifest",
        "--no-stamp",
        "--algorithm",
        "blake3",
        "--output",
        "hashes.txt"
    )
    .assert_success()?;

    assert!(result.contains_stdout("hashes.txt.blake3"));
    assert!(!tree.path("hashes.txt").exists());

    let clean = treeseal!(tree.root(), "verify", "--manifest", "hashes.txt.blake3").assert_success()?;
    assert!(clean.contains_stdout("1 files match"));
    assert!(clean.contains_stdout("blake3"));
    Ok(())
}

#[test]
fn test_verify_algorithm_flag_for_untagged_manifest() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");
    tree.write(
        "hashes.txt",
        format!("{}  src/a.txt\n", hash_bytes(HashAlgorithm::Blake3, b"x").to_hex()),
    );

    treeseal!(tree.root(), "verify", "--manifest", "hashes.txt").assert_exit(6)?;
    treeseal!(tree.root(), "verify", "--manifest", "hashes.txt", "--algorithm", "blake3")
        .assert_success()?;
    Ok(())
}

#[test]
fn test_output_tagged_with_other_algorithm_is_rejected() -> Result<()> {
    let tree = TestTree::new();
    tree.write("src/a.txt", "x");

    let result = treeseal!(
        tree.root(),
        "manifest",
        "--no-stamp",
        "--algorithm",
        "blake3",
        "--output",
        "MANIFEST.sha256"
    )
    .assert_exit(1)?;

    assert!(result.contains_stderr("names sha256 but blake3 was requested"));
    assert!(!tree.path("MANIFEST.sha256").exists());
    Ok(())
}
