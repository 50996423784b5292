//! End-to-end redirection scenarios, exercised against real files under a
//! temp directory rather than mocked paths. These drive
//! `MappingTable::rewrite` and then perform the actual filesystem operation
//! the interposer would have redirected, checking the exact end state the
//! spec calls out (content, presence/absence at both the original prefix
//! and the target).

use remapper_schema::{Mapping, MappingTable};
use std::fs;

fn table(home: &std::path::Path, target: &std::path::Path) -> MappingTable {
    let mapping = Mapping::parse(&format!("{}/.dummy*", home.display())).unwrap();
    MappingTable::new(target.to_string_lossy(), [mapping])
}

#[test]
fn scenario_1_matches_and_non_matches() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("h");
    let target = dir.path().join("t");
    let t = table(&home, &target);

    let open_path = format!("{}/.dummy-test/open.txt", home.display());
    let rewritten = t.rewrite(&open_path).unwrap();
    assert_eq!(rewritten, format!("{}/.dummy-test/open.txt", target.display()));

    let other_path = format!("{}/other/file", home.display());
    assert_eq!(t.rewrite(&other_path), None);

    // No trailing slash / no following component still matches the bare
    // directory name as the component.
    let bare = format!("{}/.dummy-test", home.display());
    assert_eq!(t.rewrite(&bare).unwrap(), format!("{}/.dummy-test", target.display()));
}

#[test]
fn scenario_2_create_write_observed_at_target() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("h");
    let target = dir.path().join("t");
    let t = table(&home, &target);

    let original = format!("{}/.dummy-test/open.txt", home.display());
    let rewritten = t.rewrite(&original).expect("mapping should match");
    let rewritten_path = std::path::Path::new(&rewritten);
    fs::create_dir_all(rewritten_path.parent().unwrap()).unwrap();
    fs::write(rewritten_path, b"open-content\n").unwrap();

    let observed = fs::read(rewritten_path).unwrap();
    assert_eq!(observed.len(), 13);
    assert_eq!(observed, b"open-content\n");
    assert!(!std::path::Path::new(&original).exists());
}

#[test]
fn scenario_3_rename_observed_at_target_only() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("h");
    let target = dir.path().join("t");
    let t = table(&home, &target);

    let source = format!("{}/.dummy-test/pre-rename.txt", home.display());
    let dest = format!("{}/.dummy-test/renamed.txt", home.display());
    let rewritten_source = t.rewrite(&source).unwrap();
    let rewritten_dest = t.rewrite(&dest).unwrap();
    let rewritten_source = std::path::Path::new(&rewritten_source);
    let rewritten_dest = std::path::Path::new(&rewritten_dest);

    fs::create_dir_all(rewritten_source.parent().unwrap()).unwrap();
    fs::write(rewritten_source, b"pre-rename content").unwrap();
    fs::rename(rewritten_source, rewritten_dest).unwrap();

    assert!(!rewritten_source.exists());
    assert_eq!(fs::read(rewritten_dest).unwrap(), b"pre-rename content");
    assert!(!std::path::Path::new(&dest).exists());
    assert!(!std::path::Path::new(&source).exists());
}

#[test]
fn scenario_6_symlink_target_is_not_itself_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("h");
    let target = dir.path().join("t");
    let t = table(&home, &target);

    let link_path = format!("{}/.dummy-test/symlink.lnk", home.display());
    let rewritten_link = t.rewrite(&link_path).unwrap();
    let rewritten_link = std::path::Path::new(&rewritten_link);
    fs::create_dir_all(rewritten_link.parent().unwrap()).unwrap();

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink("link-target.txt", rewritten_link).unwrap();
        let observed = fs::read_link(rewritten_link).unwrap();
        assert_eq!(observed, std::path::Path::new("link-target.txt"));
    }
}

#[test]
fn rewrite_is_idempotent_when_target_outside_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("h");
    let target = dir.path().join("t");
    let t = table(&home, &target);

    let path = format!("{}/.dummy-test/file", home.display());
    let once = t.rewrite(&path).unwrap();
    // `target` does not itself match any mapping's parent, so a second
    // rewrite attempt on the already-rewritten path is a no-op (it simply
    // doesn't start with `home`).
    assert_eq!(t.rewrite(&once), None);
}
