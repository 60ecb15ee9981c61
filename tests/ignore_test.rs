use std::fs::File;
use std::io::Write;

use stencil::ignore::{compile_patterns, parse_ignore_file, IGNORE_FILE};
use tempfile::TempDir;

#[test]
fn test_parse_ignore_file() {
    let temp_dir = TempDir::new().unwrap();
    let ignore_path = temp_dir.path().join(IGNORE_FILE);

    // Without a .stencilignore only the defaults apply
    let glob_set = parse_ignore_file(&ignore_path).unwrap();
    assert!(glob_set.is_match("**/.DS_Store")); // Default pattern
    assert!(glob_set.is_match("stencil.json"));
    assert!(glob_set.is_match(".git"));
    assert!(glob_set.is_match(".git/objects/ab"));
    assert!(!glob_set.is_match("src/main.rs"));

    // With a .stencilignore
    let mut file = File::create(&ignore_path).unwrap();
    writeln!(file, "*.pyc\n__pycache__/").unwrap();

    let glob_set = parse_ignore_file(&ignore_path).unwrap();
    assert!(glob_set.is_match("file.pyc"));
    assert!(glob_set.is_match("__pycache__/"));
    assert!(glob_set.is_match("**/.DS_Store")); // Default pattern still works
}

#[test]
fn test_ignore_file_excludes_itself() {
    let temp_dir = TempDir::new().unwrap();
    let glob_set = parse_ignore_file(temp_dir.path().join(IGNORE_FILE)).unwrap();
    assert!(glob_set.is_match(IGNORE_FILE));
}

#[test]
fn test_comments_and_blank_lines_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let ignore_path = temp_dir.path().join(IGNORE_FILE);
    let mut file = File::create(&ignore_path).unwrap();
    writeln!(file, "# build output\n\ntarget/**\n  \n# editors\n*.swp").unwrap();

    let glob_set = parse_ignore_file(&ignore_path).unwrap();
    assert!(glob_set.is_match("target/debug/app"));
    assert!(glob_set.is_match("notes.swp"));
    assert!(!glob_set.is_match("# build output"));
}

#[test]
fn test_invalid_pattern_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let ignore_path = temp_dir.path().join(IGNORE_FILE);
    let mut file = File::create(&ignore_path).unwrap();
    writeln!(file, "src/[one").unwrap();

    assert!(parse_ignore_file(&ignore_path).is_err());
}

#[test]
fn test_compile_patterns() {
    let patterns = vec!["go.sum".to_string(), "vendor/**".to_string()];
    let glob_set = compile_patterns(&patterns).unwrap();

    assert!(glob_set.is_match("go.sum"));
    assert!(glob_set.is_match("vendor/modules.txt"));
    assert!(!glob_set.is_match("main.go"));

    assert!(compile_patterns(&["[bad".to_string()]).is_err());
}
