//! Source hygiene for the canvas crate.
//!
//! The engine runs inside the browser and on the native sync client; a panic
//! in either takes the board down with it. These tests scan `src/` (test
//! files excluded) for patterns that panic or swallow errors. Every budget is
//! zero and must stay zero.

use std::fs;
use std::path::Path;

/// (pattern, budget, what it means)
const BUDGETS: &[(&str, usize, &str)] = &[
    (".unwrap()", 0, "panics on None/Err"),
    (".expect(", 0, "panics on None/Err"),
    ("panic!(", 0, "explicit panic"),
    ("unreachable!(", 0, "explicit panic"),
    ("todo!(", 0, "unfinished stub"),
    ("unimplemented!(", 0, "unfinished stub"),
    ("let _ =", 0, "discards a result without inspecting it"),
    (".ok()", 0, "discards an error"),
    ("#[allow(dead_code)]", 0, "hides unused code"),
];

struct SourceFile {
    path: String,
    content: String,
}

fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if path.extension().is_none_or(|e| e != "rs") || path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

#[test]
fn scans_some_sources() {
    let files = source_files();
    assert!(files.iter().any(|f| f.path.ends_with("engine.rs")), "run from the canvas crate root");
}

#[test]
fn budgets_hold() {
    let files = source_files();
    let mut report = Vec::new();
    for &(pattern, budget, meaning) in BUDGETS {
        let found = hits(&files, pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        if count > budget {
            report.push(format!("`{pattern}` ({meaning}): found {count}, max {budget}"));
            report.extend(found.iter().map(|(path, c)| format!("  {path}: {c}")));
        }
    }
    assert!(report.is_empty(), "hygiene budgets exceeded:\n{}", report.join("\n"));
}
