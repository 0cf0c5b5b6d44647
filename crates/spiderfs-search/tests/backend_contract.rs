//! Both backends must return identical results for the same tree and query.
//!
//! Every case pins the native results. The external backend is then run
//! against stand-in `rg` and `fzf` scripts that replay what the real tools
//! print, and against the real tools as well when they are installed.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rstest::{fixture, rstest};
use spiderfs_search::{
    ContentQuery, ExternalBackend, LocateQuery, LocatorHit, NativeBackend, SearchBackend,
    SearchMatch,
};
use tempfile::TempDir;

/// Relative path, line number, line content and byte offset of one match.
type Found = (&'static str, usize, &'static str, u64);

#[fixture]
fn corpus() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    fs::create_dir_all(root.join("src/config")).expect("mkdir");
    fs::create_dir_all(root.join(".hidden")).expect("mkdir");
    fs::write(root.join("README.md"), "# Project\nsee src/main.rs\n").expect("write");
    fs::write(
        root.join("src/main.rs"),
        "fn main() {\n    println!(\"hello\");\n}\n",
    )
    .expect("write");
    fs::write(root.join("src/config.rs"), "pub struct Config;\r\nimpl Config {}\r\n")
        .expect("write");
    fs::write(root.join("src/config/loader.rs"), "fn load() -> Config {\n    Config\n}")
        .expect("write");
    fs::write(root.join(".hidden/notes.txt"), "main notes\n").expect("write");
    fs::write(root.join(".gitignore"), "src/\n").expect("write");
    dir
}

fn installed() -> Option<ExternalBackend> {
    let backend = ExternalBackend::new("rg", "fzf", Duration::from_secs(10));
    let availability = backend.detect_tools();
    (availability.ripgrep && availability.fzf).then_some(backend)
}

fn relative(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .expect("under the corpus")
        .to_string_lossy()
        .replace('\\', "/")
}

fn search(
    root: &Path,
    backend: &dyn SearchBackend,
    query: &ContentQuery,
) -> Vec<(String, usize, String, u64)> {
    backend
        .search(query)
        .expect("search succeeds")
        .into_matches()
        .into_iter()
        .map(|found: SearchMatch| {
            (
                relative(root, &found.path),
                found.line_number,
                found.line_content,
                found.byte_offset.expect("offset reported"),
            )
        })
        .collect()
}

fn locate(root: &Path, backend: &dyn SearchBackend, query: &LocateQuery) -> Vec<(String, bool)> {
    backend
        .locate(query)
        .expect("locate succeeds")
        .into_iter()
        .map(|LocatorHit { path, is_directory, .. }| (relative(root, &path), is_directory))
        .collect()
}

fn owned(expected: &[Found]) -> Vec<(String, usize, String, u64)> {
    expected
        .iter()
        .map(|&(path, line, content, offset)| (path.to_owned(), line, content.to_owned(), offset))
        .collect()
}

#[cfg(unix)]
fn script(dir: &TempDir, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    let version = r#"if [ "$1" = "--version" ]; then echo 1.0; exit 0; fi"#;
    fs::write(&path, format!("#!/bin/sh\n{version}\n{body}\n")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().into_owned()
}

/// An `rg` that prints `expected` in the tool's `--null` format, last file
/// first and with CRLF lines carrying their `\r`.
#[cfg(unix)]
fn replaying_ripgrep(tools: &TempDir, root: &Path, expected: &[Found]) -> String {
    if expected.is_empty() {
        return script(tools, "rg", "exit 1");
    }
    let mut output = Vec::new();
    for &(path, line, content, offset) in expected.iter().rev() {
        output.extend_from_slice(root.join(path).to_string_lossy().as_bytes());
        output.push(0);
        output.extend_from_slice(format!("{line}:{offset}:{content}").as_bytes());
        if path == "src/config.rs" {
            output.push(b'\r');
        }
        output.push(b'\n');
    }
    let replay = tools.path().join("rg-output");
    fs::write(&replay, output).expect("write replay");
    script(tools, "rg", &format!("cat '{}'", replay.display()))
}

#[rstest]
#[case::plain("main", vec![
    (".hidden/notes.txt", 1, "main notes", 0),
    ("README.md", 2, "see src/main.rs", 10),
    ("src/main.rs", 1, "fn main() {", 0),
])]
#[case::anchored("^impl", vec![("src/config.rs", 2, "impl Config {}", 20)])]
#[case::crlf_anchor("\\{\\}$", vec![])]
#[case::unicode_class("\\bConfig\\b", vec![
    ("src/config.rs", 1, "pub struct Config;", 0),
    ("src/config.rs", 2, "impl Config {}", 20),
    ("src/config/loader.rs", 1, "fn load() -> Config {", 0),
    ("src/config/loader.rs", 2, "    Config", 22),
])]
#[case::nothing("absent-token", vec![])]
fn content_search_agrees(corpus: TempDir, #[case] pattern: &str, #[case] expected: Vec<Found>) {
    let root = corpus.path();
    let query = ContentQuery::new(pattern, root);
    let native = search(root, &NativeBackend, &query);
    assert_eq!(native, owned(&expected));

    #[cfg(unix)]
    {
        let tools = TempDir::new().expect("temp dir");
        let ripgrep = replaying_ripgrep(&tools, root, &expected);
        let replayed = ExternalBackend::new(ripgrep, "fzf", Duration::from_secs(10));
        assert_eq!(search(root, &replayed, &query), native);
    }

    if let Some(external) = installed() {
        assert_eq!(search(root, &external, &query), native);
    }
}

#[rstest]
fn native_search_covers_hidden_and_ignored_files(corpus: TempDir) {
    let query = ContentQuery::new("main", corpus.path());
    let paths: Vec<String> = search(corpus.path(), &NativeBackend, &query)
        .into_iter()
        .map(|(path, ..)| path)
        .collect();
    assert!(paths.contains(&String::from(".hidden/notes.txt")));
    assert!(paths.contains(&String::from("src/main.rs")));
}

#[rstest]
#[case::files_and_dirs("config", true, 5, vec![
    ("src/config", true),
    ("src/config.rs", false),
    ("src/config/loader.rs", false),
])]
#[case::files_only("config", false, 5, vec![
    ("src/config.rs", false),
    ("src/config/loader.rs", false),
])]
#[case::capped("rs", true, 2, vec![("src/config.rs", false), ("src/main.rs", false)])]
#[case::nothing("zzzz", true, 5, vec![])]
fn locate_agrees(
    corpus: TempDir,
    #[case] pattern: &str,
    #[case] include_dirs: bool,
    #[case] max_results: usize,
    #[case] expected: Vec<(&'static str, bool)>,
) {
    let root = corpus.path();
    let query = LocateQuery::new(pattern)
        .with_root(Some(root.to_path_buf()))
        .with_include_dirs(include_dirs)
        .with_max_results(max_results);
    let native = locate(root, &NativeBackend, &query);
    let wanted: Vec<(String, bool)> = expected
        .iter()
        .map(|&(path, is_dir)| (path.to_owned(), is_dir))
        .collect();
    assert_eq!(native, wanted);

    // A pass-through filter leaves selection to the shared scorer.
    #[cfg(unix)]
    {
        let tools = TempDir::new().expect("temp dir");
        let fzf = script(&tools, "fzf", "cat");
        let replayed = ExternalBackend::new("rg", fzf, Duration::from_secs(10));
        assert_eq!(locate(root, &replayed, &query), native);
    }

    if let Some(external) = installed() {
        assert_eq!(locate(root, &external, &query), native);
    }
}
