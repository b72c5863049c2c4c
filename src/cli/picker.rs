//! Choosing a data file when `xplot` runs without `-f`.
//!
//! Workbooks and CSV files below the working directory are listed with their
//! kind and size; the user answers with a list number, a path, or `q`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::ingest::SUPPORTED_EXTENSIONS;

/// How many directory levels below the start directory are searched.
const SEARCH_DEPTH: usize = 4;

/// Directories never worth descending into.
const SKIPPED_DIRS: [&str; 2] = ["target", "node_modules"];

/// A file offered in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub bytes: u64,
}

impl Candidate {
    fn kind(&self) -> &'static str {
        match extension(&self.path).as_deref() {
            Some("csv") => "csv",
            _ => "workbook",
        }
    }

    fn label(&self) -> String {
        let shown = self.path.strip_prefix(".").unwrap_or(&self.path);
        format!("{} ({}, {})", shown.display(), self.kind(), human_size(self.bytes))
    }
}

/// List data files under the working directory and ask which one to load.
pub fn prompt_for_data_path() -> Result<PathBuf, AppError> {
    let candidates = find_candidates(Path::new("."), SEARCH_DEPTH);
    let stdin = io::stdin();
    choose(&candidates, stdin.lock(), io::stdout())
}

/// Run the selection dialogue over `input`/`output`.
pub fn choose(candidates: &[Candidate], mut input: impl BufRead, mut output: impl Write) -> Result<PathBuf, AppError> {
    if candidates.is_empty() {
        return Err(AppError::new(
            2,
            format!(
                "No data files (.{}) found here. Pass one with `xplot -f <file>`.",
                SUPPORTED_EXTENSIONS.join(", .")
            ),
        ));
    }

    let io_err = |e: io::Error| AppError::new(2, format!("Terminal I/O failed: {e}"));

    writeln!(output, "Data files:").map_err(io_err)?;
    for (n, candidate) in candidates.iter().enumerate() {
        writeln!(output, "{:>3}) {}", n + 1, candidate.label()).map_err(io_err)?;
    }

    loop {
        write!(output, "File number, path, or q: ").map_err(io_err)?;
        output.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(AppError::new(2, "No file chosen. Pass one with `xplot -f <file>`."));
        }

        let answer = line.trim();
        if answer.is_empty() {
            continue;
        }
        if answer.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        let picked = match answer.parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => validate_data_path(&candidates[n - 1].path),
            Ok(n) => Err(AppError::new(2, format!("No file numbered {n}."))),
            Err(_) => validate_data_path(Path::new(answer)),
        };
        match picked {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(output, "{err}").map_err(io_err)?,
        }
    }
}

/// Check that `path` is an existing file with a readable extension.
pub fn validate_data_path(path: &Path) -> Result<PathBuf, AppError> {
    let meta = fs::metadata(path).map_err(|_| AppError::new(2, format!("File not found: {}", path.display())))?;
    if !meta.is_file() {
        return Err(AppError::new(2, format!("Not a file: {}", path.display())));
    }
    if !is_data_file(path) {
        return Err(AppError::new(
            2,
            format!(
                "Cannot read {}: expected .{}",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", .")
            ),
        ));
    }
    Ok(path.to_path_buf())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Supported extension, and not an Excel owner/lock file (`~$book.xlsx`).
fn is_data_file(path: &Path) -> bool {
    let locked = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    !locked && extension(path).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

fn skip_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || SKIPPED_DIRS.contains(&n))
}

/// Data files at most `depth` directories below `root`, sorted by path.
fn find_candidates(root: &Path, depth: usize) -> Vec<Candidate> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0)];

    while let Some((dir, level)) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                if level < depth && !skip_dir(&path) {
                    pending.push((path, level + 1));
                }
            } else if meta.is_file() && is_data_file(&path) {
                found.push(Candidate {
                    path,
                    bytes: meta.len(),
                });
            }
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

fn human_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1 << 20 => format!("{:.1} MB", b as f64 / (1u64 << 20) as f64),
        b if b >= 1 << 10 => format!("{:.1} KB", b as f64 / (1u64 << 10) as f64),
        b => format!("{b} B"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative(root: &Path, found: &[Candidate]) -> Vec<String> {
        found
            .iter()
            .map(|c| c.path.strip_prefix(root).unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn lists_workbooks_and_csv_but_not_lock_files_or_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["nested", "target", ".cache"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        for name in ["b.xlsx", "a.CSV", "notes.txt", "~$b.xlsx", "nested/c.ods", "target/d.csv", ".cache/e.xls"] {
            fs::write(root.join(name), "").unwrap();
        }

        let found = find_candidates(root, SEARCH_DEPTH);
        assert_eq!(relative(root, &found), vec!["a.CSV", "b.xlsx", "nested/c.ods"]);
        assert_eq!(found[0].kind(), "csv");
        assert_eq!(found[1].kind(), "workbook");
    }

    #[test]
    fn depth_limits_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("one/two");
        fs::create_dir_all(&deep).unwrap();
        fs::write(dir.path().join("one/top.csv"), "").unwrap();
        fs::write(deep.join("deep.csv"), "").unwrap();

        assert_eq!(relative(dir.path(), &find_candidates(dir.path(), 1)), vec!["one/top.csv"]);
        assert_eq!(find_candidates(dir.path(), 2).len(), 2);
    }

    #[test]
    fn validation_rejects_directories_and_other_types() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "").unwrap();

        assert!(validate_data_path(dir.path()).is_err());
        assert!(validate_data_path(&txt).is_err());
        assert!(validate_data_path(&dir.path().join("missing.xlsx")).is_err());

        let csv = dir.path().join("ok.csv");
        fs::write(&csv, "CDATE\n").unwrap();
        assert_eq!(validate_data_path(&csv).unwrap(), csv);
    }

    #[test]
    fn dialogue_retries_until_a_valid_number() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("sales.csv");
        fs::write(&csv, "CDATE,SalesAmt\n20230101,1\n").unwrap();
        let candidates = find_candidates(dir.path(), 1);

        let mut shown = Vec::new();
        let picked = choose(&candidates, "\n7\nnope.txt\n1\n".as_bytes(), &mut shown).unwrap();
        assert_eq!(picked, csv);

        let shown = String::from_utf8(shown).unwrap();
        assert!(shown.contains("1) "), "{shown}");
        assert!(shown.contains("(csv, 26 B)"), "{shown}");
        assert!(shown.contains("No file numbered 7."), "{shown}");
        assert!(shown.contains("File not found: nope.txt"), "{shown}");
    }

    #[test]
    fn dialogue_ends_on_quit_or_eof() {
        let candidates = vec![Candidate {
            path: PathBuf::from("a.csv"),
            bytes: 2048,
        }];
        assert_eq!(candidates[0].label(), "a.csv (csv, 2.0 KB)");
        assert!(choose(&candidates, "q\n".as_bytes(), io::sink()).is_err());
        assert!(choose(&candidates, "".as_bytes(), io::sink()).is_err());
        assert_eq!(choose(&[], "1\n".as_bytes(), io::sink()).unwrap_err().exit_code(), 2);
    }
}
