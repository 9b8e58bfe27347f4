use memchr::memchr_iter;
use memmap2::Mmap;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use crate::processor::ProcessorError;

/// Marker of the alternate-data-stream copies Windows leaves next to downloads.
const OS_METADATA_MARKER: &str = "Zone.Identifier";

/// Lists the `.csv` files directly under `dir`, sorted by name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, ProcessorError> {
    let entries = fs::read_dir(dir).map_err(|e| ProcessorError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProcessorError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ProcessorError::io(&path, e))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.contains(OS_METADATA_MARKER) {
            continue;
        }
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Calls `f(line_number, line)` for every data line of the file at `path`.
///
/// The header (line 1) is skipped, a trailing `\r` is removed and blank lines
/// are ignored. Line numbers are 1-based file line numbers. The first error
/// returned by `f` stops the scan.
pub fn for_each_record<F>(path: &Path, mut f: F) -> Result<(), ProcessorError>
where
    F: FnMut(u64, &[u8]) -> Result<(), ProcessorError>,
{
    let file = File::open(path).map_err(|e| ProcessorError::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| ProcessorError::io(path, e))?
        .len();
    if len == 0 {
        return Ok(());
    }

    // SAFETY: input files are treated as immutable for the duration of a run.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ProcessorError::io(path, e))?;
    let buf: &[u8] = &mmap[..];

    let mut line_no = 0u64;
    let mut start = 0;
    let mut visit = |line: &[u8], line_no: u64| -> Result<(), ProcessorError> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line_no == 1 || line.is_empty() {
            return Ok(());
        }
        f(line_no, line)
    };

    for newline in memchr_iter(b'\n', buf) {
        line_no += 1;
        visit(&buf[start..newline], line_no)?;
        start = newline + 1;
    }
    if start < buf.len() {
        line_no += 1;
        visit(&buf[start..], line_no)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_list_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in [
            "b.csv",
            "a.CSV",
            "notes.txt",
            "c.csv:Zone.Identifier",
            "d.Zone.Identifier.csv",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = list_input_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let err = list_input_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ProcessorError::Io { .. }));
    }

    #[test]
    fn test_records_skip_header_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.csv");
        let mut f = File::create(&path).unwrap();
        write!(f, "H1;H2\r\na;1\r\n\r\nb;2\nc;3").unwrap();
        drop(f);

        let mut seen = Vec::new();
        for_each_record(&path, |n, line| {
            seen.push((n, String::from_utf8_lossy(line).into_owned()));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (2, "a;1".to_string()),
                (4, "b;2".to_string()),
                (5, "c;3".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_file_has_no_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        File::create(&path).unwrap();
        let mut calls = 0;
        for_each_record(&path, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }
}
