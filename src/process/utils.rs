use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve the source path into the list of CSV files to read.
///
/// - a file is returned as-is, whatever its extension
/// - a directory is searched recursively for `*.csv` (case-insensitive)
///
/// Files come back sorted by path so row order is stable between runs.
pub fn list_csv_files(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        bail!("source path `{}` does not exist", source.display());
    }

    let pattern = format!("{}/**/*", Pattern::escape(&source.display().to_string()));
    let mut files = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for source path")? {
        let path = entry.context("reading source directory entry")?;
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        bail!("no CSV files found under `{}`", source.display());
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn clean_str_strips_quotes_and_whitespace() {
        assert_eq!(clean_str("  \"abc\" "), "abc");
        assert_eq!(clean_str(" abc "), "abc");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn list_csv_files_recurses_and_sorts() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("2024/05"))?;
        fs::write(dir.path().join("b.csv"), "a\n")?;
        fs::write(dir.path().join("2024/05/a.CSV"), "a\n")?;
        fs::write(dir.path().join("notes.txt"), "ignored\n")?;

        let files = list_csv_files(dir.path())?;
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2024/05/a.CSV"));
        assert!(files[1].ends_with("b.csv"));
        Ok(())
    }

    #[test]
    fn list_csv_files_rejects_missing_or_empty_source() -> Result<()> {
        let dir = tempdir()?;
        assert!(list_csv_files(&dir.path().join("missing")).is_err());
        assert!(list_csv_files(dir.path()).is_err());
        Ok(())
    }
}
