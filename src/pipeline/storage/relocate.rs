//! Destination planning and the filesystem move.
//!
//! The model proposes a directory and a file name; both are untrusted.
//! Planning confines the directory to the organised root, keeps the source
//! extension and never overwrites an existing file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::types::FileMover;
use crate::models::Classification;

/// Characters that are invalid in a file or directory name on some platform.
static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A trailing extension such as `.pdf`, `.jpeg` or `.mp4`. Must start with
/// a letter so numeric name parts like `2023.03` survive.
static TRAILING_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[A-Za-z][A-Za-z0-9]{0,4}$").unwrap());

static DRIVE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]:$").unwrap());

/// Give up numbering collisions after this many candidates.
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Planned location of a relocated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Destination {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

fn clean_segment(raw: &str) -> String {
    let replaced = INVALID_NAME_CHARS.replace_all(raw, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, " ");
    collapsed.trim().trim_end_matches('.').trim().to_string()
}

/// Relative directory from a model-proposed path.
///
/// Absolute prefixes, drive letters, `.`/`..` and empty segments are
/// dropped. Falls back to `fallback` (the category) when nothing is left.
pub fn sanitize_directory(raw: &str, fallback: &str) -> PathBuf {
    let mut relative = PathBuf::new();
    for segment in raw.split(['/', '\\']) {
        let segment = segment.trim();
        if segment.is_empty() || segment == "." || segment == ".." || DRIVE_PREFIX.is_match(segment) {
            continue;
        }
        let cleaned = clean_segment(segment);
        if !cleaned.is_empty() {
            relative.push(cleaned);
        }
    }

    if relative.as_os_str().is_empty() {
        let cleaned = clean_segment(fallback);
        if !cleaned.is_empty() {
            relative.push(cleaned);
        }
    }
    relative
}

/// File stem from a model-proposed name: no extension, no separators.
pub fn sanitize_file_stem(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let without_ext = TRAILING_EXTENSION.replace(base, "");
    clean_segment(&without_ext)
}

/// Lower-cased extension of `source`, with the leading dot.
fn source_extension(source: &Path) -> String {
    source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Compute where `source` goes under `organised_root`.
///
/// An existing file at the destination gets ` (2)`, ` (3)`, ... appended
/// to the stem, unless that file is `source` itself.
pub fn plan_destination(
    organised_root: &Path,
    classification: &Classification,
    source: &Path,
) -> Result<Destination, String> {
    let relative = sanitize_directory(&classification.target_directory, &classification.category);
    let dir = organised_root.join(relative);

    let mut stem = sanitize_file_stem(&classification.target_filename);
    if stem.is_empty() {
        stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .map(clean_segment)
            .unwrap_or_default();
    }
    if stem.is_empty() {
        return Err(format!("no usable file name for {}", source.display()));
    }
    let extension = source_extension(source);

    for n in 1..=MAX_COLLISION_SUFFIX {
        let file_name = if n == 1 {
            format!("{stem}{extension}")
        } else {
            format!("{stem} ({n}){extension}")
        };
        let candidate = dir.join(&file_name);
        if !candidate.exists() || candidate == source {
            return Ok(Destination { dir, file_name });
        }
    }
    Err(format!(
        "more than {MAX_COLLISION_SUFFIX} files named {stem}{extension} in {}",
        dir.display()
    ))
}

/// Real filesystem mover.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMover;

impl FileMover for FsMover {
    fn move_file(&self, source: &Path, dest_dir: &Path, dest_name: &str) -> io::Result<bool> {
        let created = !dest_dir.is_dir();
        if created {
            std::fs::create_dir_all(dest_dir)?;
            tracing::info!(dir = %dest_dir.display(), "Created destination directory");
        }

        let destination = dest_dir.join(dest_name);
        if destination == source {
            return Ok(created);
        }
        if destination.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            ));
        }

        if let Err(rename_err) = std::fs::rename(source, &destination) {
            // rename fails across filesystems; copy then remove instead.
            tracing::debug!(error = %rename_err, "rename failed, copying instead");
            std::fs::copy(source, &destination).map_err(|_| rename_err)?;
            std::fs::remove_file(source)?;
        }

        tracing::info!(
            from = %source.display(),
            to = %destination.display(),
            created_new_directories = created,
            "File relocated"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn classification(dir: &str, name: &str, category: &str) -> Classification {
        Classification {
            title: "t".into(),
            summary: "s".into(),
            category: category.into(),
            tags: vec![],
            target_directory: dir.into(),
            target_filename: name.into(),
            timestamp: None,
        }
    }

    #[test]
    fn directory_is_confined() {
        assert_eq!(
            sanitize_directory("/etc/../Acme//Invoices/./2023", "X"),
            PathBuf::from("etc/Acme/Invoices/2023")
        );
        assert_eq!(
            sanitize_directory("C:\\Users\\..\\Taxes", "X"),
            PathBuf::from("Users/Taxes")
        );
    }

    #[test]
    fn empty_directory_falls_back_to_category() {
        assert_eq!(sanitize_directory("  /../ ", "Invoices"), PathBuf::from("Invoices"));
        assert_eq!(sanitize_directory("", ""), PathBuf::new());
    }

    #[test]
    fn invalid_characters_replaced() {
        assert_eq!(
            sanitize_directory("Acme: Ltd?/Bills*", "X"),
            PathBuf::from("Acme Ltd/Bills")
        );
    }

    #[test]
    fn stem_loses_extension_and_separators() {
        assert_eq!(sanitize_file_stem("Invoice 2023-114.pdf"), "Invoice 2023-114");
        assert_eq!(sanitize_file_stem("a/b/Letter.JPEG"), "Letter");
        assert_eq!(sanitize_file_stem("Contract v2.1 signed"), "Contract v2.1 signed");
        assert_eq!(sanitize_file_stem("  "), "");
    }

    #[test]
    fn numeric_suffix_is_not_an_extension() {
        assert_eq!(sanitize_file_stem("Statement 2023.03"), "Statement 2023.03");
        assert_eq!(sanitize_file_stem("Release 1.2.10"), "Release 1.2.10");
        assert_eq!(sanitize_file_stem("Statement 2023.03.pdf"), "Statement 2023.03");
    }

    #[test]
    fn plan_keeps_numeric_name_parts() {
        let root = tempfile::tempdir().unwrap();
        let dest = plan_destination(
            root.path(),
            &classification("Bank", "Statement 2023.03", "Bank"),
            Path::new("/in/scan.pdf"),
        )
        .unwrap();
        assert_eq!(dest.file_name, "Statement 2023.03.pdf");
    }

    #[test]
    fn plan_appends_source_extension() {
        let root = tempfile::tempdir().unwrap();
        let dest = plan_destination(
            root.path(),
            &classification("Personal/Invoices", "Invoice Acme.txt", "Invoices"),
            Path::new("/in/scan.PDF"),
        )
        .unwrap();
        assert_eq!(dest.dir, root.path().join("Personal/Invoices"));
        assert_eq!(dest.file_name, "Invoice Acme.pdf");
    }

    #[test]
    fn plan_falls_back_to_source_stem() {
        let root = tempfile::tempdir().unwrap();
        let dest = plan_destination(
            root.path(),
            &classification("", ".pdf", "Invoices"),
            Path::new("/in/invoice_2023.pdf"),
        )
        .unwrap();
        assert_eq!(dest.path(), root.path().join("Invoices/invoice_2023.pdf"));
    }

    #[test]
    fn plan_numbers_collisions() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Bills");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Power.pdf"), b"1").unwrap();
        fs::write(dir.join("Power (2).pdf"), b"2").unwrap();

        let dest = plan_destination(
            root.path(),
            &classification("Bills", "Power", "Bills"),
            Path::new("/in/x.pdf"),
        )
        .unwrap();
        assert_eq!(dest.file_name, "Power (3).pdf");
    }

    #[test]
    fn move_reports_new_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in.pdf");
        fs::write(&source, b"pdf").unwrap();
        let dest_dir = tmp.path().join("out/Acme/Invoices");

        let created = FsMover.move_file(&source, &dest_dir, "Invoice.pdf").unwrap();
        assert!(created);
        assert!(!source.exists());
        assert_eq!(fs::read(dest_dir.join("Invoice.pdf")).unwrap(), b"pdf");

        let second = tmp.path().join("in2.pdf");
        fs::write(&second, b"pdf2").unwrap();
        let created = FsMover.move_file(&second, &dest_dir, "Invoice (2).pdf").unwrap();
        assert!(!created);
    }

    #[test]
    fn move_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in.pdf");
        fs::write(&source, b"new").unwrap();
        fs::write(tmp.path().join("taken.pdf"), b"old").unwrap();

        let err = FsMover.move_file(&source, tmp.path(), "taken.pdf").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(source.exists());
        assert_eq!(fs::read(tmp.path().join("taken.pdf")).unwrap(), b"old");
    }

    #[test]
    fn missing_source_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = FsMover.move_file(&tmp.path().join("gone.pdf"), tmp.path(), "x.pdf");
        assert!(result.is_err());
    }
}
