//! Directory-tree snapshot of the organised root.
//!
//! Every structuring call is shown the directories that already exist, so
//! classification converges on the existing layout. The snapshot is owned by
//! the pipeline driver, passed by reference to the structurer and re-rendered
//! only after a move created new directories. `version` counts renders.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTreeSnapshot {
    root: Option<PathBuf>,
    rendered: String,
    version: u64,
}

impl DirectoryTreeSnapshot {
    /// Render `root` for the first time (version 1).
    pub fn capture(root: &Path) -> io::Result<Self> {
        Ok(Self {
            root: Some(root.to_path_buf()),
            rendered: render_tree(root)?,
            version: 1,
        })
    }

    /// A fixed snapshot not tied to any directory.
    pub fn from_rendered(rendered: &str) -> Self {
        Self {
            root: None,
            rendered: rendered.to_string(),
            version: 0,
        }
    }

    /// Re-render from disk and bump the version.
    pub fn refresh(&mut self) -> io::Result<()> {
        if let Some(root) = &self.root {
            self.rendered = render_tree(root)?;
            self.version += 1;
            tracing::debug!(
                root = %root.display(),
                version = self.version,
                "Directory tree snapshot regenerated"
            );
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Directory names under `root` as an indented tree, files omitted.
///
/// Siblings are sorted case-insensitively; entries starting with `.` are
/// skipped. A missing root renders as an empty string.
pub fn render_tree(root: &Path) -> io::Result<String> {
    if !root.is_dir() {
        return Ok(String::new());
    }
    let mut lines = Vec::new();
    render_level(root, "", &mut lines)?;
    Ok(lines.join("\n"))
}

fn render_level(dir: &Path, prefix: &str, lines: &mut Vec<String>) -> io::Result<()> {
    let mut children: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        children.push((name, entry.path()));
    }
    children.sort_by(|a, b| {
        a.0.to_lowercase()
            .cmp(&b.0.to_lowercase())
            .then_with(|| a.0.cmp(&b.0))
    });

    let count = children.len();
    for (i, (name, path)) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{name}"));
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_level(&path, &child_prefix, lines)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn renders_directories_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("personal/invoices")).unwrap();
        fs::create_dir_all(root.join("personal/Taxes")).unwrap();
        fs::create_dir_all(root.join("Acme")).unwrap();
        fs::write(root.join("personal/invoices/bill.pdf"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();

        let tree = render_tree(root).unwrap();
        let expected = "\
├── Acme
└── personal
    ├── invoices
    └── Taxes";
        assert_eq!(tree, expected);
    }

    #[test]
    fn nested_non_last_uses_bar() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/x")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();

        assert_eq!(render_tree(root).unwrap(), "├── a\n│   └── x\n└── b");
    }

    #[test]
    fn hidden_directories_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::create_dir_all(dir.path().join("Visible")).unwrap();
        assert_eq!(render_tree(dir.path()).unwrap(), "└── Visible");
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(render_tree(&dir.path().join("absent")).unwrap(), "");
    }

    #[test]
    fn refresh_sees_new_directory_and_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = DirectoryTreeSnapshot::capture(dir.path()).unwrap();
        assert_eq!(snapshot.as_str(), "");
        assert_eq!(snapshot.version(), 1);

        fs::create_dir_all(dir.path().join("Invoices")).unwrap();
        // Not visible until refreshed.
        assert!(!snapshot.as_str().contains("Invoices"));

        snapshot.refresh().unwrap();
        assert_eq!(snapshot.as_str(), "└── Invoices");
        assert_eq!(snapshot.version(), 2);
    }

    #[test]
    fn fixed_snapshot_never_changes() {
        let mut snapshot = DirectoryTreeSnapshot::from_rendered("└── A");
        snapshot.refresh().unwrap();
        assert_eq!(snapshot.as_str(), "└── A");
        assert_eq!(snapshot.version(), 0);
    }
}
