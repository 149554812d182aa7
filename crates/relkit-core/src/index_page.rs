//! Browsable `index.html` pages for a repository tree.
//!
//! Every directory gets a page listing its subdirectories and then its
//! files, each group sorted by name. Existing `index.html` files are
//! regenerated, never listed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Page file name.
pub const INDEX_FILE: &str = "index.html";

/// Built-in page layout; `{title}` and `{entries}` are substituted.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h1>{title}</h1>
<ul>
{entries}
</ul>
</body>
</html>
"#;

/// Writes index pages using a template.
#[derive(Debug, Clone)]
pub struct IndexPageBuilder {
    template: String,
}

impl Default for IndexPageBuilder {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl IndexPageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom template with `{title}` and `{entries}` placeholders.
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load a custom template from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = fs::read_to_string(path)
            .with_context(|| format!("reading index template {}", path.display()))?;
        Ok(Self::with_template(template))
    }

    /// Write `index.html` into `root` and each directory below it.
    ///
    /// Page titles are `label` followed by the directory's path relative to
    /// `root`. Returns the pages written.
    pub fn build(&self, root: &Path, label: &str) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }

        let mut written = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let title = page_title(root, &dir, label);
            let page = self.render(&title, &dir, dir != root)?;
            let path = dir.join(INDEX_FILE);
            fs::write(&path, page).with_context(|| format!("writing {}", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }

    fn render(&self, title: &str, dir: &Path, with_parent: bool) -> Result<String> {
        let (subdirs, files) = list_dir(dir)?;

        let mut entries = Vec::with_capacity(subdirs.len() + files.len() + 1);
        if with_parent {
            entries.push(entry_line("../"));
        }
        entries.extend(subdirs.iter().map(|name| entry_line(&format!("{name}/"))));
        entries.extend(files.iter().map(|name| entry_line(name)));

        Ok(self
            .template
            .replace("{title}", &escape(title))
            .replace("{entries}", &entries.join("\n")))
    }
}

/// Subdirectory and file names of `dir`, each sorted, without `index.html`.
fn list_dir(dir: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    let read = fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    for entry in read {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let kind = entry
            .file_type()
            .with_context(|| format!("inspecting {}", entry.path().display()))?;
        if kind.is_dir() {
            subdirs.push(name);
        } else if name != INDEX_FILE {
            files.push(name);
        }
    }

    subdirs.sort();
    files.sort();
    Ok((subdirs, files))
}

fn page_title(root: &Path, dir: &Path, label: &str) -> String {
    let relative = dir
        .strip_prefix(root)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    if relative.is_empty() {
        label.to_string()
    } else {
        format!("{}/{relative}", label.trim_end_matches('/'))
    }
}

fn entry_line(name: &str) -> String {
    let name = escape(name);
    format!("<li><a href=\"{name}\">{name}</a></li>")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("x86_64/RPMS")).unwrap();
        fs::create_dir_all(root.join("x86_64/repodata")).unwrap();
        fs::write(root.join("x86_64/RPMS/b.rpm"), "").unwrap();
        fs::write(root.join("x86_64/RPMS/a.rpm"), "").unwrap();
        fs::write(root.join("x86_64/repodata/repomd.xml"), "").unwrap();
        dir
    }

    #[test]
    fn writes_a_page_per_directory() {
        let dir = tree();
        let pages = IndexPageBuilder::new().build(dir.path(), "bucket").unwrap();
        assert_eq!(pages.len(), 4);
        assert!(dir.path().join("x86_64/RPMS/index.html").exists());
    }

    #[test]
    fn directories_then_sorted_files_without_self() {
        let dir = tree();
        let builder = IndexPageBuilder::with_template("{title}|{entries}");
        builder.build(dir.path(), "bucket").unwrap();
        // Second run must not list the pages from the first.
        builder.build(dir.path(), "bucket").unwrap();

        let rpms = fs::read_to_string(dir.path().join("x86_64/RPMS/index.html")).unwrap();
        let (title, entries) = rpms.split_once('|').unwrap();
        assert_eq!(title, "bucket/x86_64/RPMS");
        let names: Vec<_> = entries.lines().collect();
        assert_eq!(
            names,
            vec![
                "<li><a href=\"../\">../</a></li>",
                "<li><a href=\"a.rpm\">a.rpm</a></li>",
                "<li><a href=\"b.rpm\">b.rpm</a></li>",
            ]
        );

        let arch = fs::read_to_string(dir.path().join("x86_64/index.html")).unwrap();
        let rpms_at = arch.find("RPMS/").unwrap();
        let repodata_at = arch.find("repodata/").unwrap();
        assert!(rpms_at < repodata_at);
        assert!(!arch.contains("index.html"));
    }

    #[test]
    fn root_title_is_the_label_and_names_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a&b.rpm"), "").unwrap();
        IndexPageBuilder::new().build(dir.path(), "repo <x>").unwrap();

        let page = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert!(page.contains("<title>repo &lt;x&gt;</title>"));
        assert!(page.contains("a&amp;b.rpm"));
        assert!(!page.contains("../"));
    }
}
