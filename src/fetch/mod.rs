// src/fetch/mod.rs
//! Source listing collaborators. The pipeline only needs two calls from a
//! backing store: list the files, then fetch one file's bytes.

use anyhow::{anyhow, Result};

/// One discovered file, as reported by a [`SourceLister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Opaque handle passed back to [`SourceLister::get_bytes`].
    pub id: String,
    /// Display name; drives category tagging and the district fallbacks.
    pub name: String,
}

/// A fetched file. Consumed once by the orchestrator.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawSource {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

pub trait SourceLister {
    /// Enumerate every file in the backing store. A failure here is fatal
    /// for the run.
    fn list_files(&self) -> Result<Vec<SourceEntry>>;

    fn get_bytes(&self, id: &str) -> Result<Vec<u8>>;

    /// Short label for logs.
    fn describe(&self) -> String {
        "source".to_string()
    }
}

/// In-memory `(name, bytes)` pairs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<RawSource>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.push(RawSource::new(name, bytes));
        self
    }
}

impl SourceLister for MemorySource {
    fn list_files(&self) -> Result<Vec<SourceEntry>> {
        Ok(self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| SourceEntry {
                id: i.to_string(),
                name: f.filename.clone(),
            })
            .collect())
    }

    fn get_bytes(&self, id: &str) -> Result<Vec<u8>> {
        id.parse::<usize>()
            .ok()
            .and_then(|i| self.files.get(i))
            .map(|f| f.bytes.clone())
            .ok_or_else(|| anyhow!("no in-memory file with id `{}`", id))
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.files.len())
    }
}

/// Files under a local directory.
pub mod local {
    use super::*;
    use anyhow::{bail, Context};
    use glob::glob;
    use std::{fs, path::PathBuf};

    pub struct LocalDirSource {
        root: PathBuf,
        pattern: String,
    }

    impl LocalDirSource {
        /// `pattern` is a glob relative to `root`, e.g. `"**/*.csv"`.
        pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
            Self {
                root: root.into(),
                pattern: pattern.into(),
            }
        }
    }

    impl SourceLister for LocalDirSource {
        fn list_files(&self) -> Result<Vec<SourceEntry>> {
            if !self.root.is_dir() {
                bail!("source directory does not exist: {}", self.root.display());
            }
            let pattern = format!("{}/{}", self.root.display(), self.pattern);
            let mut out = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("bad glob `{}`", pattern))? {
                let path = entry.with_context(|| format!("walking {}", self.root.display()))?;
                if !path.is_file() {
                    continue;
                }
                let name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                out.push(SourceEntry {
                    id: path.to_string_lossy().to_string(),
                    name,
                });
            }
            // deterministic order
            out.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(out)
        }

        fn get_bytes(&self, id: &str) -> Result<Vec<u8>> {
            fs::read(id).with_context(|| format!("reading {}", id))
        }

        fn describe(&self) -> String {
            format!("dir {}", self.root.display())
        }
    }
}

/// Spreadsheet exports bundled inside a ZIP archive.
pub mod zips {
    use super::*;
    use anyhow::Context;
    use crate::process::is_supported_name;
    use std::{fs::File, io::Read, path::PathBuf};
    use zip::ZipArchive;

    pub struct ZipSource {
        path: PathBuf,
    }

    impl ZipSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        fn open(&self) -> Result<ZipArchive<File>> {
            let file = File::open(&self.path)
                .with_context(|| format!("Failed to open ZIP file: {:?}", self.path))?;
            ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {:?}", self.path))
        }
    }

    impl SourceLister for ZipSource {
        fn list_files(&self) -> Result<Vec<SourceEntry>> {
            let mut archive = self.open()?;
            let mut out = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let entry = archive
                    .by_index(i)
                    .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, self.path))?;
                if !entry.is_file() || !is_supported_name(entry.name()) {
                    continue;
                }
                let id = entry.name().to_string();
                let name = id.rsplit('/').next().unwrap_or(&id).to_string();
                out.push(SourceEntry { id, name });
            }
            Ok(out)
        }

        fn get_bytes(&self, id: &str) -> Result<Vec<u8>> {
            let mut archive = self.open()?;
            let mut entry = archive
                .by_name(id)
                .with_context(|| format!("no entry `{}` in {:?}", id, self.path))?;
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read {} into memory", id))?;
            Ok(buf)
        }

        fn describe(&self) -> String {
            format!("zip {}", self.path.display())
        }
    }
}

/// Exports linked from an HTML index page (shared drive listing, static
/// file server, ...).
pub mod http {
    use super::*;
    use anyhow::Context;
    use percent_encoding::percent_decode_str;
    use reqwest::blocking::Client;
    use scraper::{Html, Selector};
    use url::Url;

    pub struct HttpIndexSource {
        client: Client,
        index: Url,
        extensions: Vec<String>,
    }

    impl HttpIndexSource {
        pub fn new(index_url: &str) -> Result<Self> {
            let index = Url::parse(index_url).with_context(|| format!("bad index URL `{}`", index_url))?;
            Ok(Self {
                client: Client::new(),
                index,
                extensions: vec![".csv".into(), ".tsv".into(), ".txt".into()],
            })
        }

        /// Extract absolute links to spreadsheet exports from an index page.
        pub fn extract_links(&self, html: &str) -> Vec<SourceEntry> {
            let selector = Selector::parse("a[href]").expect("CSS selector for links should be valid");
            let doc = Html::parse_document(html);
            let mut out: Vec<SourceEntry> = doc
                .select(&selector)
                .filter_map(|e| e.value().attr("href"))
                .filter_map(|href| self.index.join(href).ok())
                .filter(|u| {
                    let path = u.path().to_lowercase();
                    self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
                })
                .map(|u| {
                    let segment = u
                        .path_segments()
                        .and_then(|mut s| s.next_back())
                        .unwrap_or_default();
                    SourceEntry {
                        name: percent_decode_str(segment).decode_utf8_lossy().into_owned(),
                        id: u.to_string(),
                    }
                })
                .collect();
            out.dedup_by(|a, b| a.id == b.id);
            out
        }
    }

    impl SourceLister for HttpIndexSource {
        fn list_files(&self) -> Result<Vec<SourceEntry>> {
            let html = self
                .client
                .get(self.index.clone())
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.text())
                .with_context(|| format!("listing {}", self.index))?;
            Ok(self.extract_links(&html))
        }

        fn get_bytes(&self, id: &str) -> Result<Vec<u8>> {
            let bytes = self
                .client
                .get(id)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.bytes())
                .with_context(|| format!("downloading {}", id))?;
            Ok(bytes.to_vec())
        }

        fn describe(&self) -> String {
            format!("index {}", self.index)
        }
    }

}
