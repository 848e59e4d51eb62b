//! Document loading.
//!
//! Resolves load locations to concrete files, extracts their text through the
//! registered [`FormatExtractor`]s and attaches file metadata.

use crate::parser::default_extractors;
use crate::types::Metadata;
use chrono::{DateTime, Utc};
use docsage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

pub use crate::parser::FormatExtractor;
pub use crate::types::{DocumentUnit, MetadataValue};

/// Where to read source documents from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadLocation {
    File(PathBuf),
    Files(Vec<PathBuf>),
    Directory {
        path: PathBuf,
        recursive: bool,
        /// Allow-list of extensions without the dot; empty means "any supported"
        extensions: Vec<String>,
    },
}

impl LoadLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Files(paths.into_iter().map(Into::into).collect())
    }

    pub fn directory(path: impl Into<PathBuf>, recursive: bool, extensions: &[&str]) -> Self {
        Self::Directory {
            path: path.into(),
            recursive,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Path reported in errors for this location.
    fn display_path(&self) -> PathBuf {
        match self {
            Self::File(path) | Self::Directory { path, .. } => path.clone(),
            Self::Files(paths) => paths.first().cloned().unwrap_or_default(),
        }
    }
}

/// One document per file, or one per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    PerFile,
    PerPage,
}

/// A file selected for ingestion, with the signature used for fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl SourceFile {
    fn stat(path: &Path) -> AppResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| AppError::load(path, e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Deterministic hash over the (path, size, mtime) of a set of files.
///
/// Order-independent: files are sorted by path before hashing.
pub fn fingerprint(files: &[SourceFile]) -> String {
    let mut sorted: Vec<&SourceFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for file in sorted {
        let nanos = file
            .modified
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        hasher.update(file.path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(file.size.to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Source of documents for an index build.
///
/// `discover` only touches file metadata; `load` reads and extracts content.
pub trait DocumentSource: Send + Sync {
    fn discover(&self, locations: &[LoadLocation]) -> AppResult<Vec<SourceFile>>;

    fn load(&self, locations: &[LoadLocation]) -> AppResult<Vec<DocumentUnit>>;
}

/// Extra metadata attached to every document from a file.
pub type MetadataFn = Arc<dyn Fn(&Path) -> Metadata + Send + Sync>;

/// Filesystem loader with extension-keyed extractors.
#[derive(Clone)]
pub struct DocumentLoader {
    extractors: HashMap<String, Arc<dyn FormatExtractor>>,
    granularity: Granularity,
    metadata_fn: Option<MetadataFn>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader {
    /// Loader with the built-in extractors, one document per file.
    pub fn new() -> Self {
        let mut loader = Self {
            extractors: HashMap::new(),
            granularity: Granularity::PerFile,
            metadata_fn: None,
        };
        for extractor in default_extractors() {
            loader = loader.with_extractor(extractor);
        }
        loader
    }

    /// Register an extractor, replacing any existing one for the same extensions.
    pub fn with_extractor(mut self, extractor: Arc<dyn FormatExtractor>) -> Self {
        for ext in extractor.extensions() {
            self.extractors.insert(ext.to_string(), Arc::clone(&extractor));
        }
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_metadata_fn(mut self, metadata_fn: MetadataFn) -> Self {
        self.metadata_fn = Some(metadata_fn);
        self
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extractors
            .contains_key(&extension.trim_start_matches('.').to_ascii_lowercase())
    }

    fn discover_location(&self, location: &LoadLocation, out: &mut Vec<SourceFile>) -> AppResult<()> {
        match location {
            LoadLocation::File(path) => out.push(self.explicit_file(path)?),
            LoadLocation::Files(paths) => {
                for path in paths {
                    out.push(self.explicit_file(path)?);
                }
            }
            LoadLocation::Directory {
                path,
                recursive,
                extensions,
            } => self.walk_directory(path, *recursive, extensions, out)?,
        }
        Ok(())
    }

    fn explicit_file(&self, path: &Path) -> AppResult<SourceFile> {
        if !path.exists() {
            return Err(AppError::load(path, "path does not exist"));
        }
        if !path.is_file() {
            return Err(AppError::load(path, "not a regular file"));
        }
        SourceFile::stat(path)
    }

    fn walk_directory(
        &self,
        root: &Path,
        recursive: bool,
        extensions: &[String],
        out: &mut Vec<SourceFile>,
    ) -> AppResult<()> {
        if !root.exists() {
            return Err(AppError::load(root, "path does not exist"));
        }
        if !root.is_dir() {
            return Err(AppError::load(root, "not a directory"));
        }

        let allow: HashSet<String> = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        let walker = WalkDir::new(root)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| AppError::load(root, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file = SourceFile::stat(entry.path())?;
            let ext = file.extension().unwrap_or_default();
            let selected = if allow.is_empty() {
                self.supports(&ext)
            } else {
                allow.contains(&ext)
            };

            if selected {
                out.push(file);
            } else {
                tracing::trace!(path = %entry.path().display(), "Skipping file");
            }
        }
        Ok(())
    }

    fn file_metadata(&self, file: &SourceFile, extractor: &dyn FormatExtractor) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "file_path".to_string(),
            file.path.to_string_lossy().into_owned().into(),
        );
        if let Some(name) = file.path.file_name() {
            metadata.insert(
                "file_name".to_string(),
                name.to_string_lossy().into_owned().into(),
            );
        }
        metadata.insert(
            "file_type".to_string(),
            mime_type(file.extension().as_deref(), extractor.name()).into(),
        );
        metadata.insert("file_size".to_string(), MetadataValue::from(file.size));
        if let Some(modified) = file.modified {
            let date: DateTime<Utc> = modified.into();
            metadata.insert(
                "last_modified_date".to_string(),
                date.format("%Y-%m-%d").to_string().into(),
            );
        }

        if let Some(ref custom) = self.metadata_fn {
            metadata.extend(custom(&file.path));
        }
        metadata
    }

    fn load_file(&self, file: &SourceFile) -> AppResult<Vec<DocumentUnit>> {
        let ext = file.extension().unwrap_or_default();
        let extractor = self.extractors.get(&ext).ok_or_else(|| {
            AppError::load(
                &file.path,
                format!("no format handler registered for extension '{}'", ext),
            )
        })?;

        let pages = extractor.extract(&file.path)?;
        let metadata = self.file_metadata(file, extractor.as_ref());
        let base_id = file.path.to_string_lossy().into_owned();

        let documents = match self.granularity {
            Granularity::PerFile => {
                let text = pages.join("\n\n");
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![DocumentUnit::new(base_id, text, metadata)]
                }
            }
            Granularity::PerPage => pages
                .into_iter()
                .enumerate()
                .filter(|(_, page)| !page.trim().is_empty())
                .map(|(i, page)| {
                    let label = (i + 1).to_string();
                    let mut page_metadata = metadata.clone();
                    page_metadata.insert("page_label".to_string(), label.clone().into());
                    DocumentUnit::new(format!("{}#page={}", base_id, label), page, page_metadata)
                })
                .collect(),
        };

        if documents.is_empty() {
            tracing::warn!(path = %file.path.display(), "File has no text content");
        }
        Ok(documents)
    }
}

impl DocumentSource for DocumentLoader {
    fn discover(&self, locations: &[LoadLocation]) -> AppResult<Vec<SourceFile>> {
        let mut files = Vec::new();
        for location in locations {
            self.discover_location(location, &mut files)?;
        }

        let mut seen = HashSet::new();
        files.retain(|f| seen.insert(f.path.clone()));

        if files.is_empty() {
            let path = locations
                .first()
                .map(LoadLocation::display_path)
                .unwrap_or_default();
            return Err(AppError::load(path, "no matching files found"));
        }
        Ok(files)
    }

    fn load(&self, locations: &[LoadLocation]) -> AppResult<Vec<DocumentUnit>> {
        let files = self.discover(locations)?;
        tracing::debug!(files = files.len(), "Loading documents");

        let mut documents = Vec::new();
        for file in &files {
            documents.extend(self.load_file(file)?);
        }

        if documents.is_empty() {
            return Err(AppError::load(
                &files[0].path,
                "no text could be extracted from the matching files",
            ));
        }

        tracing::info!(
            files = files.len(),
            documents = documents.len(),
            "Loaded documents"
        );
        Ok(documents)
    }
}

fn mime_type(extension: Option<&str>, fallback: &str) -> String {
    let mime = match extension {
        Some("pdf") => "application/pdf",
        Some("md") | Some("markdown") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("txt") | Some("text") | Some("log") | Some("rst") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => return fallback.to_string(),
    };
    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("essay.txt"), "What I worked on before college.").unwrap();
        fs::write(dir.path().join("notes.md"), "# Notes\n\nRust ownership rules.").unwrap();
        fs::write(dir.path().join("image.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/report.txt"),
            "Page one text\u{0C}Page two text",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_single_file() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let docs = loader
            .load(&[LoadLocation::file(dir.path().join("essay.txt"))])
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text(), "What I worked on before college.");
        assert_eq!(docs[0].metadata()["file_name"], "essay.txt".into());
        assert_eq!(docs[0].metadata()["file_type"], "text/plain".into());
        assert!(docs[0].metadata().contains_key("last_modified_date"));
    }

    #[test]
    fn test_directory_non_recursive_skips_unsupported_and_hidden() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let files = loader
            .discover(&[LoadLocation::directory(dir.path(), false, &[])])
            .unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["essay.txt", "notes.md"]);
    }

    #[test]
    fn test_directory_recursive_with_extension_filter() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let docs = loader
            .load(&[LoadLocation::directory(dir.path(), true, &[".txt"])])
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.metadata()["file_type"] == "text/plain".into()));
    }

    #[test]
    fn test_per_page_granularity() {
        let dir = corpus();
        let loader = DocumentLoader::new().with_granularity(Granularity::PerPage);
        let docs = loader
            .load(&[LoadLocation::file(dir.path().join("nested/report.txt"))])
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].text(), "Page two text");
        assert_eq!(docs[1].metadata()["page_label"], "2".into());
        assert!(docs[1].id().ends_with("#page=2"));
    }

    #[test]
    fn test_custom_metadata_fn() {
        let dir = corpus();
        let loader = DocumentLoader::new().with_metadata_fn(Arc::new(|path: &Path| {
            let mut m = Metadata::new();
            m.insert(
                "source".to_string(),
                path.file_stem().unwrap().to_string_lossy().into_owned().into(),
            );
            m
        }));
        let docs = loader
            .load(&[LoadLocation::file(dir.path().join("essay.txt"))])
            .unwrap();
        assert_eq!(docs[0].metadata()["source"], "essay".into());
    }

    #[test]
    fn test_missing_path_is_load_error() {
        let loader = DocumentLoader::new();
        let err = loader
            .load(&[LoadLocation::file("/definitely/not/here.txt")])
            .unwrap_err();
        assert!(matches!(err, AppError::Load { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_no_matching_files_is_load_error() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let err = loader
            .load(&[LoadLocation::directory(dir.path(), true, &["pdf"])])
            .unwrap_err();
        assert!(err.to_string().contains("no matching files"));
    }

    #[test]
    fn test_unparseable_file_is_load_error() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let err = loader
            .load(&[LoadLocation::directory(dir.path(), false, &["png"])])
            .unwrap_err();
        assert!(err.to_string().contains("no format handler"));
    }

    #[test]
    fn test_fingerprint_is_order_independent_and_tracks_changes() {
        let dir = corpus();
        let loader = DocumentLoader::new();
        let a = dir.path().join("essay.txt");
        let b = dir.path().join("notes.md");

        let forward = loader.discover(&[LoadLocation::files([&a, &b])]).unwrap();
        let backward = loader.discover(&[LoadLocation::files([&b, &a])]).unwrap();
        assert_eq!(fingerprint(&forward), fingerprint(&backward));

        fs::write(&a, "What I worked on before and after college.").unwrap();
        let changed = loader.discover(&[LoadLocation::files([&a, &b])]).unwrap();
        assert_ne!(fingerprint(&forward), fingerprint(&changed));
    }
}
