//! Reads a directory of text files into [`Document`]s.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::error::RagError;
use crate::frontmatter;
use crate::models::{Document, Metadata, MetadataValue};

const BOM: char = '\u{feff}';

/// Why a file was left out of the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read.
    Unreadable(String),
    /// The content is not UTF-8 text.
    NotText,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(cause) => write!(f, "unreadable: {cause}"),
            Self::NotText => f.write_str("not valid UTF-8 text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Sorted by document id.
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Walks a source directory, honouring `.gitignore` and the configured filters.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    extensions: Vec<String>,
    exclude_patterns: Vec<String>,
    exclude: Option<GlobSet>,
    include_hidden: bool,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self, globset::Error> {
        let exclude = if config.exclude.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &config.exclude {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };

        Ok(Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: config.exclude.clone(),
            exclude,
            include_hidden: config.include_hidden,
        })
    }

    /// The filters in effect, with extensions normalised.
    pub fn settings(&self) -> LoaderConfig {
        LoaderConfig {
            extensions: self.extensions.clone(),
            exclude: self.exclude_patterns.clone(),
            include_hidden: self.include_hidden,
        }
    }

    /// Load every discoverable file under `dir`.
    ///
    /// A missing or unreadable `dir` is fatal; individual files that cannot
    /// be read or decoded are skipped, logged and listed in the report.
    pub fn load_directory(&self, dir: &Path) -> Result<LoadReport, RagError> {
        let meta = fs::metadata(dir).map_err(|e| RagError::io(dir, e))?;
        if !meta.is_dir() {
            return Err(RagError::io(
                dir,
                io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        // Surface permission problems on the root itself.
        fs::read_dir(dir).map_err(|e| RagError::io(dir, e))?;

        let mut report = LoadReport::default();
        let walker = WalkBuilder::new(dir).hidden(!self.include_hidden).build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(dir).unwrap_or(path);
            if !self.accepts(relative) {
                debug!("Filtered out {}", relative.display());
                continue;
            }

            match read_document(path, relative) {
                Ok(document) => report.documents.push(document),
                Err(reason) => {
                    warn!("Skipping {}: {reason}", path.display());
                    report.skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }

        report.documents.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            "Loaded {} documents from {} ({} skipped)",
            report.documents.len(),
            dir.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn accepts(&self, relative: &Path) -> bool {
        if !self.extensions.is_empty() {
            let ext = extension_of(relative);
            if !self.extensions.iter().any(|allowed| *allowed == ext) {
                return false;
            }
        }
        match &self.exclude {
            Some(set) => !set.is_match(relative),
            None => true,
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// Forward slashes keep ids stable across platforms.
fn document_id(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

fn read_document(path: &Path, relative: &Path) -> Result<Document, SkipReason> {
    let bytes = fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    if bytes.contains(&0) {
        return Err(SkipReason::NotText);
    }
    let text = String::from_utf8(bytes).map_err(|_| SkipReason::NotText)?;
    let text = if text.starts_with(BOM) {
        text[BOM.len_utf8()..].to_string()
    } else {
        text
    };

    let extension = extension_of(relative);
    let mut metadata = Metadata::new();

    let raw_text = if matches!(extension.as_str(), "md" | "markdown") {
        match frontmatter::parse(&text) {
            Ok((Some(front), body)) => {
                metadata.extend(front);
                body
            }
            Ok((None, body)) => body,
            Err(e) => {
                warn!("Ignoring frontmatter in {}: {e}", path.display());
                text
            }
        }
    } else {
        text
    };

    let file_meta = fs::metadata(path).ok();
    if let Some(name) = relative.file_name().and_then(|n| n.to_str()) {
        metadata.insert("file_name".into(), name.into());
    }
    if !extension.is_empty() {
        metadata.insert("extension".into(), extension.into());
    }
    if let Some(file_meta) = &file_meta {
        metadata.insert(
            "size_bytes".into(),
            MetadataValue::Integer(i64::try_from(file_meta.len()).unwrap_or(i64::MAX)),
        );
        if let Ok(modified) = file_meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            metadata.insert("modified_at".into(), modified.to_rfc3339().into());
        }
    }

    Ok(Document {
        id: document_id(relative),
        raw_text,
        source_path: path.to_path_buf(),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_text_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.txt"), "second file").unwrap();
        fs::write(temp.path().join("a.md"), "# first\n\nbody").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/c.txt"), "third").unwrap();

        let report = Loader::new().load_directory(temp.path()).unwrap();
        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt", "nested/c.txt"]);
        assert!(report.skipped.is_empty());

        let doc = &report.documents[1];
        assert_eq!(doc.raw_text, "second file");
        assert_eq!(doc.metadata["file_name"], MetadataValue::Text("b.txt".into()));
        assert_eq!(doc.metadata["extension"], MetadataValue::Text("txt".into()));
        assert_eq!(doc.metadata["size_bytes"], MetadataValue::Integer(11));
        assert!(doc.metadata.contains_key("modified_at"));
    }

    #[test]
    fn test_binary_file_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("ok.txt"), "fine").unwrap();
        fs::write(temp.path().join("image.png"), [0x89u8, 0x50, 0x4e, 0x47, 0x00, 0x1a]).unwrap();
        fs::write(temp.path().join("latin1.txt"), [0x63u8, 0x61, 0x66, 0xe9]).unwrap();

        let report = Loader::new().load_directory(temp.path()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().all(|s| s.reason == SkipReason::NotText));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp = tempdir().unwrap();
        let err = Loader::new()
            .load_directory(&temp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, RagError::Io { .. }));
    }

    #[test]
    fn test_file_instead_of_directory() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            Loader::new().load_directory(&file),
            Err(RagError::Io { .. })
        ));
    }

    #[test]
    fn test_hidden_files_skipped_by_default() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(".env"), "OPENAI_API_KEY=secret").unwrap();
        fs::write(temp.path().join("notes.txt"), "notes").unwrap();

        let report = Loader::new().load_directory(temp.path()).unwrap();
        assert_eq!(report.documents.len(), 1);

        let config = LoaderConfig {
            include_hidden: true,
            ..Default::default()
        };
        let report = Loader::from_config(&config)
            .unwrap()
            .load_directory(temp.path())
            .unwrap();
        assert_eq!(report.documents.len(), 2);
    }

    #[test]
    fn test_extension_and_exclude_filters() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("keep.md"), "keep").unwrap();
        fs::write(temp.path().join("drop.txt"), "drop").unwrap();
        fs::create_dir(temp.path().join("drafts")).unwrap();
        fs::write(temp.path().join("drafts/wip.md"), "wip").unwrap();

        let config = LoaderConfig {
            extensions: vec![".MD".to_string()],
            exclude: vec!["drafts/**".to_string()],
            include_hidden: false,
        };
        let report = Loader::from_config(&config)
            .unwrap()
            .load_directory(temp.path())
            .unwrap();
        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["keep.md"]);
    }

    #[test]
    fn test_settings_are_normalised() {
        let config = LoaderConfig {
            extensions: vec![".MD".to_string(), "txt".to_string()],
            exclude: vec!["drafts/**".to_string()],
            include_hidden: true,
        };
        let settings = Loader::from_config(&config).unwrap().settings();
        assert_eq!(settings.extensions, vec!["md", "txt"]);
        assert_eq!(settings.exclude, config.exclude);
        assert!(settings.include_hidden);
        assert_eq!(Loader::new().settings(), LoaderConfig::default());
    }

    #[test]
    fn test_invalid_exclude_glob() {
        let config = LoaderConfig {
            exclude: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(Loader::from_config(&config).is_err());
    }

    #[test]
    fn test_markdown_frontmatter_becomes_metadata() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("essay.md"),
            "---\nauthor: Paul\nyear: 2005\n---\nI studied philosophy.",
        )
        .unwrap();

        let report = Loader::new().load_directory(temp.path()).unwrap();
        let doc = &report.documents[0];
        assert_eq!(doc.raw_text, "I studied philosophy.");
        assert_eq!(doc.metadata["author"], MetadataValue::Text("Paul".into()));
        assert_eq!(doc.metadata["year"], MetadataValue::Integer(2005));
    }

    #[test]
    fn test_bom_stripped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bom.txt"), "\u{feff}hello").unwrap();
        let report = Loader::new().load_directory(temp.path()).unwrap();
        assert_eq!(report.documents[0].raw_text, "hello");
    }
}
