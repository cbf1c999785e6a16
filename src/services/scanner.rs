use std::fs;
use std::path::Path;

use tracing::debug;

use crate::models::scan::ScannedFile;

pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf"];

/// Classifies filesystem entries by extension without opening them.
#[derive(Debug, Clone)]
pub struct Scanner {
    extensions: Vec<String>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl Scanner {
    /// Extensions are matched case-insensitively; a leading dot is ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn format_of(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.format_of(path).is_some()
    }

    /// Describes one file, or `None` if it is missing, not a regular file,
    /// unsupported, or its size cannot be read.
    pub fn scan_file(&self, path: impl AsRef<Path>) -> Option<ScannedFile> {
        let path = path.as_ref();
        let format = self.format_of(path)?;
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }

        Some(ScannedFile {
            path: path.to_string_lossy().to_string(),
            size_bytes: metadata.len(),
            format,
        })
    }

    /// Recursively collects every supported file under `folder`, in no particular order.
    pub fn scan_folder(&self, folder: impl AsRef<Path>) -> Vec<ScannedFile> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Vec::new();
        }

        walkdir::WalkDir::new(folder)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| self.scan_file(entry.path()))
            .collect()
    }
}
