//! Runtime configuration.
//!
//! Settings live in `bookvault.toml` inside the data directory. The data
//! directory itself is `~/.bookvault` unless `BOOKVAULT_HOME` points elsewhere.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LibraryError, LibraryResult};
use crate::services::scanner::{Scanner, DEFAULT_EXTENSIONS};

pub const HOME_ENV: &str = "BOOKVAULT_HOME";
pub const CONFIG_FILE: &str = "bookvault.toml";
const DATA_DIR_NAME: &str = ".bookvault";

/// ```toml
/// database_file = "bookvault.sqlite3"
/// supported_extensions = ["pdf"]
/// pdfium_library_dir = "/opt/pdfium/lib"
/// preview_width = 560
/// document_hit_limit = 200
/// log_filter = "info"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding the database and this file; never read from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,

    pub database_file: String,

    pub supported_extensions: Vec<String>,

    /// Directory containing the PDFium shared library (None = search defaults)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfium_library_dir: Option<PathBuf>,

    /// Target width in pixels for page previews
    pub preview_width: u32,

    /// Maximum rectangles returned by a single-document search
    pub document_hit_limit: usize,

    /// Default tracing filter, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            data_dir: PathBuf::from(DATA_DIR_NAME),
            database_file: "bookvault.sqlite3".to_string(),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            pdfium_library_dir: None,
            preview_width: 560,
            document_hit_limit: 200,
            log_filter: "info".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Load configuration from the default data directory.
    pub fn load() -> LibraryResult<Self> {
        Self::load_from(&Self::default_data_dir())
    }

    /// Load `bookvault.toml` from `data_dir`, falling back to defaults when it is absent.
    pub fn load_from(data_dir: &Path) -> LibraryResult<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            info!(path = %path.display(), "loading configuration");
            let contents = fs::read_to_string(&path)?;
            toml::from_str::<LibraryConfig>(&contents)
                .map_err(|e| LibraryError::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            LibraryConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> LibraryResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(CONFIG_FILE);
        info!(path = %path.display(), "saving configuration");
        let contents = toml::to_string_pretty(self)
            .map_err(|e| LibraryError::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(&self.supported_extensions)
    }

    pub fn default_data_dir() -> PathBuf {
        resolve_data_dir(
            std::env::var_os(HOME_ENV),
            BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
        )
    }
}

fn resolve_data_dir(override_dir: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    match home {
        Some(home) => home.join(DATA_DIR_NAME),
        None => PathBuf::from(DATA_DIR_NAME),
    }
}
