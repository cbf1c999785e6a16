use serde::{Deserialize, Serialize};

/// A supported document found on disk, not yet cataloged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: String,
    pub size_bytes: u64,
    pub format: String,
}
