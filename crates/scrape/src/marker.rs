use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct MarkerBody {
    first_desc: String,
}

/// Remembers the first circular description seen on the last refresh.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable markers read as `None`.
    pub async fn read(&self) -> Option<String> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<MarkerBody>(&raw) {
            Ok(body) => Some(body.first_desc),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring corrupt circulars marker"
                );
                None
            }
        }
    }

    pub async fn write(&self, first_desc: &str) {
        let body = MarkerBody {
            first_desc: first_desc.to_string(),
        };
        let json = match serde_json::to_string(&body) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed encoding circulars marker");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %err, "failed creating marker directory");
                return;
            }
        }
        if let Err(err) = tokio::fs::write(&self.path, json).await {
            warn!(path = %self.path.display(), error = %err, "failed writing circulars marker");
        }
    }
}
