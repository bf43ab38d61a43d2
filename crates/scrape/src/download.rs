use std::path::{Path, PathBuf};

use novacite_core::truncate_graphemes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{info, warn};

use crate::DOWNLOAD_TIMEOUT;

const FILE_STEM_LIMIT: usize = 50;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid filename regex"));

/// `Exam Time-Table (UG)` becomes `Exam_TimeTable_UG.pdf`.
pub fn pdf_file_name(title: &str) -> String {
    let cleaned = NON_WORD.replace_all(title, "");
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = truncate_graphemes(&joined, FILE_STEM_LIMIT);
    if stem.is_empty() {
        "circular.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

/// Saves the PDF under `dir`, reusing an existing file of the same name.
/// Failures are logged and reported as `None`.
pub async fn download_pdf(http: &Client, dir: &Path, url: &str, title: &str) -> Option<PathBuf> {
    let path = dir.join(pdf_file_name(title));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(path = %path.display(), "circular already downloaded");
        return Some(path);
    }

    let response = match http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(url, error = %err, "circular download failed");
            return None;
        }
    };

    let is_pdf = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/pdf"));
    if !response.status().is_success() || !is_pdf {
        warn!(url, status = response.status().as_u16(), "circular link did not return a PDF");
        return None;
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(url, error = %err, "failed reading circular body");
            return None;
        }
    };

    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %err, "failed creating PDF directory");
        return None;
    }
    if let Err(err) = tokio::fs::write(&path, &bytes).await {
        warn!(path = %path.display(), error = %err, "failed writing circular PDF");
        return None;
    }

    info!(path = %path.display(), bytes = bytes.len(), "circular downloaded");
    Some(path)
}
