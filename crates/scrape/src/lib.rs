//! Crawling of the college website: faculty listings, the circulars table
//! and circular PDFs.

mod circulars;
mod download;
mod faculty;
mod marker;
mod schedule;

use std::time::Duration;

use anyhow::{Context, Result};
use novacite_core::normalize_text;
use reqwest::Client;
use scraper::ElementRef;

pub use circulars::{
    parse_circulars_table, parse_choice, CircularMenu, CircularSelector, CircularsDesk,
    ListOnlySelector, RefreshOutcome, Selection, NO_MATCHES_REPLY,
};
pub use download::{download_pdf, pdf_file_name};
pub use faculty::{department_label, parse_faculty_cards, FacultyLoader, FacultyScraper};
pub use marker::MarkerFile;
pub use schedule::{next_run_after, run_daily};

pub(crate) const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared crawler client. Per-request timeouts are applied by the callers.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("novacite/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(6))
        .build()
        .context("failed to build crawler HTTP client")
}

pub(crate) async fn fetch_html(http: &Client, url: &str, timeout: Duration) -> Result<String> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned an error status"))?;

    response
        .text()
        .await
        .with_context(|| format!("failed reading body of {url}"))
}

/// Text nodes of an element, each trimmed, joined by single spaces.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(" "))
}
