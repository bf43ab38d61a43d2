use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use novacite_core::{CircularDesk, CircularMatch, CircularRecord, Settings};
use novacite_retrieval::{tokenize, EmbeddingModel, QueryFeatures};
use novacite_storage::{CircularRepository, Store};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

use crate::download::download_pdf;
use crate::marker::MarkerFile;
use crate::{element_text, fetch_html, PAGE_TIMEOUT};

pub const NO_MATCHES_REPLY: &str = "No matching circulars found.";
const SKIPPED_REPLY: &str = "Skipped download.";
const INVALID_REPLY: &str = "Invalid selection.";
const DOWNLOAD_FAILED_REPLY: &str = "Download failed.";

/// Rows of the first `table.table-hover`; `None` when the page has no such table.
///
/// Only rows with exactly three cells and a link in the last one are kept.
pub fn parse_circulars_table(html: &str, page_url: &Url) -> Option<Vec<CircularRecord>> {
    let parse = |css: &str| Selector::parse(css).expect("static css selector");
    let table_selector = parse("table.table-hover");
    let row_selector = parse("tbody tr");
    let cell_selector = parse("td");
    let link_selector = parse("a[href]");

    let document = Html::parse_document(html);
    let table = document.select(&table_selector).next()?;

    let rows = table
        .select(&row_selector)
        .filter_map(|row| {
            let cells = row.select(&cell_selector).collect::<Vec<_>>();
            if cells.len() != 3 {
                return None;
            }
            let href = cells[2]
                .select(&link_selector)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))?;
            let url = page_url.join(href.trim()).ok()?;
            Some(CircularRecord {
                description: element_text(cells[1]),
                url: url.to_string(),
                embedding: None,
            })
        })
        .collect();

    Some(rows)
}

/// Result of one refresh pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    FetchFailed,
    TableMissing,
    Empty,
    Unchanged,
    Reindexed(usize),
}

/// The user's answer to a [`CircularMenu`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Skip,
    /// Zero-based index into the menu options.
    Pick(usize),
    Invalid,
    /// No interactive user; reply with the menu itself.
    ListOnly,
}

#[derive(Debug, Clone)]
pub struct CircularMenu {
    pub query: String,
    pub options: Vec<CircularMatch>,
}

impl CircularMenu {
    pub fn render(&self) -> String {
        let mut out = format!("I found these circulars for \"{}\":\n", self.query);
        for (idx, option) in self.options.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", idx + 1, option.description);
        }
        out.push_str("Please pick a number (or type 'skip').");
        out
    }

    pub fn render_with_links(&self) -> String {
        let mut out = format!("I found these circulars for \"{}\":", self.query);
        for (idx, option) in self.options.iter().enumerate() {
            let _ = write!(out, "\n{}. {} - {}", idx + 1, option.description, option.url);
        }
        out
    }
}

/// `skip` skips, `1..=options` picks, anything else is invalid.
pub fn parse_choice(input: &str, options: usize) -> Selection {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("skip") {
        return Selection::Skip;
    }
    match trimmed.parse::<usize>() {
        Ok(choice) if (1..=options).contains(&choice) => Selection::Pick(choice - 1),
        _ => Selection::Invalid,
    }
}

/// Asks someone which circular to download.
#[async_trait]
pub trait CircularSelector: Send + Sync {
    async fn select(&self, menu: &CircularMenu) -> Selection;
}

/// Non-interactive selector: lists matches with their links.
pub struct ListOnlySelector;

#[async_trait]
impl CircularSelector for ListOnlySelector {
    async fn select(&self, _menu: &CircularMenu) -> Selection {
        Selection::ListOnly
    }
}

/// Scrapes, indexes, searches and downloads college circulars.
pub struct CircularsDesk {
    http: Client,
    store: Store,
    embedder: Arc<dyn EmbeddingModel>,
    selector: Arc<dyn CircularSelector>,
    circulars_url: String,
    pdf_dir: PathBuf,
    marker: MarkerFile,
    top_k: usize,
}

impl CircularsDesk {
    pub fn new(
        http: Client,
        store: Store,
        embedder: Arc<dyn EmbeddingModel>,
        settings: &Settings,
    ) -> Self {
        Self {
            http,
            store,
            embedder,
            selector: Arc::new(ListOnlySelector),
            circulars_url: settings.circulars_url.clone(),
            pdf_dir: settings.pdf_storage.clone(),
            marker: MarkerFile::new(settings.marker_path()),
            top_k: settings.circular_top_k.max(1),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CircularSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Re-indexes the circulars table when its first row changed since the last pass.
    #[instrument(skip(self), fields(url = %self.circulars_url))]
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let page_url = Url::parse(&self.circulars_url)
            .with_context(|| format!("invalid circulars url {}", self.circulars_url))?;

        let html = match fetch_html(&self.http, page_url.as_str(), PAGE_TIMEOUT).await {
            Ok(html) => html,
            Err(err) => {
                warn!(error = %err, "circulars page fetch failed");
                return Ok(RefreshOutcome::FetchFailed);
            }
        };

        let Some(mut rows) = parse_circulars_table(&html, &page_url) else {
            warn!("circulars table not found");
            return Ok(RefreshOutcome::TableMissing);
        };
        let Some(first_desc) = rows.first().map(|row| row.description.clone()) else {
            warn!("circulars table has no rows");
            return Ok(RefreshOutcome::Empty);
        };

        if self.marker.read().await.as_deref() == Some(first_desc.as_str()) {
            info!("circulars unchanged since last refresh");
            return Ok(RefreshOutcome::Unchanged);
        }

        for row in &mut rows {
            match self.embedder.embed(&row.description).await {
                Ok(vector) => row.embedding = Some(vector),
                Err(err) => warn!(
                    description = %row.description,
                    error = %err,
                    "circular embedding failed"
                ),
            }
        }

        self.store
            .replace_circulars(&rows)
            .await
            .context("failed storing circulars")?;
        self.marker.write(&first_desc).await;

        info!(count = rows.len(), "circulars reindexed");
        Ok(RefreshOutcome::Reindexed(rows.len()))
    }

    pub async fn find(&self, query: &str, k: usize) -> Result<Vec<CircularMatch>> {
        let records = self
            .store
            .list_circulars()
            .await
            .context("failed loading circulars")?;
        if records.is_empty() {
            warn!("circulars index is empty");
            return Ok(Vec::new());
        }

        let features = QueryFeatures::build(query, Some(&self.embedder)).await;
        let mut scored = records
            .into_iter()
            .map(|record| {
                let tokens = tokenize(&record.description).into_iter().collect::<HashSet<_>>();
                let score = features.score(&tokens, record.embedding.as_deref());
                (score, record)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| CircularMatch {
                description: record.description,
                url: record.url,
                score,
            })
            .collect())
    }

    async fn matches_for(&self, query: &str) -> Vec<CircularMatch> {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "circulars refresh failed, searching existing index");
        }
        match self.find(query, self.top_k).await {
            Ok(matches) => matches,
            Err(err) => {
                warn!(error = %err, "circulars search failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CircularDesk for CircularsDesk {
    #[instrument(skip(self))]
    async fn handle(&self, query: &str) -> String {
        let options = self.matches_for(query).await;
        if options.is_empty() {
            return NO_MATCHES_REPLY.to_string();
        }

        let menu = CircularMenu {
            query: query.to_string(),
            options,
        };

        match self.selector.select(&menu).await {
            Selection::ListOnly => menu.render_with_links(),
            Selection::Skip => SKIPPED_REPLY.to_string(),
            Selection::Invalid => INVALID_REPLY.to_string(),
            Selection::Pick(idx) => {
                let Some(choice) = menu.options.get(idx) else {
                    return INVALID_REPLY.to_string();
                };
                let saved =
                    download_pdf(&self.http, &self.pdf_dir, &choice.url, &choice.description)
                        .await;
                match saved {
                    Some(path) => format!("Downloaded and saved to {}", path.display()),
                    None => DOWNLOAD_FAILED_REPLY.to_string(),
                }
            }
        }
    }
}
