use std::sync::Arc;

use anyhow::{Context, Result};
use novacite_core::Settings;
use novacite_llm::LlmStack;
use novacite_observability::AppMetrics;
use novacite_retrieval::{FacultyIndex, FacultyQaChain};
use novacite_scrape::{CircularSelector, CircularsDesk, FacultyLoader, FacultyScraper};
use novacite_storage::Store;
use reqwest::Client;
use tracing::info;

use crate::{Assistant, Collaborators};

/// Process-wide handles built once from [`Settings`].
pub struct AssistantRuntime {
    settings: Settings,
    store: Store,
    llm: LlmStack,
    http: Client,
}

impl AssistantRuntime {
    pub async fn connect(settings: Settings) -> Result<Self> {
        let store = Store::sqlite(&settings.database_url)
            .await
            .with_context(|| format!("failed opening {}", settings.database_url))?;
        let llm = LlmStack::from_settings(&settings)?;
        let http = novacite_scrape::http_client()?;

        info!(database = %settings.database_url, "runtime connected");
        Ok(Self {
            settings,
            store,
            llm,
            http,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn faculty_scraper(&self) -> FacultyScraper {
        FacultyScraper::from_settings(self.http.clone(), &self.settings)
    }

    pub fn faculty_loader(&self) -> FacultyLoader {
        FacultyLoader::new(self.store.clone(), self.llm.embedder.clone())
    }

    pub fn circulars_desk(&self, selector: Arc<dyn CircularSelector>) -> CircularsDesk {
        CircularsDesk::new(
            self.http.clone(),
            self.store.clone(),
            self.llm.embedder.clone(),
            &self.settings,
        )
        .with_selector(selector)
    }

    /// Wires the graph over the stored faculty index and a circulars desk.
    pub async fn assistant(
        &self,
        selector: Arc<dyn CircularSelector>,
        metrics: Arc<AppMetrics>,
    ) -> Result<Assistant> {
        let generators = self.llm.require_generators()?;
        let index = FacultyIndex::load(&self.store, Some(self.llm.embedder.clone())).await?;
        let faculty = FacultyQaChain::new(
            index,
            generators.deterministic.clone(),
            self.settings.faculty_top_k,
        );

        let collaborators = Collaborators {
            classifier: self.llm.classifier.clone(),
            faculty: Arc::new(faculty),
            circulars: Arc::new(self.circulars_desk(selector)),
            identity: generators.identity.clone(),
        };

        Assistant::new(collaborators, metrics).context("assistant graph failed to compile")
    }
}
