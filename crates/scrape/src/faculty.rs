use std::sync::Arc;

use anyhow::{bail, Context, Result};
use novacite_core::{FacultyRecord, Settings};
use novacite_retrieval::EmbeddingModel;
use novacite_storage::{FacultyRepository, Store};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};

use crate::{element_text, fetch_html, PAGE_TIMEOUT};

const CARD_SELECTOR: &str = "div.upcoming-events.media.maxwidth400.bg-light.mb-20";

struct CardSelectors {
    card: Selector,
    name: Selector,
    designation: Selector,
    qualification: Selector,
    additional: Selector,
    span: Selector,
    img: Selector,
}

impl CardSelectors {
    fn new() -> Self {
        let parse = |css: &str| Selector::parse(css).expect("static css selector");
        Self {
            card: parse(CARD_SELECTOR),
            name: parse("h4.name"),
            designation: parse("h5.occupation"),
            qualification: parse("h5.qualification"),
            additional: parse("h5.additional"),
            span: parse("span"),
            img: parse("img"),
        }
    }
}

/// Human-readable department label from its URL slug.
pub fn department_label(slug: &str) -> String {
    slug.replace('-', " ").replace("(AI&ML)", "AI & ML")
}

/// Extracts every faculty card of one department page.
pub fn parse_faculty_cards(html: &str, department: &str) -> Vec<FacultyRecord> {
    let selectors = CardSelectors::new();
    let document = Html::parse_document(html);

    document
        .select(&selectors.card)
        .map(|card| parse_card(&selectors, card, department))
        .collect()
}

fn parse_card(selectors: &CardSelectors, card: ElementRef<'_>, department: &str) -> FacultyRecord {
    let text_of = |selector: &Selector| {
        card.select(selector)
            .next()
            .map(element_text)
            .unwrap_or_default()
    };

    let mut phone = String::new();
    let mut email = String::new();
    if let Some(additional) = card.select(&selectors.additional).next() {
        for span in additional.select(&selectors.span) {
            let markup = span.html();
            if markup.contains("fa-phone") {
                phone = element_text(span);
            }
            if markup.contains("fa-envelope-o") {
                email = element_text(span);
            }
        }
    }

    let img_url = card
        .select(&selectors.img)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    FacultyRecord {
        name: text_of(&selectors.name),
        designation: text_of(&selectors.designation),
        qualification: text_of(&selectors.qualification),
        phone,
        email,
        img_url,
        department: department.to_string(),
        embedding: None,
    }
}

/// Walks the paginated department listings.
pub struct FacultyScraper {
    http: Client,
    base_url: String,
    departments: Vec<String>,
    page_suffixes: Vec<String>,
}

impl FacultyScraper {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        departments: Vec<String>,
        page_suffixes: Vec<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            departments,
            page_suffixes,
        }
    }

    pub fn from_settings(http: Client, settings: &Settings) -> Self {
        Self::new(
            http,
            settings.faculty_base_url.as_str(),
            settings.departments.clone(),
            settings.page_suffixes.clone(),
        )
    }

    /// A failed page is skipped; a page without cards ends its department.
    #[instrument(skip(self))]
    pub async fn scrape_all(&self) -> Vec<FacultyRecord> {
        let mut records = Vec::new();

        for slug in &self.departments {
            let department = department_label(slug);
            for suffix in &self.page_suffixes {
                let url = format!("{}/{}{}", self.base_url, slug, suffix);
                let html = match fetch_html(&self.http, &url, PAGE_TIMEOUT).await {
                    Ok(html) => html,
                    Err(err) => {
                        warn!(url = %url, error = %err, "faculty page crawl failed");
                        continue;
                    }
                };

                let cards = parse_faculty_cards(&html, &department);
                if cards.is_empty() {
                    break;
                }
                info!(url = %url, cards = cards.len(), "faculty page parsed");
                records.extend(cards);
            }
        }

        records
    }
}

/// Embeds scraped rows and overwrites the faculty table.
pub struct FacultyLoader {
    store: Store,
    embedder: Arc<dyn EmbeddingModel>,
}

impl FacultyLoader {
    pub fn new(store: Store, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self { store, embedder }
    }

    /// Returns how many rows were stored. Rows whose embedding fails are skipped.
    pub async fn store(&self, records: Vec<FacultyRecord>) -> Result<usize> {
        if records.is_empty() {
            bail!("no faculty data to store");
        }

        let mut rows = Vec::with_capacity(records.len());
        for mut record in records {
            match self.embedder.embed(&record.embedding_text()).await {
                Ok(vector) => {
                    record.embedding = Some(vector);
                    rows.push(record);
                }
                Err(err) => {
                    warn!(
                        name = %record.name,
                        error = %err,
                        "faculty embedding failed, skipping record"
                    );
                }
            }
        }

        if rows.is_empty() {
            bail!("all faculty embeddings failed");
        }

        self.store
            .replace_faculty(&rows)
            .await
            .context("failed storing faculty records")?;
        info!(stored = rows.len(), model = self.embedder.model_name(), "faculty records stored");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PAGE: &str = r#"
    <html><body>
      <div class="upcoming-events media maxwidth400 bg-light mb-20">
        <img src="/uploads/rajesh.jpg">
        <h4 class="name"> Dr. Rajesh K </h4>
        <h5 class="occupation">Professor &amp; Head</h5>
        <h5 class="qualification">M.Tech, Ph.D</h5>
        <h5 class="additional">
          <span><i class="fa fa-phone"></i> 9845000000</span>
          <span><i class="fa fa-envelope-o"></i> rajesh@mcehassan.ac.in</span>
        </h5>
      </div>
      <div class="upcoming-events media maxwidth400 bg-light mb-20">
        <h4 class="name">Asha M</h4>
      </div>
      <div class="upcoming-events media">not a card</div>
    </body></html>"#;

    struct PickyEmbedder;

    #[async_trait]
    impl EmbeddingModel for PickyEmbedder {
        fn model_name(&self) -> &str {
            "picky"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("Asha") {
                Err(anyhow!("rate limited"))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    #[test]
    fn labels_departments() {
        assert_eq!(
            department_label("Computer-Science-and-Engineering-(AI&ML)"),
            "Computer Science and Engineering AI & ML"
        );
    }

    #[test]
    fn parses_cards_with_missing_fields() {
        let records = parse_faculty_cards(PAGE, "Physics");
        assert_eq!(records.len(), 2);

        let rajesh = &records[0];
        assert_eq!(rajesh.name, "Dr. Rajesh K");
        assert_eq!(rajesh.designation, "Professor & Head");
        assert_eq!(rajesh.phone, "9845000000");
        assert_eq!(rajesh.email, "rajesh@mcehassan.ac.in");
        assert_eq!(rajesh.img_url, "/uploads/rajesh.jpg");
        assert_eq!(rajesh.department, "Physics");

        let asha = &records[1];
        assert_eq!(asha.name, "Asha M");
        assert!(asha.phone.is_empty());
        assert!(asha.img_url.is_empty());
    }

    #[tokio::test]
    async fn stops_department_at_first_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Faculty/Physics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Faculty/Physics/10"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Faculty/Physics/20"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Faculty/Chemistry"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scraper = FacultyScraper::new(
            Client::new(),
            format!("{}/Faculty/", server.uri()),
            vec!["Physics".to_string(), "Chemistry".to_string()],
            vec![String::new(), "/10".to_string(), "/20".to_string()],
        );

        let records = scraper.scrape_all().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.department == "Physics"));
    }

    #[tokio::test]
    async fn loader_skips_failed_embeddings() {
        let store = Store::memory();
        let loader = FacultyLoader::new(store.clone(), Arc::new(PickyEmbedder));

        let stored = loader.store(parse_faculty_cards(PAGE, "Physics")).await.unwrap();
        assert_eq!(stored, 1);

        let rows = store.list_faculty().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].embedding, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn loader_rejects_empty_input() {
        let loader = FacultyLoader::new(Store::memory(), Arc::new(PickyEmbedder));
        assert!(loader.store(Vec::new()).await.is_err());
    }
}
