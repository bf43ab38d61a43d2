use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_DEPARTMENTS: [&str; 11] = [
    "Civil-Engineering",
    "Mechanical-Engineering",
    "Electrical-and-Electronics-Engineering",
    "Electronics-and-Communication-Engineering",
    "Computer-Science-and-Engineering",
    "Information-Science-and-Engineering",
    "Computer-Science-and-Engineering-(AI&ML)",
    "Computer-Science-and-Business-Systems",
    "Physics",
    "Chemistry",
    "Mathematics",
];

pub const DEFAULT_PAGE_SUFFIXES: [&str; 3] = ["", "/10", "/20"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Llm,
    Rules,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_chat_model: String,
    pub gemini_embedding_model: String,
    pub gemini_base_url: String,
    pub database_url: String,
    pub faculty_base_url: String,
    pub departments: Vec<String>,
    pub page_suffixes: Vec<String>,
    pub circulars_url: String,
    pub pdf_storage: PathBuf,
    pub scrape_hour: u32,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub log_dir: PathBuf,
    pub classifier: ClassifierKind,
    pub faculty_top_k: usize,
    pub circular_top_k: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = get("GEMINI_API_KEY");
        let classifier = match get("NOVACITE_CLASSIFIER").as_deref() {
            Some("rules") => ClassifierKind::Rules,
            Some("llm") => ClassifierKind::Llm,
            _ if gemini_api_key.is_some() => ClassifierKind::Llm,
            _ => ClassifierKind::Rules,
        };

        // Suffixes keep empty entries: "" is the first page of a department.
        let page_suffixes = lookup("PAGE_SUFFIXES")
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| DEFAULT_PAGE_SUFFIXES.iter().map(|s| s.to_string()).collect());

        let departments = get("DEPARTMENTS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_DEPARTMENTS.iter().map(|s| s.to_string()).collect());

        Self {
            gemini_api_key,
            gemini_chat_model: string_or("GEMINI_CHAT_MODEL", "gemini-2.0-flash"),
            gemini_embedding_model: string_or("GEMINI_EMBEDDING_MODEL", "models/embedding-001"),
            gemini_base_url: string_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            database_url: string_or("NOVACITE_DATABASE_URL", "sqlite://novacite.db?mode=rwc"),
            faculty_base_url: string_or(
                "FACULTY_BASE_URL",
                "https://www.mcehassan.ac.in/home/Faculty",
            ),
            departments,
            page_suffixes,
            circulars_url: string_or(
                "CIRCULARS_URL",
                "https://www.mcehassan.ac.in/home/Circulars",
            ),
            pdf_storage: PathBuf::from(string_or("PDF_STORAGE", "./data/pdfs")),
            scrape_hour: get("SCRAPE_HOUR")
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|hour| *hour < 24)
                .unwrap_or(2),
            max_retries: get("MAX_RETRIES")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(5),
            retry_delay: Duration::from_secs(
                get("RETRY_DELAY")
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(4),
            ),
            log_dir: PathBuf::from(string_or("NOVACITE_LOG_DIR", "logs")),
            classifier,
            faculty_top_k: get("NOVACITE_FACULTY_TOP_K")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|k| *k > 0)
                .unwrap_or(50),
            circular_top_k: get("NOVACITE_CIRCULAR_TOP_K")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|k| *k > 0)
                .unwrap_or(5),
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.pdf_storage.join("circulars_state.json")
    }
}
