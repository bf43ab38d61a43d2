use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified category of a user query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FacultyInfo,
    PdfRequest,
    Identity,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::FacultyInfo,
        Intent::PdfRequest,
        Intent::Identity,
        Intent::Unknown,
    ];

    /// Maps a raw classifier label onto the closed label set.
    ///
    /// The value is trimmed and lower-cased first; anything that is not one of
    /// the three routable labels collapses to [`Intent::Unknown`].
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "faculty_info" => Self::FacultyInfo,
            "pdf_request" => Self::PdfRequest,
            "identity" => Self::Identity,
            _ => Self::Unknown,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::FacultyInfo => "faculty_info",
            Self::PdfRequest => "pdf_request",
            Self::Identity => "identity",
            Self::Unknown => "unknown",
        }
    }

    pub fn route(self) -> Route {
        match self {
            Self::FacultyInfo => Route::Faculty,
            Self::PdfRequest => Route::Circular,
            Self::Identity => Route::Identity,
            Self::Unknown => Route::Unknown,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Response node selected for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Faculty,
    Circular,
    Identity,
    Unknown,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::Faculty,
        Route::Circular,
        Route::Identity,
        Route::Unknown,
    ];

    pub fn node_id(self) -> &'static str {
        match self {
            Self::Faculty => "faculty",
            Self::Circular => "circular",
            Self::Identity => "identity",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("intent already set to {0}")]
    IntentAlreadySet(Intent),
    #[error("result already set")]
    ResultAlreadySet,
}

/// Request-scoped state threaded through the assistant graph.
///
/// `query` is fixed at construction; `intent` and `result` can each be written
/// once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    query: String,
    intent: Option<Intent>,
    result: Option<String>,
}

impl AgentState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent: None,
            result: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn set_intent(&mut self, intent: Intent) -> Result<(), StateError> {
        if let Some(existing) = self.intent {
            return Err(StateError::IntentAlreadySet(existing));
        }
        self.intent = Some(intent);
        Ok(())
    }

    pub fn set_result(&mut self, result: impl Into<String>) -> Result<(), StateError> {
        if self.result.is_some() {
            return Err(StateError::ResultAlreadySet);
        }
        self.result = Some(result.into());
        Ok(())
    }

    /// Route selected by the stored intent; an unset intent routes to `unknown`.
    pub fn route(&self) -> Route {
        self.intent.unwrap_or(Intent::Unknown).route()
    }

    pub fn into_result(self) -> Option<String> {
        self.result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyRecord {
    pub name: String,
    pub designation: String,
    pub qualification: String,
    pub phone: String,
    pub email: String,
    pub img_url: String,
    pub department: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl FacultyRecord {
    /// Text embedded at load time.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.name,
            self.designation,
            self.qualification,
            self.phone,
            self.email,
            self.department
        )
        .trim()
        .to_string()
    }

    /// Text handed to the answering model as context.
    pub fn context_text(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            self.name,
            self.designation,
            self.qualification,
            self.department,
            self.email,
            self.phone,
            self.img_url
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularRecord {
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedFaculty {
    pub record: FacultyRecord,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularMatch {
    pub description: String,
    pub url: String,
    pub score: f32,
}

/// Final answer handed back to callers of the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub intent: Intent,
    pub result: String,
}
