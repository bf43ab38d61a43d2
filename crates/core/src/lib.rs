pub mod contracts;
pub mod intent;
pub mod models;
pub mod prompts;
pub mod settings;
pub mod text;

pub use contracts::{CircularDesk, FacultyAnswerer, IntentClassifier, Prompt, TextGenerator};
pub use intent::classify_intent_rules;
pub use models::*;
pub use settings::{ClassifierKind, Settings};
pub use text::{normalize_text, truncate_graphemes};
