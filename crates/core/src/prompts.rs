use crate::models::FacultyRecord;

pub const CLASSIFIER_TEMPERATURE: f32 = 0.0;
pub const IDENTITY_TEMPERATURE: f32 = 0.3;

pub const IDENTITY_PERSONA: &str = "You are NovaCite, a helpful assistant built for Malnad College of Engineering, created by Anonymous. You assist students with faculty info and college circulars. Respond briefly and clearly about who you are or what you do.";

pub const UNKNOWN_REPLY: &str = "Sorry, I can only help with faculty info or college circulars.\nTry asking about exam schedules, PDFs, or faculty details.";

pub const NO_FACULTY_MATCH_REPLY: &str =
    "I couldn't find any faculty records matching your question.";

const CLASSIFIER_TEMPLATE: &str = "Classify the user's request as one of the following:
- faculty_info: when the user asks for faculty details or information about specific staff/departments
- pdf_request: when the user asks for circulars, PDFs, exam timetables, notifications
- identity: when the user asks about who you are, your name, what you do, who created you, or other questions about your role
- unknown: if none of the above apply

User query: {query}

Answer with exactly one of: faculty_info, pdf_request, identity, unknown";

const FACULTY_QA_SYSTEM: &str = "Use the following faculty records to answer the student's question. If the records do not contain the answer, say that you don't know instead of making one up. Keep the answer short and factual.";

pub fn classification_prompt(query: &str) -> String {
    CLASSIFIER_TEMPLATE.replace("{query}", query)
}

pub fn faculty_qa_system() -> &'static str {
    FACULTY_QA_SYSTEM
}

/// Stuffs every retrieved record into a single context block.
pub fn faculty_qa_prompt(query: &str, records: &[&FacultyRecord]) -> String {
    let context = records
        .iter()
        .map(|record| record.context_text())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{context}\n\nQuestion: {query}\nHelpful Answer:")
}
