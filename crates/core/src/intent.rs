use crate::models::Intent;

/// Keyword fallback used when no text-generation service is configured.
pub fn classify_intent_rules(text: &str) -> Intent {
    let lower = text.to_lowercase();

    if contains_any(
        &lower,
        &[
            "who are you",
            "your name",
            "what are you",
            "what can you do",
            "what do you do",
            "who created you",
            "who made you",
            "who built you",
            "are you a bot",
        ],
    ) {
        return Intent::Identity;
    }

    if contains_any(
        &lower,
        &[
            "circular",
            "pdf",
            "timetable",
            "time table",
            "notification",
            "notice",
            "exam schedule",
        ],
    ) {
        return Intent::PdfRequest;
    }

    if contains_any(
        &lower,
        &[
            "faculty",
            "professor",
            "prof.",
            "dr.",
            "hod",
            "lecturer",
            "staff",
            "teacher",
            "department",
            "email of",
            "phone of",
        ],
    ) {
        return Intent::FacultyInfo;
    }

    Intent::Unknown
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
