mod common;

use common::{Harness, ScriptedGenerator, CIRCULAR_REPLY, FACULTY_REPLY, IDENTITY_REPLY};
use novacite_agents::{build_assistant_graph, GraphError};
use novacite_core::prompts::{IDENTITY_PERSONA, UNKNOWN_REPLY};
use novacite_core::{AgentState, Intent, Prompt};

const OUTPUTS: [&str; 4] = [FACULTY_REPLY, CIRCULAR_REPLY, IDENTITY_REPLY, UNKNOWN_REPLY];

#[tokio::test]
async fn every_label_yields_exactly_one_node_output() {
    let labels = [
        "faculty_info",
        "pdf_request",
        "identity",
        "unknown",
        "",
        "weather",
        "faculty_info pdf_request",
    ];

    for label in labels {
        let harness = Harness::classifying_as(label);
        let graph = build_assistant_graph(harness.collaborators()).unwrap();
        let (state, path) = graph.invoke_traced(AgentState::new("some query")).await.unwrap();

        assert_eq!(path.len(), 2, "label {label:?} ran {path:?}");
        assert_eq!(path[0], "classify");
        let result = state.result().unwrap();
        assert_eq!(OUTPUTS.iter().filter(|output| **output == result).count(), 1);

        let touched = harness.faculty.queries.lock().len()
            + harness.circulars.queries.lock().len()
            + harness.identity.prompts.lock().len();
        assert!(touched <= 1);
    }
}

#[tokio::test]
async fn classifier_failure_falls_back_to_help_message() {
    let harness = Harness::with_classifier(ScriptedGenerator::failing());
    let state = harness.assistant().ask("Who teaches physics?").await.unwrap();

    assert_eq!(state.intent(), Some(Intent::Unknown));
    assert_eq!(state.result(), Some(UNKNOWN_REPLY));
    assert!(harness.faculty.queries.lock().is_empty());
}

#[tokio::test]
async fn labels_are_trimmed_and_case_folded() {
    let reply = Harness::classifying_as("FACULTY_INFO ")
        .assistant()
        .respond("Who is the HOD of CSE?")
        .await
        .unwrap();
    assert_eq!(reply.intent, Intent::FacultyInfo);
    assert_eq!(reply.result, FACULTY_REPLY);

    let reply = Harness::classifying_as("maybe")
        .assistant()
        .respond("Who is the HOD of CSE?")
        .await
        .unwrap();
    assert_eq!(reply.intent, Intent::Unknown);
    assert_eq!(reply.result, UNKNOWN_REPLY);
}

#[tokio::test]
async fn identity_receives_persona_and_exact_query() {
    let harness = Harness::classifying_as("identity");
    let reply = harness.assistant().respond("Who are you?").await.unwrap();

    assert_eq!(reply.result, IDENTITY_REPLY);
    assert_eq!(
        harness.identity.prompts.lock().as_slice(),
        &[Prompt::with_system(IDENTITY_PERSONA, "Who are you?")]
    );
}

#[tokio::test]
async fn circular_desk_gets_unchanged_query_and_its_reply_is_kept() {
    let harness = Harness::classifying_as("pdf_request");
    let reply = harness
        .assistant()
        .respond("Show me exam timetable PDFs")
        .await
        .unwrap();

    assert_eq!(reply.intent, Intent::PdfRequest);
    assert_eq!(reply.result, CIRCULAR_REPLY);
    assert_eq!(
        harness.circulars.queries.lock().as_slice(),
        &["Show me exam timetable PDFs".to_string()]
    );
}

#[tokio::test]
async fn identical_inputs_give_identical_results() {
    let first = Harness::classifying_as("faculty_info")
        .assistant()
        .ask("Who is Dr. Asha?")
        .await
        .unwrap();
    let second = Harness::classifying_as("faculty_info")
        .assistant()
        .ask("Who is Dr. Asha?")
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn response_node_sees_classified_state() {
    let harness = Harness::classifying_as("faculty_info");
    let state = harness.assistant().ask("Who is Dr. Asha?").await.unwrap();

    assert_eq!(state.query(), "Who is Dr. Asha?");
    assert_eq!(state.intent(), Some(Intent::FacultyInfo));
    assert_eq!(state.result(), Some(FACULTY_REPLY));
    assert_eq!(
        harness.faculty.queries.lock().as_slice(),
        &["Who is Dr. Asha?".to_string()]
    );
}

#[tokio::test]
async fn response_failures_surface_as_graph_errors() {
    let mut harness = Harness::classifying_as("identity");
    harness.identity = ScriptedGenerator::failing();

    let err = harness.assistant().ask("Who are you?").await.unwrap_err();
    assert!(matches!(err, GraphError::Node { ref node, .. } if node == "identity"));
    assert_eq!(harness.metrics.snapshot().failures_total, 1);
}
