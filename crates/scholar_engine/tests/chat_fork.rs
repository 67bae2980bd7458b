mod common;

use common::{init_logging, FakeBackend, RecordingSink};
use pretty_assertions::assert_eq;
use scholar_core::{
    AgentContext, ChatMessage, ChatTurn, ContextTag, SessionId, SessionPlan,
};
use scholar_engine::{execute_send, ChatStep, EngineEvent};

fn turn(text: &str) -> ChatTurn {
    ChatTurn {
        text: text.into(),
        attachments: Vec::new(),
        agent: AgentContext::default(),
    }
}

#[tokio::test]
async fn fork_replaces_restored_session_and_copies_history() {
    init_logging();
    let backend = FakeBackend {
        next_session: 7.into(),
        ..FakeBackend::default()
    };
    let sink = RecordingSink::default();
    let history = vec![
        ChatMessage::user_text("m1"),
        ChatMessage::assistant_text("m2"),
        ChatMessage::user_image("data:image/png;base64,AAAA"),
    ];

    let reply = execute_send(
        &backend,
        ContextTag(3),
        &"ws".into(),
        SessionPlan::Fork {
            restored: "7".into(),
            history,
        },
        turn("m3"),
        &sink,
    )
    .await
    .unwrap();

    assert_eq!(
        backend.calls(),
        vec![
            "delete_session 7",
            "create_session ws",
            "bulk_save 8 3",
            "agent_turn 8",
        ]
    );
    assert_eq!(
        sink.take(),
        vec![EngineEvent::ChatSessionEstablished {
            tag: ContextTag(3),
            session: "8".into(),
        }]
    );
    assert_eq!(reply.message, ChatMessage::assistant_text("answer"));
    assert_eq!(reply.agent.messages.len(), 1);

    let saved = backend.saved_history.lock().unwrap().clone();
    assert_eq!(saved[0].0, "user");
    let text: serde_json::Value = serde_json::from_str(&saved[0].1).unwrap();
    assert_eq!(text, serde_json::json!([{ "type": "text", "text": "m1" }]));
    assert_eq!(saved[1].0, "assistant");
    let image: serde_json::Value = serde_json::from_str(&saved[2].1).unwrap();
    assert_eq!(image[0]["type"], "image_url");
    assert_eq!(image[0]["image_url"]["url"], "data:image/png;base64,AAAA");
}

#[tokio::test]
async fn existing_session_only_calls_the_agent() {
    init_logging();
    let backend = FakeBackend::default();
    let sink = RecordingSink::default();
    execute_send(
        &backend,
        ContextTag(1),
        &"ws".into(),
        SessionPlan::Existing(SessionId::from("4")),
        turn("hello"),
        &sink,
    )
    .await
    .unwrap();
    assert_eq!(backend.calls(), vec!["agent_turn 4"]);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn failed_agent_call_keeps_the_new_session_established() {
    init_logging();
    let backend = FakeBackend {
        failing: Some("agent_turn"),
        ..FakeBackend::default()
    };
    let sink = RecordingSink::default();
    let err = execute_send(
        &backend,
        ContextTag(1),
        &"ws".into(),
        SessionPlan::Create,
        turn("hello"),
        &sink,
    )
    .await
    .unwrap_err();
    assert_eq!(err.step, ChatStep::AgentTurn);
    assert_eq!(
        sink.take(),
        vec![EngineEvent::ChatSessionEstablished {
            tag: ContextTag(1),
            session: "1".into(),
        }]
    );
}

#[tokio::test]
async fn failed_delete_stops_the_fork_before_creating() {
    init_logging();
    let backend = FakeBackend {
        failing: Some("delete_session"),
        ..FakeBackend::default()
    };
    let sink = RecordingSink::default();
    let err = execute_send(
        &backend,
        ContextTag(1),
        &"ws".into(),
        SessionPlan::Fork {
            restored: "2".into(),
            history: vec![ChatMessage::user_text("m1")],
        },
        turn("hello"),
        &sink,
    )
    .await
    .unwrap_err();
    assert_eq!(err.step, ChatStep::DeleteRestored);
    assert_eq!(backend.calls(), vec!["delete_session 2"]);
    assert!(sink.take().is_empty());
}
