//! Executes chat turns against the backend.
//!
//! User input travels as a JSON list of content parts, the format the agent
//! endpoint and the session store share:
//! `[{"type":"text","text":..},{"type":"image_url","image_url":{"url":..}}]`.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use engine_logging::engine_info;
use scholar_core::{
    ChatMessage, ChatReply, ChatRole, ChatTurn, ContextTag, MessageKind, PendingAttachment,
    SessionId, SessionPlan, WorkspaceName,
};

use crate::backend::{Backend, EventSink};
use crate::{BackendError, ChatError, ChatStep, EngineEvent, FailureKind};

/// Runs one turn. The session obtained for it is announced through `sink`
/// as soon as it exists, so it stays live even if a later step fails.
pub async fn execute_send(
    backend: &dyn Backend,
    tag: ContextTag,
    workspace: &WorkspaceName,
    plan: SessionPlan,
    turn: ChatTurn,
    sink: &dyn EventSink,
) -> Result<ChatReply, ChatError> {
    let session = match plan {
        SessionPlan::Existing(session) => session,
        SessionPlan::Create => create(backend, tag, workspace, sink).await?,
        SessionPlan::Fork { restored, history } => {
            backend
                .delete_session(&restored)
                .await
                .map_err(ChatError::at(ChatStep::DeleteRestored))?;
            let session = create(backend, tag, workspace, sink).await?;
            let encoded = encode_history(&history)
                .await
                .map_err(ChatError::at(ChatStep::CopyHistory))?;
            if !encoded.is_empty() {
                backend
                    .bulk_save(&session, &encoded)
                    .await
                    .map_err(ChatError::at(ChatStep::CopyHistory))?;
            }
            engine_info!(
                "Forked session {} into {} ({} messages)",
                restored,
                session,
                encoded.len()
            );
            session
        }
    };

    let user_input = encode_user_input(&turn.text, &turn.attachments)
        .await
        .map_err(ChatError::at(ChatStep::EncodeAttachment))?;
    let (response, agent) = backend
        .agent_turn(&session, &user_input, &turn.agent)
        .await
        .map_err(ChatError::at(ChatStep::AgentTurn))?;
    Ok(ChatReply {
        message: ChatMessage::assistant_text(response),
        agent,
    })
}

async fn create(
    backend: &dyn Backend,
    tag: ContextTag,
    workspace: &WorkspaceName,
    sink: &dyn EventSink,
) -> Result<SessionId, ChatError> {
    let session = backend
        .create_session(workspace)
        .await
        .map_err(ChatError::at(ChatStep::CreateSession))?;
    sink.emit(EngineEvent::ChatSessionEstablished {
        tag,
        session: session.clone(),
    });
    Ok(session)
}

/// Content-part list for the agent endpoint.
pub async fn encode_user_input(
    text: &str,
    attachments: &[PendingAttachment],
) -> Result<String, BackendError> {
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if !text.is_empty() {
        parts.push(text_part(text));
    }
    for attachment in attachments {
        parts.push(image_part(&image_url(&attachment.reference).await?));
    }
    Ok(Value::Array(parts).to_string())
}

/// `(role, content)` pairs for a bulk copy. Image messages keep their kind by
/// being stored as image parts.
pub async fn encode_history(
    history: &[ChatMessage],
) -> Result<Vec<(String, String)>, BackendError> {
    let mut encoded = Vec::with_capacity(history.len());
    for message in history {
        let part = match message.kind {
            MessageKind::Text => text_part(&message.content),
            MessageKind::Image => image_part(&image_url(&message.content).await?),
        };
        let role = match message.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        encoded.push((role.to_string(), Value::Array(vec![part]).to_string()));
    }
    Ok(encoded)
}

fn text_part(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

fn image_part(url: &str) -> Value {
    json!({ "type": "image_url", "image_url": { "url": url } })
}

/// Remote and inline references pass through; local files become `data:` URLs.
async fn image_url(reference: &str) -> Result<String, BackendError> {
    if ["data:", "http://", "https://"]
        .iter()
        .any(|scheme| reference.starts_with(scheme))
    {
        return Ok(reference.to_string());
    }
    let path = Path::new(reference);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| BackendError::new(FailureKind::Io, format!("{reference}: {err}")))?;
    Ok(format!(
        "data:{};base64,{}",
        mime_for(path),
        STANDARD.encode(bytes)
    ))
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
