use crate::{
    ChatMessage, ContextTag, JobKind, JobPhase, RunId, SessionId, SessionSummary, Variant,
    WorkspaceEntry, WorkspaceName,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub workspaces: Vec<WorkspaceEntry>,
    pub active_workspace: Option<WorkspaceName>,
    /// Workspace awaiting delete confirmation.
    pub pending_delete: Option<WorkspaceName>,
    pub context: ContextTag,
    pub job: Option<JobView>,
    pub document: DocumentView,
    pub chat: ChatView,
    pub notice: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub run: RunId,
    pub kind: JobKind,
    pub phase: JobPhase,
    pub status_text: String,
    pub output: String,
    pub generating: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentView {
    pub source_document: Option<String>,
    pub base_name: Option<String>,
    pub variant: Option<Variant>,
    /// Streamed output while a run is active, the displayed artifact otherwise.
    pub content: String,
    pub modified: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub viewable: Vec<Variant>,
    /// Runs that may be started now.
    pub derivable: Vec<JobKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatView {
    pub sessions: Vec<SessionSummary>,
    pub live_session: Option<SessionId>,
    pub restored_session: Option<SessionId>,
    pub messages: Vec<ChatMessage>,
    pub attachments: Vec<String>,
    pub sending: bool,
    pub loading_history: bool,
    pub agent_ready: bool,
}
