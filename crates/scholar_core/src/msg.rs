use std::path::PathBuf;

use crate::{
    AgentContext, ChatMessage, ChatReply, ContextTag, DocumentSource, FileListing, JobKind,
    ListingFollowUp, PendingAttachment, RunId, SessionId, SessionSummary, StreamFrame, Variant,
    WorkspaceEntry, WorkspaceName,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Reload the list of workspaces.
    RefreshWorkspaces,
    WorkspacesListed(Result<Vec<WorkspaceEntry>, String>),
    /// User picked a workspace.
    WorkspaceSelected(WorkspaceName),
    /// User asked to delete a workspace; waits for confirmation.
    DeleteWorkspaceRequested(WorkspaceName),
    DeleteWorkspaceConfirmed,
    DeleteWorkspaceCancelled,
    WorkspaceDeleted {
        workspace: WorkspaceName,
        result: Result<(), String>,
    },
    /// Save the active workspace as a zip archive.
    DownloadRequested {
        destination: PathBuf,
    },
    WorkspaceDownloaded {
        workspace: WorkspaceName,
        result: Result<PathBuf, String>,
    },

    /// User submitted a new document.
    IngestRequested(DocumentSource),
    /// User asked for a translate/explain/threadify run on the active workspace.
    DeriveRequested(JobKind),
    /// Frames decoded from a run's stream, in arrival order.
    JobFrames {
        tag: ContextTag,
        run: RunId,
        frames: Vec<StreamFrame>,
    },
    /// The run's transport closed.
    JobClosed {
        tag: ContextTag,
        run: RunId,
        result: Result<(), String>,
    },
    FilesListed {
        tag: ContextTag,
        workspace: WorkspaceName,
        follow_up: ListingFollowUp,
        result: Result<FileListing, String>,
    },

    /// User asked to view a variant.
    VariantRequested(Variant),
    ArtifactResolved {
        tag: ContextTag,
        variant: Variant,
        result: Result<String, String>,
    },
    /// User edited the displayed artifact.
    ContentEdited(String),
    SaveRequested,
    ArtifactSaved {
        tag: ContextTag,
        variant: Variant,
        revision: u64,
        result: Result<(), String>,
    },
    DeleteVariantRequested(Variant),
    ArtifactDeleted {
        tag: ContextTag,
        variant: Variant,
        result: Result<(), String>,
    },

    AgentInitialized {
        tag: ContextTag,
        result: Result<AgentContext, String>,
    },
    SessionsListed {
        tag: ContextTag,
        result: Result<Vec<SessionSummary>, String>,
    },
    /// User picked a saved session to view.
    SessionRestoreRequested(SessionId),
    SessionHistoryLoaded {
        tag: ContextTag,
        session: SessionId,
        result: Result<Vec<ChatMessage>, String>,
    },
    AttachmentAdded(PendingAttachment),
    AttachmentRemoved(usize),
    /// User sent a chat message with the pending attachments.
    ChatSubmitted(String),
    ChatSessionEstablished {
        tag: ContextTag,
        session: SessionId,
    },
    ChatReplied {
        tag: ContextTag,
        result: Result<ChatReply, String>,
    },
    /// Start a fresh unsaved conversation.
    ChatReset,
    /// An effect stopped without producing its result.
    EffectAborted {
        effect: &'static str,
        reason: String,
    },
    NoticeDismissed,
    /// Fallback for placeholder wiring.
    NoOp,
}

impl Msg {
    /// Context the result was issued for; `None` for user input and for
    /// results that are not bound to a workspace context.
    pub fn context_tag(&self) -> Option<ContextTag> {
        match self {
            Msg::JobFrames { tag, .. }
            | Msg::JobClosed { tag, .. }
            | Msg::FilesListed { tag, .. }
            | Msg::ArtifactResolved { tag, .. }
            | Msg::ArtifactSaved { tag, .. }
            | Msg::ArtifactDeleted { tag, .. }
            | Msg::AgentInitialized { tag, .. }
            | Msg::SessionsListed { tag, .. }
            | Msg::SessionHistoryLoaded { tag, .. }
            | Msg::ChatSessionEstablished { tag, .. }
            | Msg::ChatReplied { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Msg::RefreshWorkspaces => "RefreshWorkspaces",
            Msg::WorkspacesListed(_) => "WorkspacesListed",
            Msg::WorkspaceSelected(_) => "WorkspaceSelected",
            Msg::DeleteWorkspaceRequested(_) => "DeleteWorkspaceRequested",
            Msg::DeleteWorkspaceConfirmed => "DeleteWorkspaceConfirmed",
            Msg::DeleteWorkspaceCancelled => "DeleteWorkspaceCancelled",
            Msg::WorkspaceDeleted { .. } => "WorkspaceDeleted",
            Msg::DownloadRequested { .. } => "DownloadRequested",
            Msg::WorkspaceDownloaded { .. } => "WorkspaceDownloaded",
            Msg::IngestRequested(_) => "IngestRequested",
            Msg::DeriveRequested(_) => "DeriveRequested",
            Msg::JobFrames { .. } => "JobFrames",
            Msg::JobClosed { .. } => "JobClosed",
            Msg::FilesListed { .. } => "FilesListed",
            Msg::VariantRequested(_) => "VariantRequested",
            Msg::ArtifactResolved { .. } => "ArtifactResolved",
            Msg::ContentEdited(_) => "ContentEdited",
            Msg::SaveRequested => "SaveRequested",
            Msg::ArtifactSaved { .. } => "ArtifactSaved",
            Msg::DeleteVariantRequested(_) => "DeleteVariantRequested",
            Msg::ArtifactDeleted { .. } => "ArtifactDeleted",
            Msg::AgentInitialized { .. } => "AgentInitialized",
            Msg::SessionsListed { .. } => "SessionsListed",
            Msg::SessionRestoreRequested(_) => "SessionRestoreRequested",
            Msg::SessionHistoryLoaded { .. } => "SessionHistoryLoaded",
            Msg::AttachmentAdded(_) => "AttachmentAdded",
            Msg::AttachmentRemoved(_) => "AttachmentRemoved",
            Msg::ChatSubmitted(_) => "ChatSubmitted",
            Msg::ChatSessionEstablished { .. } => "ChatSessionEstablished",
            Msg::ChatReplied { .. } => "ChatReplied",
            Msg::ChatReset => "ChatReset",
            Msg::EffectAborted { .. } => "EffectAborted",
            Msg::NoticeDismissed => "NoticeDismissed",
            Msg::NoOp => "NoOp",
        }
    }
}
