use std::fmt;
use std::path::PathBuf;

use scholar_core::{
    AgentContext, ChatMessage, ChatReply, ContextTag, FileListing, ListingFollowUp, RunId,
    SessionId, SessionSummary, StreamFrame, Variant, WorkspaceEntry, WorkspaceName,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The server answered with an `{"error": ...}` body.
    Server,
    Decode,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Server => write!(f, "server error"),
            FailureKind::Decode => write!(f, "invalid response"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{variant} artifact unavailable after {attempts} attempts: {last}")]
pub struct ResolveError {
    pub variant: Variant,
    pub attempts: u32,
    pub last: BackendError,
}

/// Step of a chat turn that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStep {
    DeleteRestored,
    CreateSession,
    CopyHistory,
    EncodeAttachment,
    AgentTurn,
}

impl fmt::Display for ChatStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChatStep::DeleteRestored => "deleting the restored session",
            ChatStep::CreateSession => "creating a session",
            ChatStep::CopyHistory => "copying the conversation",
            ChatStep::EncodeAttachment => "reading an attachment",
            ChatStep::AgentTurn => "asking the agent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} failed: {source}")]
pub struct ChatError {
    pub step: ChatStep,
    #[source]
    pub source: BackendError,
}

impl ChatError {
    pub(crate) fn at(step: ChatStep) -> impl FnOnce(BackendError) -> ChatError {
        move |source| ChatError { step, source }
    }
}

/// Results reported by the engine thread. Every context-bound result echoes
/// the tag it was issued with.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    WorkspacesListed(Result<Vec<WorkspaceEntry>, BackendError>),
    JobFrames {
        tag: ContextTag,
        run: RunId,
        frames: Vec<StreamFrame>,
    },
    JobClosed {
        tag: ContextTag,
        run: RunId,
        result: Result<(), BackendError>,
    },
    FilesListed {
        tag: ContextTag,
        workspace: WorkspaceName,
        follow_up: ListingFollowUp,
        result: Result<FileListing, BackendError>,
    },
    ArtifactResolved {
        tag: ContextTag,
        variant: Variant,
        result: Result<String, ResolveError>,
    },
    ArtifactSaved {
        tag: ContextTag,
        variant: Variant,
        revision: u64,
        result: Result<(), BackendError>,
    },
    ArtifactDeleted {
        tag: ContextTag,
        variant: Variant,
        result: Result<(), BackendError>,
    },
    WorkspaceDeleted {
        workspace: WorkspaceName,
        result: Result<(), BackendError>,
    },
    WorkspaceDownloaded {
        workspace: WorkspaceName,
        result: Result<PathBuf, BackendError>,
    },
    AgentInitialized {
        tag: ContextTag,
        result: Result<AgentContext, BackendError>,
    },
    SessionsListed {
        tag: ContextTag,
        result: Result<Vec<SessionSummary>, BackendError>,
    },
    SessionHistoryLoaded {
        tag: ContextTag,
        session: SessionId,
        result: Result<Vec<ChatMessage>, BackendError>,
    },
    ChatSessionEstablished {
        tag: ContextTag,
        session: SessionId,
    },
    ChatReplied {
        tag: ContextTag,
        result: Result<ChatReply, ChatError>,
    },
    /// The task executing `effect` panicked before reporting.
    EffectAborted {
        effect: &'static str,
        reason: String,
    },
}

impl EngineEvent {
    /// Whether this event completes the effect that produced it.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            EngineEvent::JobFrames { .. } | EngineEvent::ChatSessionEstablished { .. }
        )
    }
}
