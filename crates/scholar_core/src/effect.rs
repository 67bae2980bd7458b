use std::path::PathBuf;

use crate::{
    ChatTurn, ContextTag, JobRequest, RunId, SessionId, SessionPlan, Variant, WorkspaceName,
};

/// What to do once a workspace file listing arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFollowUp {
    /// A workspace was just selected: load `origin`, the agent and sessions.
    OpenWorkspace,
    /// A run's stream closed: load the artifact it produced.
    SettleRun,
    /// Only update the known artifacts.
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ListWorkspaces,
    StartJob {
        tag: ContextTag,
        run: RunId,
        request: JobRequest,
    },
    ListFiles {
        tag: ContextTag,
        workspace: WorkspaceName,
        follow_up: ListingFollowUp,
    },
    ResolveArtifact {
        tag: ContextTag,
        workspace: WorkspaceName,
        base_name: String,
        variant: Variant,
    },
    SaveArtifact {
        tag: ContextTag,
        workspace: WorkspaceName,
        variant: Variant,
        file_name: String,
        content: String,
        /// Edit revision of `content`, echoed back in the result.
        revision: u64,
    },
    DeleteArtifact {
        tag: ContextTag,
        workspace: WorkspaceName,
        variant: Variant,
    },
    DeleteWorkspace {
        workspace: WorkspaceName,
    },
    DownloadWorkspace {
        workspace: WorkspaceName,
        destination: PathBuf,
    },
    InitAgent {
        tag: ContextTag,
        workspace: WorkspaceName,
    },
    ListSessions {
        tag: ContextTag,
        workspace: WorkspaceName,
    },
    LoadSession {
        tag: ContextTag,
        session: SessionId,
    },
    SendChat {
        tag: ContextTag,
        workspace: WorkspaceName,
        plan: SessionPlan,
        turn: ChatTurn,
    },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::ListWorkspaces => "ListWorkspaces",
            Effect::StartJob { .. } => "StartJob",
            Effect::ListFiles { .. } => "ListFiles",
            Effect::ResolveArtifact { .. } => "ResolveArtifact",
            Effect::SaveArtifact { .. } => "SaveArtifact",
            Effect::DeleteArtifact { .. } => "DeleteArtifact",
            Effect::DeleteWorkspace { .. } => "DeleteWorkspace",
            Effect::DownloadWorkspace { .. } => "DownloadWorkspace",
            Effect::InitAgent { .. } => "InitAgent",
            Effect::ListSessions { .. } => "ListSessions",
            Effect::LoadSession { .. } => "LoadSession",
            Effect::SendChat { .. } => "SendChat",
        }
    }
}
