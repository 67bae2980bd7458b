use bytes::Bytes;
use futures_util::stream::BoxStream;

use scholar_core::{
    AgentContext, ChatMessage, FileListing, JobRequest, SessionId, SessionSummary, Variant,
    WorkspaceEntry, WorkspaceName,
};

use crate::{BackendError, EngineEvent};

/// Raw body of a job stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Remote operations the engine depends on. Workspaces are passed by bare
/// name; implementations apply any tenant scoping.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceEntry>, BackendError>;

    async fn list_files(&self, workspace: &WorkspaceName) -> Result<FileListing, BackendError>;

    async fn fetch_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
    ) -> Result<String, BackendError>;

    async fn save_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
        content: &str,
    ) -> Result<(), BackendError>;

    async fn delete_artifact(
        &self,
        workspace: &WorkspaceName,
        variant: Variant,
    ) -> Result<(), BackendError>;

    async fn delete_workspace(&self, workspace: &WorkspaceName) -> Result<(), BackendError>;

    /// Zip archive of the whole workspace.
    async fn download_workspace(&self, workspace: &WorkspaceName) -> Result<Bytes, BackendError>;

    /// Dispatches a job and returns its progress stream once the server has
    /// accepted it.
    async fn open_job(&self, request: &JobRequest) -> Result<ByteStream, BackendError>;

    async fn initialize_agent(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<AgentContext, BackendError>;

    async fn list_sessions(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<Vec<SessionSummary>, BackendError>;

    async fn load_history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, BackendError>;

    async fn create_session(&self, workspace: &WorkspaceName) -> Result<SessionId, BackendError>;

    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError>;

    /// Stores already-encoded `(role, content)` pairs in order.
    async fn bulk_save(
        &self,
        session: &SessionId,
        messages: &[(String, String)],
    ) -> Result<(), BackendError>;

    /// One agent turn. Returns the assistant's text and the updated context.
    async fn agent_turn(
        &self,
        session: &SessionId,
        user_input: &str,
        agent: &AgentContext,
    ) -> Result<(String, AgentContext), BackendError>;

    /// Absolute URL of a file inside a workspace.
    fn content_url(&self, workspace: &WorkspaceName, file_name: &str) -> String;
}
