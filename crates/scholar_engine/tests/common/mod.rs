#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use scholar_core::{
    AgentContext, ChatMessage, FileListing, JobRequest, SessionId, SessionSummary, Variant,
    WorkspaceEntry, WorkspaceName,
};
use scholar_engine::{
    Backend, BackendError, ByteStream, EngineEvent, EventSink, FailureKind,
};
use tokio::time::Instant;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    /// Artifact fetches that fail before one succeeds.
    pub artifact_failures: Mutex<u32>,
    pub artifact_text: String,
    pub fetch_times: Mutex<Vec<Instant>>,
    pub next_session: Mutex<u64>,
    /// Name of a method that should fail.
    pub failing: Option<&'static str>,
    /// Name of a method that should panic.
    pub panicking: Option<&'static str>,
    pub saved_history: Mutex<Vec<(String, String)>>,
    pub job_chunks: Vec<Result<Vec<u8>, BackendError>>,
}

impl FakeBackend {
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str, detail: impl std::fmt::Display) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(format!("{name} {detail}"));
        if self.panicking == Some(name) {
            panic!("{name} panicked");
        }
        if self.failing == Some(name) {
            return Err(BackendError::new(FailureKind::HttpStatus(500), format!("{name} failed")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceEntry>, BackendError> {
        self.record("list_workspaces", "")?;
        Ok(vec![WorkspaceEntry {
            name: "20240101_paper".into(),
            label: "paper".into(),
        }])
    }

    async fn list_files(&self, workspace: &WorkspaceName) -> Result<FileListing, BackendError> {
        self.record("list_files", workspace)?;
        Ok(FileListing {
            source_document: Some("paper.pdf".into()),
            artifacts: vec!["paper_origin.md".into()],
        })
    }

    async fn fetch_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
    ) -> Result<String, BackendError> {
        self.record("fetch_artifact", format!("{workspace}/{file_name}"))?;
        self.fetch_times.lock().unwrap().push(Instant::now());
        let mut remaining = self.artifact_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(BackendError::new(FailureKind::HttpStatus(404), "not yet"));
        }
        Ok(self.artifact_text.clone())
    }

    async fn save_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
        _content: &str,
    ) -> Result<(), BackendError> {
        self.record("save_artifact", format!("{workspace}/{file_name}"))
    }

    async fn delete_artifact(
        &self,
        workspace: &WorkspaceName,
        variant: Variant,
    ) -> Result<(), BackendError> {
        self.record("delete_artifact", format!("{workspace}/{variant}"))
    }

    async fn delete_workspace(&self, workspace: &WorkspaceName) -> Result<(), BackendError> {
        self.record("delete_workspace", workspace)
    }

    async fn download_workspace(&self, workspace: &WorkspaceName) -> Result<Bytes, BackendError> {
        self.record("download_workspace", workspace)?;
        Ok(Bytes::from_static(b"PK\x05\x06"))
    }

    async fn open_job(&self, request: &JobRequest) -> Result<ByteStream, BackendError> {
        self.record("open_job", request.kind())?;
        let chunks = self
            .job_chunks
            .iter()
            .cloned()
            .map(|chunk| chunk.map(Bytes::from))
            .collect::<Vec<_>>();
        Ok(stream::iter(chunks).boxed())
    }

    async fn initialize_agent(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<AgentContext, BackendError> {
        self.record("initialize_agent", workspace)?;
        Ok(AgentContext::default())
    }

    async fn list_sessions(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<Vec<SessionSummary>, BackendError> {
        self.record("list_sessions", workspace)?;
        Ok(Vec::new())
    }

    async fn load_history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, BackendError> {
        self.record("load_history", session)?;
        Ok(Vec::new())
    }

    async fn create_session(&self, workspace: &WorkspaceName) -> Result<SessionId, BackendError> {
        self.record("create_session", workspace)?;
        let mut next = self.next_session.lock().unwrap();
        *next += 1;
        Ok(SessionId::new(next.to_string()))
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError> {
        self.record("delete_session", session)
    }

    async fn bulk_save(
        &self,
        session: &SessionId,
        messages: &[(String, String)],
    ) -> Result<(), BackendError> {
        self.record("bulk_save", format!("{session} {}", messages.len()))?;
        self.saved_history
            .lock()
            .unwrap()
            .extend(messages.iter().cloned());
        Ok(())
    }

    async fn agent_turn(
        &self,
        session: &SessionId,
        _user_input: &str,
        agent: &AgentContext,
    ) -> Result<(String, AgentContext), BackendError> {
        self.record("agent_turn", session)?;
        let mut updated = agent.clone();
        updated.messages.push(serde_json::json!({ "role": "assistant" }));
        Ok(("answer".to_string(), updated))
    }

    fn content_url(&self, workspace: &WorkspaceName, file_name: &str) -> String {
        format!("http://fake/contents/{workspace}/{file_name}")
    }
}
