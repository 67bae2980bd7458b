use std::fmt;
use std::path::PathBuf;

use crate::frame::{StreamFrame, TokenMarker};
use crate::{Variant, WorkspaceName};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobKind {
    Ingest,
    Translate,
    Explain,
    Threadify,
}

impl JobKind {
    /// Artifact a successful run of this kind produces.
    pub fn variant(self) -> Variant {
        match self {
            JobKind::Ingest => Variant::Origin,
            JobKind::Translate => Variant::Trans,
            JobKind::Explain => Variant::Explain,
            JobKind::Threadify => Variant::Thread,
        }
    }

    pub fn for_variant(variant: Variant) -> Option<JobKind> {
        match variant {
            Variant::Origin => None,
            Variant::Trans => Some(JobKind::Translate),
            Variant::Explain => Some(JobKind::Explain),
            Variant::Thread => Some(JobKind::Threadify),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobKind::Ingest => "ingest",
            JobKind::Translate => "translate",
            JobKind::Explain => "explain",
            JobKind::Threadify => "threadify",
        };
        f.write_str(label)
    }
}

/// Source of a new ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Url(String),
}

/// What a run is dispatched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Ingest(DocumentSource),
    Derive {
        kind: JobKind,
        workspace: WorkspaceName,
    },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Ingest(_) => JobKind::Ingest,
            JobRequest::Derive { kind, .. } => *kind,
        }
    }

    /// Workspace the run operates on; `None` for an ingestion that creates one.
    pub fn target(&self) -> Option<&WorkspaceName> {
        match self {
            JobRequest::Ingest(_) => None,
            JobRequest::Derive { workspace, .. } => Some(workspace),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Resolving,
    Ready,
    Failed,
}

impl JobPhase {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobPhase::Submitting | JobPhase::Streaming | JobPhase::Resolving
        )
    }

    /// Phases in which stream frames are still accepted.
    fn accepts_frames(self) -> bool {
        matches!(self, JobPhase::Submitting | JobPhase::Streaming)
    }
}

/// How a closed stream settles the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamClosure {
    /// Fetch the listing of this workspace next.
    Resolve(WorkspaceName),
    Failed(String),
    /// The run had already failed; nothing more to do.
    AlreadyFailed,
}

/// State of one job run, driven by decoded frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    id: RunId,
    kind: JobKind,
    target: Option<WorkspaceName>,
    phase: JobPhase,
    status_text: String,
    output: String,
    generating: bool,
    reported_workspace: Option<WorkspaceName>,
    base_name: Option<String>,
    translation_exists: Option<bool>,
    error: Option<String>,
}

impl JobRun {
    pub fn new(id: RunId, kind: JobKind, target: Option<WorkspaceName>) -> Self {
        Self {
            id,
            kind,
            target,
            phase: JobPhase::Submitting,
            status_text: String::new(),
            output: String::new(),
            generating: false,
            reported_workspace: None,
            base_name: None,
            translation_exists: None,
            error: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn target(&self) -> Option<&WorkspaceName> {
        self.target.as_ref()
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    pub fn translation_exists(&self) -> Option<bool> {
        self.translation_exists
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Workspace the run settles into: the reported one, else the target.
    pub fn workspace(&self) -> Option<&WorkspaceName> {
        self.reported_workspace.as_ref().or(self.target.as_ref())
    }

    /// Applies one frame. Returns false when the frame was ignored because
    /// the run no longer accepts frames.
    pub fn apply_frame(&mut self, frame: StreamFrame) -> bool {
        if !self.phase.accepts_frames() {
            return false;
        }
        self.phase = JobPhase::Streaming;

        if let Some(message) = frame.error {
            self.fail(message);
            return true;
        }

        if let Some(status) = frame.status {
            self.status_text = status;
        }

        match frame.token {
            Some(TokenMarker::Begin) => {
                self.output.clear();
                self.generating = true;
            }
            Some(TokenMarker::Content(text)) => {
                if self.generating {
                    self.output.push_str(&text);
                }
            }
            Some(TokenMarker::End) => {
                if self.generating {
                    self.generating = false;
                    self.status_text.clear();
                }
            }
            None => {}
        }

        let metadata = frame.metadata;
        if let Some(workspace) = metadata.workspace {
            self.reported_workspace = Some(WorkspaceName::new(workspace));
        }
        if let Some(base_name) = metadata.base_name {
            self.base_name = Some(base_name);
        }
        if let Some(exists) = metadata.translation_exists {
            self.translation_exists = Some(exists);
        }
        true
    }

    /// Settles the stream once the transport has closed.
    pub fn close_stream(&mut self, transport: Result<(), String>) -> StreamClosure {
        if self.phase == JobPhase::Failed {
            return StreamClosure::AlreadyFailed;
        }
        if let Err(message) = transport {
            self.fail(message.clone());
            return StreamClosure::Failed(message);
        }
        if !self.phase.accepts_frames() {
            return StreamClosure::AlreadyFailed;
        }
        match self.workspace().cloned() {
            Some(workspace) => {
                self.phase = JobPhase::Resolving;
                self.generating = false;
                StreamClosure::Resolve(workspace)
            }
            None => {
                let message = "server did not report a workspace for the run".to_string();
                self.fail(message.clone());
                StreamClosure::Failed(message)
            }
        }
    }

    /// The resolved artifact is on display.
    pub fn settle(&mut self) {
        if self.phase == JobPhase::Resolving {
            self.phase = JobPhase::Ready;
            self.status_text.clear();
        }
    }

    /// Moves to the absorbing failure state and clears progress indicators.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.phase == JobPhase::Failed || self.phase == JobPhase::Ready {
            return;
        }
        self.phase = JobPhase::Failed;
        self.generating = false;
        self.status_text.clear();
        self.error = Some(message.into());
    }
}
