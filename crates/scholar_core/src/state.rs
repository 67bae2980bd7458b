use std::collections::BTreeMap;

use engine_logging::engine_warn;

use crate::view_model::{AppViewModel, ChatView, DocumentView, JobView};
use crate::{
    ChatSessionCoordinator, FileListing, JobKind, JobRun, RunId, Variant, WorkspaceName,
    WorkspaceRegistry,
};

/// Document pane of the active workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct DocumentState {
    pub(crate) listing: Option<FileListing>,
    pub(crate) base_name: Option<String>,
    pub(crate) displayed: Option<Variant>,
    /// Variant whose content is being fetched; only its result is applied.
    pub(crate) pending: Option<Variant>,
    pub(crate) content: String,
    pub(crate) modified: bool,
    /// Bumped on every user edit; a save only clears `modified` for the
    /// revision it wrote.
    pub(crate) revision: u64,
    pub(crate) error: Option<String>,
}

/// Identity of a run for single-flight checks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RunKey {
    pub(crate) kind: JobKind,
    pub(crate) target: Option<WorkspaceName>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub(crate) registry: WorkspaceRegistry,
    pub(crate) job: Option<JobRun>,
    pub(crate) open_runs: BTreeMap<RunId, RunKey>,
    pub(crate) document: DocumentState,
    pub(crate) chat: ChatSessionCoordinator,
    pub(crate) notice: Option<String>,
    next_run_id: RunId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    pub fn chat(&self) -> &ChatSessionCoordinator {
        &self.chat
    }

    pub fn job(&self) -> Option<&JobRun> {
        self.job.as_ref()
    }

    /// Whether any dispatched run has not reported its closure yet.
    pub fn has_open_runs(&self) -> bool {
        !self.open_runs.is_empty()
    }

    pub fn view(&self) -> AppViewModel {
        let job = self.job.as_ref().map(|run| JobView {
            run: run.id(),
            kind: run.kind(),
            phase: run.phase(),
            status_text: run.status_text().to_string(),
            output: run.output().to_string(),
            generating: run.is_generating(),
            error: run.error().map(ToOwned::to_owned),
        });
        let job_active = self.job_active();

        let viewable = self.viewable();
        let derivable = if self.registry.active().is_some()
            && self.document.base_name.is_some()
            && !job_active
        {
            [JobKind::Translate, JobKind::Explain, JobKind::Threadify]
                .into_iter()
                .filter(|kind| !viewable.contains(&kind.variant()))
                .collect()
        } else {
            Vec::new()
        };

        let content = match &self.job {
            Some(run) if run.phase().is_active() => run.output().to_string(),
            _ => self.document.content.clone(),
        };

        AppViewModel {
            workspaces: self.registry.entries().to_vec(),
            active_workspace: self.registry.active().cloned(),
            pending_delete: self.registry.pending_delete().cloned(),
            context: self.registry.tag(),
            job,
            document: DocumentView {
                source_document: self
                    .document
                    .listing
                    .as_ref()
                    .and_then(|listing| listing.source_document.clone()),
                base_name: self.document.base_name.clone(),
                variant: self.document.displayed,
                content,
                modified: self.document.modified,
                loading: self.document.pending.is_some(),
                error: self.document.error.clone(),
                viewable,
                derivable,
            },
            chat: ChatView {
                sessions: self.chat.sessions().to_vec(),
                live_session: self.chat.live_session().cloned(),
                restored_session: self.chat.restored_session().cloned(),
                messages: self.chat.messages().to_vec(),
                attachments: self
                    .chat
                    .pending_attachments()
                    .iter()
                    .map(|attachment| attachment.reference.clone())
                    .collect(),
                sending: self.chat.is_sending(),
                loading_history: self.chat.is_loading_history(),
                agent_ready: self.chat.agent().is_some(),
            },
            notice: self.notice.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn job_active(&self) -> bool {
        self.job
            .as_ref()
            .is_some_and(|run| run.phase().is_active())
    }

    pub(crate) fn next_run_id(&mut self) -> RunId {
        self.next_run_id += 1;
        self.next_run_id
    }

    /// Drops everything tied to the previous workspace context.
    pub(crate) fn enter_context(&mut self) {
        self.job = None;
        self.document = DocumentState::default();
        self.chat.clear();
        self.notice = None;
    }

    /// Surfaces a user-visible problem.
    pub(crate) fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        engine_warn!("{}", message);
        self.notice = Some(message);
    }

    /// Variants that can be displayed. Before the first listing of a run's
    /// workspace arrives, the stream's translation hint stands in for it.
    fn viewable(&self) -> Vec<Variant> {
        if let Some(listing) = &self.document.listing {
            return listing.available();
        }
        match self.job.as_ref().and_then(JobRun::translation_exists) {
            Some(true) => vec![Variant::Origin, Variant::Trans],
            _ => Vec::new(),
        }
    }
}
