use engine_logging::{engine_debug, engine_info};

use crate::state::RunKey;
use crate::{
    AppState, DocumentSource, Effect, FileListing, JobKind, JobPhase, JobRequest, JobRun,
    ListingFollowUp, Msg, SendRejected, StreamClosure, Variant, WorkspaceName,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Results tagged with a context other than the current one are dropped
/// before they touch any state.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    if let Some(tag) = msg.context_tag() {
        if !state.registry.is_current(tag) {
            if let Msg::JobClosed { run, .. } = &msg {
                state.open_runs.remove(run);
            }
            engine_debug!("Discarding stale {} issued for {}", msg.name(), tag);
            return (state, Vec::new());
        }
    }

    let effects = match msg {
        Msg::NoOp => return (state, Vec::new()),
        Msg::NoticeDismissed => {
            state.notice = None;
            Vec::new()
        }
        Msg::EffectAborted { effect, reason } => {
            if effect == "SendChat" {
                state.chat.send_failed();
            }
            state.report(format!("{effect} did not complete: {reason}"));
            Vec::new()
        }

        Msg::RefreshWorkspaces => vec![Effect::ListWorkspaces],
        Msg::WorkspacesListed(Ok(entries)) => {
            state.registry.set_entries(entries);
            Vec::new()
        }
        Msg::WorkspacesListed(Err(err)) => {
            state.report(format!("Failed to list workspaces: {err}"));
            Vec::new()
        }
        Msg::WorkspaceSelected(name) => select_workspace(&mut state, name),
        Msg::DeleteWorkspaceRequested(name) => {
            state.registry.request_delete(name);
            Vec::new()
        }
        Msg::DeleteWorkspaceCancelled => {
            state.registry.cancel_delete();
            Vec::new()
        }
        Msg::DeleteWorkspaceConfirmed => match state.registry.confirm_delete() {
            Some(workspace) => vec![Effect::DeleteWorkspace { workspace }],
            None => Vec::new(),
        },
        Msg::WorkspaceDeleted { workspace, result } => match result {
            Ok(()) => {
                engine_info!("Workspace {} deleted", workspace);
                if state.registry.remove(&workspace).is_some() {
                    state.enter_context();
                }
                vec![Effect::ListWorkspaces]
            }
            Err(err) => {
                state.report(format!("Failed to delete {workspace}: {err}"));
                Vec::new()
            }
        },
        Msg::DownloadRequested { destination } => match state.registry.active() {
            Some(workspace) => vec![Effect::DownloadWorkspace {
                workspace: workspace.clone(),
                destination,
            }],
            None => {
                state.report("No workspace selected");
                Vec::new()
            }
        },
        Msg::WorkspaceDownloaded { workspace, result } => {
            match result {
                Ok(path) => engine_info!("Workspace {} saved to {}", workspace, path.display()),
                Err(err) => state.report(format!("Failed to download {workspace}: {err}")),
            }
            Vec::new()
        }

        Msg::IngestRequested(source) => start_ingest(&mut state, source),
        Msg::DeriveRequested(kind) => start_derive(&mut state, kind),
        Msg::JobFrames { run, frames, .. } => {
            let Some(job) = state.job.as_mut().filter(|job| job.id() == run) else {
                return (state, Vec::new());
            };
            let already_failed = job.phase() == JobPhase::Failed;
            for frame in frames {
                if !job.apply_frame(frame) {
                    break;
                }
            }
            if !already_failed {
                if let Some(error) = job.error().map(ToOwned::to_owned) {
                    let kind = job.kind();
                    state.report(format!("{kind} failed: {error}"));
                }
            }
            Vec::new()
        }
        Msg::JobClosed { tag, run, result } => {
            state.open_runs.remove(&run);
            let Some(job) = state.job.as_mut().filter(|job| job.id() == run) else {
                return (state, Vec::new());
            };
            let kind = job.kind();
            match job.close_stream(result) {
                StreamClosure::Resolve(workspace) => {
                    let mut effects = Vec::new();
                    if kind == JobKind::Ingest {
                        state.registry.adopt(workspace.clone());
                        effects.push(Effect::ListWorkspaces);
                    }
                    state.document.base_name = job.base_name().map(ToOwned::to_owned);
                    effects.push(Effect::ListFiles {
                        tag,
                        workspace,
                        follow_up: ListingFollowUp::SettleRun,
                    });
                    effects
                }
                StreamClosure::Failed(err) => {
                    state.report(format!("{kind} failed: {err}"));
                    Vec::new()
                }
                StreamClosure::AlreadyFailed => Vec::new(),
            }
        }
        Msg::FilesListed {
            workspace,
            follow_up,
            result,
            ..
        } => {
            if state.registry.active() != Some(&workspace) {
                return (state, Vec::new());
            }
            match result {
                Ok(listing) => apply_listing(&mut state, workspace, follow_up, listing),
                Err(err) => {
                    fail_resolution(&mut state, format!("Failed to list {workspace}: {err}"));
                    Vec::new()
                }
            }
        }

        Msg::VariantRequested(variant) => request_variant(&mut state, variant),
        Msg::ArtifactResolved {
            variant, result, ..
        } => {
            if state.document.pending != Some(variant) {
                return (state, Vec::new());
            }
            state.document.pending = None;
            match result {
                Ok(content) => {
                    let document = &mut state.document;
                    document.content = content;
                    document.displayed = Some(variant);
                    document.modified = false;
                    document.error = None;
                    if let Some(job) = state.job.as_mut() {
                        if job.kind().variant() == variant {
                            job.settle();
                        }
                    }
                }
                Err(err) => {
                    state.document.error = Some(err.clone());
                    fail_resolution(&mut state, format!("Failed to load {variant}: {err}"));
                }
            }
            Vec::new()
        }
        Msg::ContentEdited(content) => {
            if state.document.displayed.is_some() && !state.job_active() {
                state.document.content = content;
                state.document.modified = true;
                state.document.revision += 1;
            }
            Vec::new()
        }
        Msg::SaveRequested => save_displayed(&mut state),
        Msg::ArtifactSaved {
            variant,
            revision,
            result,
            ..
        } => {
            match result {
                Ok(()) => {
                    engine_info!("Saved {} artifact at revision {}", variant, revision);
                    if state.document.displayed == Some(variant)
                        && state.document.revision == revision
                    {
                        state.document.modified = false;
                    }
                }
                Err(err) => state.report(format!("Failed to save {variant}: {err}")),
            }
            Vec::new()
        }
        Msg::DeleteVariantRequested(variant) => delete_variant(&mut state, variant),
        Msg::ArtifactDeleted {
            tag,
            variant,
            result,
        } => match (result, state.registry.active().cloned()) {
            (Ok(()), Some(workspace)) => {
                let mut effects = vec![Effect::ListFiles {
                    tag,
                    workspace: workspace.clone(),
                    follow_up: ListingFollowUp::Refresh,
                }];
                if state.document.displayed == Some(variant) {
                    state.document.displayed = None;
                    state.document.content.clear();
                    state.document.modified = false;
                    effects.extend(resolve(&mut state, workspace, Variant::Origin));
                }
                effects
            }
            (Ok(()), None) => Vec::new(),
            (Err(err), _) => {
                state.report(format!("Failed to delete {variant}: {err}"));
                Vec::new()
            }
        },

        Msg::AgentInitialized { result, .. } => {
            match result {
                Ok(agent) => state.chat.set_agent(agent),
                Err(err) => state.report(format!("Failed to initialize the agent: {err}")),
            }
            Vec::new()
        }
        Msg::SessionsListed { result, .. } => {
            match result {
                Ok(sessions) => state.chat.set_sessions(sessions),
                Err(err) => state.report(format!("Failed to list chat sessions: {err}")),
            }
            Vec::new()
        }
        Msg::SessionRestoreRequested(session) => {
            if state.registry.active().is_none() {
                state.report("No workspace selected");
                Vec::new()
            } else if state.chat.is_sending() {
                state.report(SendRejected::Busy.to_string());
                Vec::new()
            } else {
                state.chat.begin_restore(session.clone());
                vec![Effect::LoadSession {
                    tag: state.registry.tag(),
                    session,
                }]
            }
        }
        Msg::SessionHistoryLoaded {
            session, result, ..
        } => {
            match result {
                Ok(messages) => {
                    if !state.chat.history_loaded(&session, messages) {
                        engine_debug!("Ignoring history of session {}", session);
                    }
                }
                Err(err) => {
                    state.chat.history_failed(&session);
                    state.report(format!("Failed to load session {session}: {err}"));
                }
            }
            Vec::new()
        }
        Msg::AttachmentAdded(attachment) => {
            state.chat.attach(attachment);
            Vec::new()
        }
        Msg::AttachmentRemoved(index) => {
            state.chat.remove_attachment(index);
            Vec::new()
        }
        Msg::ChatSubmitted(text) => submit_chat(&mut state, &text),
        Msg::ChatSessionEstablished { session, .. } => {
            state.chat.session_established(session);
            Vec::new()
        }
        Msg::ChatReplied { tag, result } => {
            let refresh = match result {
                Ok(reply) => state.chat.reply_received(reply),
                Err(err) => {
                    let refresh = state.chat.send_failed();
                    state.report(format!("Chat failed: {err}"));
                    refresh
                }
            };
            match state.registry.active() {
                Some(workspace) if refresh => vec![Effect::ListSessions {
                    tag,
                    workspace: workspace.clone(),
                }],
                _ => Vec::new(),
            }
        }
        Msg::ChatReset => match state.registry.active().cloned() {
            None => Vec::new(),
            Some(_) if state.chat.is_sending() => {
                state.report(SendRejected::Busy.to_string());
                Vec::new()
            }
            Some(workspace) => {
                state.chat.reset();
                vec![Effect::InitAgent {
                    tag: state.registry.tag(),
                    workspace,
                }]
            }
        },
    };

    state.mark_dirty();
    (state, effects)
}

fn select_workspace(state: &mut AppState, workspace: WorkspaceName) -> Vec<Effect> {
    let tag = state.registry.select(workspace.clone());
    state.enter_context();
    engine_info!("Selected workspace {} ({})", workspace, tag);
    vec![Effect::ListFiles {
        tag,
        workspace,
        follow_up: ListingFollowUp::OpenWorkspace,
    }]
}

fn start_ingest(state: &mut AppState, source: DocumentSource) -> Vec<Effect> {
    let key = RunKey {
        kind: JobKind::Ingest,
        target: None,
    };
    if state.open_runs.values().any(|open| open == &key) || state.job_active() {
        state.report("Another job is still running");
        return Vec::new();
    }
    let tag = state.registry.clear_selection();
    state.enter_context();
    let run = state.next_run_id();
    state.job = Some(JobRun::new(run, JobKind::Ingest, None));
    state.open_runs.insert(run, key);
    engine_info!("Starting ingest run {} ({})", run, tag);
    vec![Effect::StartJob {
        tag,
        run,
        request: JobRequest::Ingest(source),
    }]
}

fn start_derive(state: &mut AppState, kind: JobKind) -> Vec<Effect> {
    if kind == JobKind::Ingest {
        state.report("Use ingest to add a new document");
        return Vec::new();
    }
    let Some(workspace) = state.registry.active().cloned() else {
        state.report("No workspace selected");
        return Vec::new();
    };
    if state.document.base_name.is_none() {
        state.report(format!("{workspace} has no origin artifact yet"));
        return Vec::new();
    }
    let key = RunKey {
        kind,
        target: Some(workspace.clone()),
    };
    if state.job_active() || state.open_runs.values().any(|open| open == &key) {
        state.report("Another job is still running");
        return Vec::new();
    }

    let run = state.next_run_id();
    state.job = Some(JobRun::new(run, kind, Some(workspace.clone())));
    state.open_runs.insert(run, key);
    state.document.pending = None;
    state.document.modified = false;
    engine_info!("Starting {} run {} on {}", kind, run, workspace);
    vec![Effect::StartJob {
        tag: state.registry.tag(),
        run,
        request: JobRequest::Derive { kind, workspace },
    }]
}

fn apply_listing(
    state: &mut AppState,
    workspace: WorkspaceName,
    follow_up: ListingFollowUp,
    listing: FileListing,
) -> Vec<Effect> {
    let base_name = listing
        .base_name()
        .map(ToOwned::to_owned)
        .or_else(|| state.document.base_name.clone());
    let Some(base_name) = base_name else {
        fail_resolution(state, format!("{workspace} has no origin artifact"));
        return Vec::new();
    };
    if listing.source_document.is_none() {
        fail_resolution(state, format!("{workspace} has no source document"));
        return Vec::new();
    }
    state.document.listing = Some(listing);
    state.document.base_name = Some(base_name);

    let tag = state.registry.tag();
    match follow_up {
        ListingFollowUp::Refresh => Vec::new(),
        ListingFollowUp::OpenWorkspace => {
            let mut effects = resolve(state, workspace.clone(), Variant::Origin);
            effects.extend(open_conversation(tag, workspace));
            effects
        }
        ListingFollowUp::SettleRun => {
            let Some(kind) = state
                .job
                .as_ref()
                .filter(|job| job.phase() == JobPhase::Resolving)
                .map(JobRun::kind)
            else {
                return Vec::new();
            };
            let mut effects = resolve(state, workspace.clone(), kind.variant());
            if kind == JobKind::Ingest {
                effects.extend(open_conversation(tag, workspace));
            }
            effects
        }
    }
}

fn open_conversation(tag: crate::ContextTag, workspace: WorkspaceName) -> Vec<Effect> {
    vec![
        Effect::InitAgent {
            tag,
            workspace: workspace.clone(),
        },
        Effect::ListSessions { tag, workspace },
    ]
}

fn resolve(state: &mut AppState, workspace: WorkspaceName, variant: Variant) -> Vec<Effect> {
    let Some(base_name) = state.document.base_name.clone() else {
        return Vec::new();
    };
    state.document.pending = Some(variant);
    vec![Effect::ResolveArtifact {
        tag: state.registry.tag(),
        workspace,
        base_name,
        variant,
    }]
}

/// Listing or artifact resolution failed: report it and fail a resolving run.
fn fail_resolution(state: &mut AppState, message: String) {
    if let Some(job) = state.job.as_mut() {
        job.fail(message.clone());
    }
    state.report(message);
}

fn request_variant(state: &mut AppState, variant: Variant) -> Vec<Effect> {
    let Some(workspace) = state.registry.active().cloned() else {
        state.report("No workspace selected");
        return Vec::new();
    };
    if state.job_active() {
        state.report("Another job is still running");
        return Vec::new();
    }
    let available = state
        .document
        .listing
        .as_ref()
        .is_some_and(|listing| listing.has(variant));
    if !available {
        state.report(format!("{variant} is not available for {workspace}"));
        return Vec::new();
    }
    state.job = None;
    resolve(state, workspace, variant)
}

fn save_displayed(state: &mut AppState) -> Vec<Effect> {
    let (Some(workspace), Some(variant), Some(base_name)) = (
        state.registry.active().cloned(),
        state.document.displayed,
        state.document.base_name.clone(),
    ) else {
        state.report("Nothing to save");
        return Vec::new();
    };
    vec![Effect::SaveArtifact {
        tag: state.registry.tag(),
        workspace,
        variant,
        file_name: variant.file_name(&base_name),
        content: state.document.content.clone(),
        revision: state.document.revision,
    }]
}

fn delete_variant(state: &mut AppState, variant: Variant) -> Vec<Effect> {
    if variant == Variant::Origin {
        state.report("The origin artifact cannot be deleted");
        return Vec::new();
    }
    let Some(workspace) = state.registry.active().cloned() else {
        state.report("No workspace selected");
        return Vec::new();
    };
    if state.job_active() {
        state.report("Another job is still running");
        return Vec::new();
    }
    vec![Effect::DeleteArtifact {
        tag: state.registry.tag(),
        workspace,
        variant,
    }]
}

fn submit_chat(state: &mut AppState, text: &str) -> Vec<Effect> {
    let Some(workspace) = state.registry.active().cloned() else {
        state.report("No workspace selected");
        return Vec::new();
    };
    match state.chat.begin_send(text) {
        Ok((plan, turn)) => vec![Effect::SendChat {
            tag: state.registry.tag(),
            workspace,
            plan,
            turn,
        }],
        Err(SendRejected::Empty) => Vec::new(),
        Err(rejected) => {
            state.report(rejected.to_string());
            Vec::new()
        }
    }
}
