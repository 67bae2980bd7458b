use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use engine_logging::{engine_debug, engine_info, engine_warn};
use scholar_core::Effect;

use crate::backend::{Backend, ChannelSink, EventSink};
use crate::chat::execute_send;
use crate::persist::{archive_path, write_atomically};
use crate::resolver::ArtifactResolver;
use crate::stream::run_job;
use crate::{BackendError, ClientSettings, EngineEvent, FailureKind, HttpBackend};

/// The engine thread is gone; no further events will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine stopped")]
pub struct EngineStopped;

/// Executes effects on a background tokio runtime and hands results back
/// over a channel. Effects run concurrently; nothing is cancelled. Every
/// accepted effect yields exactly one terminal event, `EffectAborted` if its
/// task panicked.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Effect>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, BackendError> {
        let backend = HttpBackend::new(settings.clone())?;
        Self::with_backend(Arc::new(backend), settings)
    }

    pub fn with_backend(
        backend: Arc<dyn Backend>,
        settings: ClientSettings,
    ) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| BackendError::new(FailureKind::Io, err.to_string()))?;
        let (cmd_tx, cmd_rx) = mpsc::channel::<Effect>();
        let (event_tx, event_rx) = mpsc::channel();
        let settings = Arc::new(settings);

        thread::spawn(move || {
            while let Ok(effect) = cmd_rx.recv() {
                let name = effect.name();
                let backend = backend.clone();
                let settings = settings.clone();
                let sink = ChannelSink::new(event_tx.clone());
                let task = runtime.spawn(async move {
                    handle_effect(backend.as_ref(), &settings, effect, &sink).await;
                });
                let supervisor = ChannelSink::new(event_tx.clone());
                runtime.spawn(async move {
                    if let Err(err) = task.await {
                        engine_warn!("{} did not complete: {}", name, err);
                        supervisor.emit(EngineEvent::EffectAborted {
                            effect: name,
                            reason: err.to_string(),
                        });
                    }
                });
            }
            engine_debug!("Engine command channel closed");
        });

        Ok(Self { cmd_tx, event_rx })
    }

    /// Queues `effect`. Returns false if the engine thread is gone, in which
    /// case no event will ever report it.
    pub fn execute(&self, effect: Effect) -> bool {
        let name = effect.name();
        match self.cmd_tx.send(effect) {
            Ok(()) => true,
            Err(_) => {
                engine_warn!("Dropping {}: {}", name, EngineStopped);
                false
            }
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Waits for the next event. `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineEvent>, EngineStopped> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EngineStopped),
        }
    }
}

async fn handle_effect(
    backend: &dyn Backend,
    settings: &ClientSettings,
    effect: Effect,
    sink: &dyn EventSink,
) {
    let event = match effect {
        Effect::ListWorkspaces => EngineEvent::WorkspacesListed(backend.list_workspaces().await),
        Effect::StartJob { tag, run, request } => {
            run_job(backend, settings, tag, run, request, sink).await;
            return;
        }
        Effect::ListFiles {
            tag,
            workspace,
            follow_up,
        } => {
            let result = backend.list_files(&workspace).await;
            EngineEvent::FilesListed {
                tag,
                workspace,
                follow_up,
                result,
            }
        }
        Effect::ResolveArtifact {
            tag,
            workspace,
            base_name,
            variant,
        } => {
            let resolver = ArtifactResolver::new(backend, settings.retry);
            let result = resolver.resolve(&workspace, &base_name, variant).await;
            EngineEvent::ArtifactResolved {
                tag,
                variant,
                result,
            }
        }
        Effect::SaveArtifact {
            tag,
            workspace,
            variant,
            file_name,
            content,
            revision,
        } => EngineEvent::ArtifactSaved {
            tag,
            variant,
            revision,
            result: backend.save_artifact(&workspace, &file_name, &content).await,
        },
        Effect::DeleteArtifact {
            tag,
            workspace,
            variant,
        } => EngineEvent::ArtifactDeleted {
            tag,
            variant,
            result: backend.delete_artifact(&workspace, variant).await,
        },
        Effect::DeleteWorkspace { workspace } => {
            let result = backend.delete_workspace(&workspace).await;
            EngineEvent::WorkspaceDeleted { workspace, result }
        }
        Effect::DownloadWorkspace {
            workspace,
            destination,
        } => {
            let result = match backend.download_workspace(&workspace).await {
                Ok(archive) => {
                    let target = archive_path(&destination, workspace.as_str());
                    write_atomically(&target, &archive)
                        .map_err(|err| BackendError::new(FailureKind::Io, err.to_string()))
                }
                Err(err) => Err(err),
            };
            if let Ok(path) = &result {
                engine_info!("Saved {} to {}", workspace, path.display());
            }
            EngineEvent::WorkspaceDownloaded { workspace, result }
        }
        Effect::InitAgent { tag, workspace } => EngineEvent::AgentInitialized {
            tag,
            result: backend.initialize_agent(&workspace).await,
        },
        Effect::ListSessions { tag, workspace } => EngineEvent::SessionsListed {
            tag,
            result: backend.list_sessions(&workspace).await,
        },
        Effect::LoadSession { tag, session } => {
            let result = backend.load_history(&session).await;
            EngineEvent::SessionHistoryLoaded {
                tag,
                session,
                result,
            }
        }
        Effect::SendChat {
            tag,
            workspace,
            plan,
            turn,
        } => EngineEvent::ChatReplied {
            tag,
            result: execute_send(backend, tag, &workspace, plan, turn, sink).await,
        },
    };
    sink.emit(event);
}
