use std::fmt::Display;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn, set_context_generation};
use scholar_core::{update, AppState, AppViewModel, Msg};
use scholar_engine::{EngineEvent, EngineHandle};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the core state and feeds it messages, forwarding the resulting
/// effects to the engine and counting those not yet completed.
pub struct Session {
    state: AppState,
    engine: EngineHandle,
    in_flight: usize,
}

impl Session {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            state: AppState::new(),
            engine,
            in_flight: 0,
        }
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    /// Runs one transition. Returns whether the view changed.
    pub fn dispatch(&mut self, msg: Msg) -> bool {
        engine_debug!("Dispatching {}", msg.name());
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        set_context_generation(self.state.registry().tag().0);

        for effect in effects {
            if self.engine.execute(effect) {
                self.in_flight += 1;
            }
        }
        self.state.consume_dirty()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Pumps engine events until every dispatched effect has completed,
    /// including the effects those results trigger. Returns early if the
    /// engine stops.
    pub fn settle(&mut self, mut on_change: impl FnMut(&AppViewModel)) {
        while self.in_flight > 0 {
            let event = match self.engine.recv_timeout(POLL_INTERVAL) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => {
                    engine_warn!("Abandoning {} pending effects: {}", self.in_flight, err);
                    self.in_flight = 0;
                    return;
                }
            };
            if event.is_terminal() {
                self.in_flight -= 1;
            }
            if self.dispatch(event_to_msg(event)) {
                on_change(&self.state.view());
            }
        }
    }
}

fn text<T, E: Display>(result: Result<T, E>) -> Result<T, String> {
    result.map_err(|err| err.to_string())
}

/// Converts an engine result into the core message it reports.
pub fn event_to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::WorkspacesListed(result) => Msg::WorkspacesListed(text(result)),
        EngineEvent::JobFrames { tag, run, frames } => Msg::JobFrames { tag, run, frames },
        EngineEvent::JobClosed { tag, run, result } => Msg::JobClosed {
            tag,
            run,
            result: text(result),
        },
        EngineEvent::FilesListed {
            tag,
            workspace,
            follow_up,
            result,
        } => Msg::FilesListed {
            tag,
            workspace,
            follow_up,
            result: text(result),
        },
        EngineEvent::ArtifactResolved {
            tag,
            variant,
            result,
        } => Msg::ArtifactResolved {
            tag,
            variant,
            result: text(result),
        },
        EngineEvent::ArtifactSaved {
            tag,
            variant,
            revision,
            result,
        } => Msg::ArtifactSaved {
            tag,
            variant,
            revision,
            result: text(result),
        },
        EngineEvent::ArtifactDeleted {
            tag,
            variant,
            result,
        } => Msg::ArtifactDeleted {
            tag,
            variant,
            result: text(result),
        },
        EngineEvent::WorkspaceDeleted { workspace, result } => Msg::WorkspaceDeleted {
            workspace,
            result: text(result),
        },
        EngineEvent::WorkspaceDownloaded { workspace, result } => Msg::WorkspaceDownloaded {
            workspace,
            result: text(result),
        },
        EngineEvent::AgentInitialized { tag, result } => Msg::AgentInitialized {
            tag,
            result: text(result),
        },
        EngineEvent::SessionsListed { tag, result } => Msg::SessionsListed {
            tag,
            result: text(result),
        },
        EngineEvent::SessionHistoryLoaded {
            tag,
            session,
            result,
        } => Msg::SessionHistoryLoaded {
            tag,
            session,
            result: text(result),
        },
        EngineEvent::ChatSessionEstablished { tag, session } => {
            Msg::ChatSessionEstablished { tag, session }
        }
        EngineEvent::ChatReplied { tag, result } => Msg::ChatReplied {
            tag,
            result: text(result),
        },
        EngineEvent::EffectAborted { effect, reason } => Msg::EffectAborted { effect, reason },
    }
}
