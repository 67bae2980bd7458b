//! Scholar core: pure client state machine, stream frame decoding and the
//! view model the front-ends render.
mod artifact;
mod chat;
mod effect;
mod frame;
mod job;
mod msg;
mod state;
mod update;
mod view_model;
mod workspace;

pub use artifact::{FileListing, Variant};
pub use chat::{
    AgentContext, ChatMessage, ChatReply, ChatRole, ChatSessionCoordinator, ChatTurn,
    MessageKind, PendingAttachment, SendRejected, SessionId, SessionPlan, SessionSummary,
};
pub use effect::{Effect, ListingFollowUp};
pub use frame::{
    decode_all, FrameDecoder, FrameMetadata, StreamFrame, TokenMarker, FRAME_DELIMITER,
    FRAME_PREFIX, GENERATION_BEGIN, GENERATION_END,
};
pub use job::{
    DocumentSource, JobKind, JobPhase, JobRequest, JobRun, RunId, StreamClosure,
};
pub use msg::Msg;
pub use state::AppState;
pub use update::update;
pub use view_model::{AppViewModel, ChatView, DocumentView, JobView};
pub use workspace::{display_label, ContextTag, WorkspaceEntry, WorkspaceName, WorkspaceRegistry};
