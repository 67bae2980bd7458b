//! Scholar engine: HTTP backend, stream runner and effect execution.
mod backend;
mod chat;
mod config;
mod engine;
mod http;
mod persist;
mod resolver;
mod stream;
mod types;

pub use backend::{Backend, ByteStream, ChannelSink, EventSink};
pub use chat::{encode_history, encode_user_input, execute_send};
pub use config::{ClientSettings, RetryPolicy};
pub use engine::{EngineHandle, EngineStopped};
pub use http::HttpBackend;
pub use persist::{archive_path, write_atomically, PersistError};
pub use resolver::{rewrite_image_refs, ArtifactResolver};
pub use stream::run_job;
pub use types::{BackendError, ChatError, ChatStep, EngineEvent, FailureKind, ResolveError};
