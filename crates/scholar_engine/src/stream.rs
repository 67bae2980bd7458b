use futures_util::StreamExt;

use engine_logging::{engine_info, engine_warn};
use scholar_core::{ContextTag, FrameDecoder, JobRequest, RunId, StreamFrame};

use crate::backend::{Backend, EventSink};
use crate::{BackendError, ClientSettings, EngineEvent};

/// Drives one job run: opens the stream, forwards decoded frames in arrival
/// order and reports the closure of the transport.
pub async fn run_job(
    backend: &dyn Backend,
    settings: &ClientSettings,
    tag: ContextTag,
    run: RunId,
    request: JobRequest,
    sink: &dyn EventSink,
) {
    let result = forward_frames(backend, settings, tag, run, &request, sink).await;
    match &result {
        Ok(()) => engine_info!("{} run {} closed", request.kind(), run),
        Err(err) => engine_warn!("{} run {} failed: {}", request.kind(), run, err),
    }
    sink.emit(EngineEvent::JobClosed { tag, run, result });
}

async fn forward_frames(
    backend: &dyn Backend,
    settings: &ClientSettings,
    tag: ContextTag,
    run: RunId,
    request: &JobRequest,
    sink: &dyn EventSink,
) -> Result<(), BackendError> {
    let mut stream = backend.open_job(request).await?;
    let mut decoder = FrameDecoder::new();
    let emit = |frames: Vec<StreamFrame>| {
        if frames.is_empty() {
            return;
        }
        let frames = frames
            .into_iter()
            .map(|frame| scope_frame(settings, frame))
            .collect();
        sink.emit(EngineEvent::JobFrames { tag, run, frames });
    };

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        emit(decoder.push(&chunk));
    }
    emit(decoder.finish());

    if decoder.dropped() > 0 {
        engine_warn!("Run {} dropped {} malformed frames", run, decoder.dropped());
    }
    Ok(())
}

/// Reported workspaces are tenant-scoped paths; the client works with bare
/// names.
fn scope_frame(settings: &ClientSettings, mut frame: StreamFrame) -> StreamFrame {
    if let Some(reported) = frame.metadata.workspace.take() {
        frame.metadata.workspace = Some(settings.strip_tenant(&reported).to_string());
    }
    frame
}
