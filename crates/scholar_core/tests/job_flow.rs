use std::sync::Once;

use pretty_assertions::assert_eq;
use scholar_core::{
    update, AppState, ContextTag, DocumentSource, Effect, FileListing, FrameMetadata, JobKind,
    JobPhase, JobRequest, ListingFollowUp, Msg, RunId, StreamFrame, TokenMarker, Variant,
    WorkspaceName,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn start_ingest(state: AppState) -> (AppState, ContextTag, RunId) {
    let (state, effects) = update(
        state,
        Msg::IngestRequested(DocumentSource::Url("https://arxiv.org/pdf/1234".into())),
    );
    match &effects[..] {
        [Effect::StartJob {
            tag,
            run,
            request: JobRequest::Ingest(_),
        }] => {
            let (tag, run) = (*tag, *run);
            (state, tag, run)
        }
        other => panic!("unexpected effects {other:?}"),
    }
}

fn frames(tag: ContextTag, run: RunId, frames: Vec<StreamFrame>) -> Msg {
    Msg::JobFrames { tag, run, frames }
}

fn workspace_frame(name: &str, base: &str) -> StreamFrame {
    StreamFrame {
        metadata: FrameMetadata {
            workspace: Some(name.into()),
            base_name: Some(base.into()),
            translation_exists: None,
        },
        ..StreamFrame::default()
    }
}

#[test]
fn ingest_streams_then_adopts_and_resolves_origin() {
    init_logging();
    let (state, tag, run) = start_ingest(AppState::new());
    assert_eq!(state.view().active_workspace, None);
    assert_eq!(state.view().job.unwrap().phase, JobPhase::Submitting);

    let (state, _) = update(
        state,
        frames(
            tag,
            run,
            vec![
                StreamFrame::status("Converting PDF"),
                StreamFrame::token(TokenMarker::Begin),
                StreamFrame::token(TokenMarker::Content("# Title".into())),
            ],
        ),
    );
    let view = state.view();
    let job = view.job.clone().unwrap();
    assert_eq!(job.phase, JobPhase::Streaming);
    assert_eq!(job.status_text, "Converting PDF");
    assert!(job.generating);
    assert_eq!(view.document.content, "# Title");

    let (state, _) = update(
        state,
        frames(
            tag,
            run,
            vec![
                StreamFrame::token(TokenMarker::End),
                workspace_frame("20240101_paper", "paper"),
            ],
        ),
    );
    let (state, effects) = update(
        state,
        Msg::JobClosed {
            tag,
            run,
            result: Ok(()),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::ListWorkspaces,
            Effect::ListFiles {
                tag,
                workspace: "20240101_paper".into(),
                follow_up: ListingFollowUp::SettleRun,
            },
        ]
    );
    let view = state.view();
    assert_eq!(
        view.active_workspace,
        Some(WorkspaceName::from("20240101_paper"))
    );
    assert_eq!(view.context, tag);
    assert_eq!(view.workspaces[0].label, "paper");
    assert_eq!(view.job.unwrap().phase, JobPhase::Resolving);

    let (state, effects) = update(
        state,
        Msg::FilesListed {
            tag,
            workspace: "20240101_paper".into(),
            follow_up: ListingFollowUp::SettleRun,
            result: Ok(FileListing {
                source_document: Some("paper.pdf".into()),
                artifacts: vec!["paper_origin.md".into()],
            }),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::ResolveArtifact {
                tag,
                workspace: "20240101_paper".into(),
                base_name: "paper".into(),
                variant: Variant::Origin,
            },
            Effect::InitAgent {
                tag,
                workspace: "20240101_paper".into(),
            },
            Effect::ListSessions {
                tag,
                workspace: "20240101_paper".into(),
            },
        ]
    );

    let (state, _) = update(
        state,
        Msg::ArtifactResolved {
            tag,
            variant: Variant::Origin,
            result: Ok("# Title\n\nBody".into()),
        },
    );
    let view = state.view();
    assert_eq!(view.job.unwrap().phase, JobPhase::Ready);
    assert_eq!(view.document.variant, Some(Variant::Origin));
    assert_eq!(view.document.content, "# Title\n\nBody");
    assert!(!view.document.modified);
    assert!(!state.has_open_runs());
}

#[test]
fn second_ingest_is_rejected_while_one_is_open() {
    init_logging();
    let (state, _, _) = start_ingest(AppState::new());
    let (state, effects) = update(
        state,
        Msg::IngestRequested(DocumentSource::File("paper.pdf".into())),
    );
    assert!(effects.is_empty());
    assert!(state.view().notice.is_some());
}

#[test]
fn error_frame_fails_the_run_and_reports() {
    init_logging();
    let (state, tag, run) = start_ingest(AppState::new());
    let (state, _) = update(
        state,
        frames(
            tag,
            run,
            vec![
                StreamFrame::status("Uploading"),
                StreamFrame::token(TokenMarker::Begin),
                StreamFrame::error("unsupported file"),
                StreamFrame::status("ignored"),
            ],
        ),
    );
    let view = state.view();
    let job = view.job.unwrap();
    assert_eq!(job.phase, JobPhase::Failed);
    assert_eq!(job.status_text, "");
    assert!(!job.generating);
    assert_eq!(job.error.as_deref(), Some("unsupported file"));
    assert!(view.notice.unwrap().contains("unsupported file"));

    let (state, _) = update(state, Msg::NoticeDismissed);
    let (state, _) = update(
        state,
        frames(tag, run, vec![StreamFrame::error("unsupported file")]),
    );
    assert_eq!(state.view().notice, None);

    let (state, effects) = update(
        state,
        Msg::JobClosed {
            tag,
            run,
            result: Ok(()),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.has_open_runs());
}

#[test]
fn transport_failure_fails_the_run() {
    init_logging();
    let (state, tag, run) = start_ingest(AppState::new());
    let (state, effects) = update(
        state,
        Msg::JobClosed {
            tag,
            run,
            result: Err("connection reset".into()),
        },
    );
    assert!(effects.is_empty());
    let job = state.view().job.unwrap();
    assert_eq!(job.phase, JobPhase::Failed);
    assert_eq!(job.error.as_deref(), Some("connection reset"));
}

#[test]
fn translation_hint_offers_translation_before_listing() {
    init_logging();
    let (state, tag, run) = start_ingest(AppState::new());
    let hint = StreamFrame {
        metadata: FrameMetadata {
            translation_exists: Some(true),
            ..FrameMetadata::default()
        },
        ..StreamFrame::default()
    };
    let (state, _) = update(state, frames(tag, run, vec![hint]));
    assert_eq!(
        state.view().document.viewable,
        vec![Variant::Origin, Variant::Trans]
    );
}

#[test]
fn derive_run_is_single_flight_per_workspace() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::WorkspaceSelected("ws".into()));
    let tag = state.view().context;
    let (state, _) = update(
        state,
        Msg::FilesListed {
            tag,
            workspace: "ws".into(),
            follow_up: ListingFollowUp::OpenWorkspace,
            result: Ok(FileListing {
                source_document: Some("paper.pdf".into()),
                artifacts: vec!["paper_origin.md".into()],
            }),
        },
    );

    let (state, effects) = update(state, Msg::DeriveRequested(JobKind::Translate));
    assert_eq!(effects.len(), 1);
    let (state, effects) = update(state, Msg::DeriveRequested(JobKind::Translate));
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::DeriveRequested(JobKind::Threadify));
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::JobClosed {
            tag,
            run: 1,
            result: Err("server closed".into()),
        },
    );
    assert!(effects.is_empty());
    let (_state, effects) = update(state, Msg::DeriveRequested(JobKind::Translate));
    assert_eq!(
        effects,
        vec![Effect::StartJob {
            tag,
            run: 2,
            request: JobRequest::Derive {
                kind: JobKind::Translate,
                workspace: "ws".into(),
            },
        }]
    );
}

#[test]
fn ingest_cannot_be_started_as_a_derive_run() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::DeriveRequested(JobKind::Ingest));
    assert!(effects.is_empty());
    assert!(state.view().notice.is_some());
}
