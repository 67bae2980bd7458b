mod common;

use std::time::Duration;

use common::{init_logging, FakeBackend};
use scholar_core::{ContextTag, Effect, ListingFollowUp, Variant};
use scholar_engine::{ClientSettings, EngineEvent, EngineHandle};

fn next_event(engine: &EngineHandle) -> EngineEvent {
    engine
        .recv_timeout(Duration::from_secs(5))
        .expect("engine running")
        .expect("engine event")
}

#[test]
fn effects_are_executed_and_reported_with_their_tag() {
    init_logging();
    let backend = FakeBackend {
        artifact_text: "# Paper".into(),
        ..FakeBackend::default()
    }
    .shared();
    let engine = EngineHandle::with_backend(backend.clone(), ClientSettings::default()).unwrap();

    engine.execute(Effect::ListFiles {
        tag: ContextTag(4),
        workspace: "ws".into(),
        follow_up: ListingFollowUp::OpenWorkspace,
    });
    match next_event(&engine) {
        EngineEvent::FilesListed {
            tag,
            follow_up,
            result: Ok(listing),
            ..
        } => {
            assert_eq!(tag, ContextTag(4));
            assert_eq!(follow_up, ListingFollowUp::OpenWorkspace);
            assert_eq!(listing.base_name(), Some("paper"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.execute(Effect::ResolveArtifact {
        tag: ContextTag(4),
        workspace: "ws".into(),
        base_name: "paper".into(),
        variant: Variant::Origin,
    });
    assert_eq!(
        next_event(&engine),
        EngineEvent::ArtifactResolved {
            tag: ContextTag(4),
            variant: Variant::Origin,
            result: Ok("# Paper".into()),
        }
    );
    assert!(engine.try_recv().is_none());
}

#[test]
fn download_writes_archive_into_directory() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine =
        EngineHandle::with_backend(FakeBackend::default().shared(), ClientSettings::default())
            .unwrap();

    engine.execute(Effect::DownloadWorkspace {
        workspace: "2024_paper".into(),
        destination: dir.path().to_path_buf(),
    });
    match next_event(&engine) {
        EngineEvent::WorkspaceDownloaded {
            result: Ok(path), ..
        } => {
            assert_eq!(path, dir.path().join("2024_paper.zip"));
            assert_eq!(std::fs::read(path).unwrap(), b"PK\x05\x06");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn panicking_effect_still_reports_completion() {
    init_logging();
    let backend = FakeBackend {
        panicking: Some("list_workspaces"),
        ..FakeBackend::default()
    }
    .shared();
    let engine = EngineHandle::with_backend(backend, ClientSettings::default()).unwrap();

    assert!(engine.execute(Effect::ListWorkspaces));
    let event = next_event(&engine);
    assert!(event.is_terminal());
    match event {
        EngineEvent::EffectAborted { effect, reason } => {
            assert_eq!(effect, "ListWorkspaces");
            assert!(reason.contains("panicked"), "{reason}");
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(engine.execute(Effect::ListFiles {
        tag: ContextTag(1),
        workspace: "ws".into(),
        follow_up: ListingFollowUp::Refresh,
    }));
    assert!(matches!(
        next_event(&engine),
        EngineEvent::FilesListed { result: Ok(_), .. }
    ));
}
