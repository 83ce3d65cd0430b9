mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use splice_common::error::ErrorKind;
use splice_common::time::DEFAULT_TIMESCALE;
use splice_export::{CancelHandle, ExportCoordinator, ExportJob, JobState, OperationResult};
use splice_media_model::operation::{EditParams, OperationKind, OperationRequest};
use splice_media_model::plan::CompositionPlan;
use splice_media_model::source::SourceDescriptor;

use support::{hd_clip, Script, ScriptedEngine, Workspace};

fn trim_job(ws: &Workspace) -> (OperationKind, Vec<SourceDescriptor>, CompositionPlan) {
    let source = SourceDescriptor::from_probe(
        ws.input("in.mp4"),
        &hd_clip(8_000),
        DEFAULT_TIMESCALE,
        30.0,
    )
    .unwrap();
    let request = OperationRequest::new(
        EditParams::Trim {
            start_ms: 1_000,
            end_ms: 3_000,
        },
        vec![source],
    );
    let plan = splice_composition::build(&request).unwrap();
    (request.kind(), request.sources, plan)
}

fn coordinator(ws: &Workspace, engine: Arc<ScriptedEngine>) -> ExportCoordinator {
    ExportCoordinator::new(
        engine,
        ws.config.scratch_dir.clone(),
        Duration::from_millis(5),
    )
}

#[tokio::test]
async fn completed_export_leaves_non_empty_output() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Complete { polls: 3 });
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine.clone())
        .start(kind, sources, plan)
        .unwrap();
    let progress = handle.progress();
    let result = handle.wait().await;

    let OperationResult::Completed { path } = result else {
        panic!("expected completion, got {result:?}");
    };
    assert!(path.is_absolute());
    assert!(path.starts_with(&ws.config.scratch_dir));
    assert_eq!(std::fs::read(&path).unwrap(), b"finished output");
    assert_eq!(*progress.borrow(), 1.0);
    assert_eq!(engine.calls.begins(), 1);
}

#[tokio::test]
async fn engine_failure_deletes_partial_output() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Fail {
        polls: 2,
        message: "encoder exploded".to_string(),
    });
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine).start(kind, sources, plan).unwrap();
    let output = handle.output_path().to_path_buf();
    let result = handle.wait().await;

    assert_eq!(
        result,
        OperationResult::Failed {
            kind: ErrorKind::ExportFailed,
            message: "encoder exploded".to_string(),
        }
    );
    assert!(!output.exists());
    assert!(ws.scratch_files().is_empty());
}

#[tokio::test]
async fn cancel_while_running_is_cancelled_without_output() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Hang);
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine.clone())
        .start(kind, sources, plan)
        .unwrap();
    let output = handle.output_path().to_path_buf();

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(handle.state(), JobState::Running);
    handle.cancel();
    handle.cancel();
    let result = handle.wait().await;

    assert_eq!(result, OperationResult::Cancelled);
    assert!(!output.exists());
    assert_eq!(engine.calls.cancels(), 1);
}

#[tokio::test]
async fn cancel_before_start_never_reaches_engine() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Complete { polls: 0 });
    let (kind, sources, plan) = trim_job(&ws);
    let output_path = ws.config.scratch_dir.join("pre-cancelled.mp4");
    std::fs::create_dir_all(&ws.config.scratch_dir).unwrap();

    let cancel = CancelHandle::new();
    cancel.cancel();
    let handle = coordinator(&ws, engine.clone()).start_job(
        ExportJob {
            kind,
            sources,
            plan,
            output_path: output_path.clone(),
        },
        cancel,
    );

    assert_eq!(handle.wait().await, OperationResult::Cancelled);
    assert_eq!(engine.calls.begins(), 0);
    assert!(!output_path.exists());
}

#[tokio::test]
async fn cancel_racing_completion_wins() {
    let ws = Workspace::new();
    let cancel = CancelHandle::new();
    let engine = ScriptedEngine::new(Script::CancelDuringCompletion(cancel.clone()));
    let (kind, sources, plan) = trim_job(&ws);
    std::fs::create_dir_all(&ws.config.scratch_dir).unwrap();
    let output_path = ws.config.scratch_dir.join("race.mp4");

    let handle = coordinator(&ws, engine).start_job(
        ExportJob {
            kind,
            sources,
            plan,
            output_path: output_path.clone(),
        },
        cancel,
    );

    assert_eq!(handle.wait().await, OperationResult::Cancelled);
    assert!(!output_path.exists());
}

#[tokio::test]
async fn empty_output_is_export_failure() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::CompleteEmpty);
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine).start(kind, sources, plan).unwrap();
    let output = handle.output_path().to_path_buf();
    let result = handle.wait().await;

    assert!(matches!(
        result,
        OperationResult::Failed {
            kind: ErrorKind::ExportFailed,
            ..
        }
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn cancel_after_settling_is_noop() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Complete { polls: 0 });
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine).start(kind, sources, plan).unwrap();
    let cancel = handle.cancel_handle();
    let result = handle.wait().await;
    cancel.cancel();

    let OperationResult::Completed { path } = result else {
        panic!("expected completion, got {result:?}");
    };
    assert!(path.exists());
}

#[tokio::test]
async fn engine_progress_reaches_the_channel_in_order() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Complete { polls: 40 });
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine).start(kind, sources, plan).unwrap();
    let mut progress = handle.progress();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            seen.push(*progress.borrow_and_update());
        }
        let last = *progress.borrow();
        if seen.last() != Some(&last) {
            seen.push(last);
        }
        seen
    });

    let result = handle.wait().await;
    let seen = watcher.await.unwrap();

    assert!(matches!(result, OperationResult::Completed { .. }));
    assert_eq!(seen.last(), Some(&1.0));
    let running = &seen[..seen.len() - 1];
    assert!(!running.is_empty(), "no intermediate progress in {seen:?}");
    assert!(running.iter().all(|p| *p > 0.0 && *p < 1.0), "{seen:?}");
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
}

#[tokio::test]
async fn stale_file_at_output_path_is_cleared_before_engine_starts() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::Complete { polls: 0 });
    let (kind, sources, plan) = trim_job(&ws);
    std::fs::create_dir_all(&ws.config.scratch_dir).unwrap();
    let output_path = ws.config.scratch_dir.join("reused.mp4");
    std::fs::write(&output_path, b"left over from an earlier run").unwrap();

    let handle = coordinator(&ws, engine.clone()).start_job(
        ExportJob {
            kind,
            sources,
            plan,
            output_path: output_path.clone(),
        },
        CancelHandle::new(),
    );

    assert_eq!(
        handle.wait().await,
        OperationResult::Completed {
            path: output_path.clone()
        }
    );
    assert_eq!(engine.calls.stale_outputs(), 0);
    assert_eq!(std::fs::read(&output_path).unwrap(), b"finished output");
}

#[tokio::test]
async fn slow_engine_cancel_does_not_stall_the_runtime() {
    let ws = Workspace::new();
    let engine = ScriptedEngine::new(Script::SlowCancel(Duration::from_millis(150)));
    let (kind, sources, plan) = trim_job(&ws);

    let handle = coordinator(&ws, engine.clone())
        .start(kind, sources, plan)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let heartbeat = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    handle.cancel();
    assert_eq!(handle.wait().await, OperationResult::Cancelled);
    heartbeat.abort();

    assert_eq!(engine.calls.cancels(), 1);
    // 150 ms of engine cancel at a 5 ms heartbeat
    assert!(ticks.load(Ordering::SeqCst) >= 5, "runtime stalled during cancel");
}
