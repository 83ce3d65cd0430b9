#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use splice_common::config::AppConfig;
use splice_common::error::{SpliceError, SpliceResult};
use splice_export::{
    CancelHandle, EngineSession, EngineStatus, ExportEngine, ExportJob, FrameRequest,
    MetadataProbe,
};
use splice_media_model::source::ProbeReport;

/// How a scripted session behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report progress for `polls` polls, then write the output and complete.
    Complete { polls: usize },
    /// Report progress for `polls` polls, then fail.
    Fail { polls: usize, message: String },
    /// Never finish on its own.
    Hang,
    /// Never finish; cancelling blocks for the given time.
    SlowCancel(Duration),
    /// Complete without writing anything.
    CompleteEmpty,
    /// Trip the cancel flag during the poll that completes.
    CancelDuringCompletion(CancelHandle),
}

#[derive(Default)]
pub struct Calls {
    pub begins: AtomicUsize,
    pub polls: AtomicUsize,
    pub cancels: AtomicUsize,
    pub samples: AtomicUsize,
    /// Begins that found a file already at the output path.
    pub stale_outputs: AtomicUsize,
}

impl Calls {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn stale_outputs(&self) -> usize {
        self.stale_outputs.load(Ordering::SeqCst)
    }

    pub fn engine_calls(&self) -> usize {
        self.begins() + self.samples()
    }
}

pub struct ScriptedEngine {
    script: Mutex<Script>,
    pub calls: Arc<Calls>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Arc::new(Calls::default()),
        })
    }
}

impl ExportEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn begin(&self, job: &ExportJob) -> SpliceResult<Box<dyn EngineSession>> {
        self.calls.begins.fetch_add(1, Ordering::SeqCst);
        if job.output_path.exists() {
            self.calls.stale_outputs.fetch_add(1, Ordering::SeqCst);
        }
        // engines write as they go; leave a partial file behind
        std::fs::write(&job.output_path, b"partial")?;
        Ok(Box::new(ScriptedSession {
            script: self.script.lock().unwrap().clone(),
            output: job.output_path.clone(),
            polls: 0,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn sample_frame(&self, request: &FrameRequest, cancel: &CancelHandle) -> SpliceResult<()> {
        self.calls.samples.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Fail { message, .. } => {
                std::fs::write(&request.output_path, b"half")?;
                Err(SpliceError::export_failed(message))
            }
            Script::Hang => {
                std::fs::write(&request.output_path, b"half")?;
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(2));
                }
                self.calls.cancels.fetch_add(1, Ordering::SeqCst);
                Err(SpliceError::Cancelled)
            }
            Script::CompleteEmpty => Ok(()),
            _ => {
                std::fs::write(&request.output_path, b"\xff\xd8jpeg")?;
                Ok(())
            }
        }
    }
}

struct ScriptedSession {
    script: Script,
    output: PathBuf,
    polls: usize,
    calls: Arc<Calls>,
}

impl EngineSession for ScriptedSession {
    fn poll(&mut self) -> EngineStatus {
        self.calls.polls.fetch_add(1, Ordering::SeqCst);
        self.polls += 1;
        match &self.script {
            Script::Complete { polls } if self.polls > *polls => {
                std::fs::write(&self.output, b"finished output").unwrap();
                EngineStatus::Completed
            }
            Script::Complete { polls } => EngineStatus::Running {
                progress: Some(self.polls as f64 / (*polls as f64 + 1.0)),
            },
            Script::Fail { polls, message } if self.polls > *polls => {
                EngineStatus::Failed(message.clone())
            }
            Script::Fail { .. } | Script::Hang | Script::SlowCancel(_) => {
                EngineStatus::Running { progress: None }
            }
            Script::CompleteEmpty => {
                std::fs::write(&self.output, b"").unwrap();
                EngineStatus::Completed
            }
            Script::CancelDuringCompletion(cancel) => {
                std::fs::write(&self.output, b"finished output").unwrap();
                cancel.cancel();
                EngineStatus::Completed
            }
        }
    }

    fn cancel(&mut self) {
        if let Script::SlowCancel(delay) = &self.script {
            std::thread::sleep(*delay);
        }
        self.calls.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Probe that reports the same media for every existing path.
pub struct FixedProbe(pub ProbeReport);

impl MetadataProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> SpliceResult<ProbeReport> {
        Ok(self.0.clone())
    }
}

pub fn hd_clip(duration_ms: i64) -> ProbeReport {
    ProbeReport {
        duration_ms: Some(duration_ms),
        width: Some(1920),
        height: Some(1080),
        frame_rate: Some(30.0),
        has_video: true,
        has_audio: true,
        ..Default::default()
    }
}

pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub config: AppConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.scratch_dir = dir.path().join("scratch");
        config.export.poll_interval_ms = 5;
        Self { dir, config }
    }

    /// Create an input file with placeholder bytes.
    pub fn input(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"media").unwrap();
        path
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.scratch_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
