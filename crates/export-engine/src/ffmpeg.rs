//! ffmpeg-backed export engine.
//!
//! A composition becomes one ffmpeg invocation: every source is an input,
//! every timeline segment a filter chain, and the chains are concatenated
//! per track. Progress comes from `-progress pipe:1`.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use splice_common::config::ExportDefaults;
use splice_common::error::{SpliceError, SpliceResult};
use splice_common::time::NativeTime;
use splice_media_model::geometry::{Affine, QuarterTurn, Size};
use splice_media_model::operation::OperationKind;
use splice_media_model::plan::OutputFormat;
use splice_media_model::timeline::{SegmentSource, TrackSegment};

use crate::coordinator::CancelHandle;
use crate::engine::{EngineSession, EngineStatus, ExportEngine, ExportJob, FrameRequest};

const AUDIO_RATE: u32 = 48_000;

/// How often a frame sample checks for exit and cancellation.
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Encoder settings for [`FfmpegEngine`].
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub binary: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub crf: u32,
    pub compress_crf: u32,
    pub audio_bitrate_kbps: u32,
}

impl From<&ExportDefaults> for FfmpegSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            binary: defaults.ffmpeg_path.clone(),
            video_codec: defaults.video_codec.clone(),
            audio_codec: defaults.audio_codec.clone(),
            crf: defaults.crf,
            compress_crf: defaults.compress_crf,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
        }
    }
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self::from(&ExportDefaults::default())
    }
}

/// Export engine that shells out to ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    settings: FfmpegSettings,
}

impl FfmpegEngine {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(defaults: &ExportDefaults) -> Self {
        Self::new(FfmpegSettings::from(defaults))
    }

    /// Full ffmpeg argument list for `job`.
    pub fn export_args(&self, job: &ExportJob) -> SpliceResult<Vec<String>> {
        let plan = &job.plan;
        let graph = build_filter_graph(job)?;
        let has_video = !plan.timeline.video.is_empty();
        let has_audio = !plan.timeline.audio.is_empty();

        let mut args = base_args();
        for source in &job.sources {
            args.push("-noautorotate".to_string());
            args.push("-i".to_string());
            args.push(source.path.display().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(graph);

        if has_video {
            args.extend(["-map".to_string(), "[vout]".to_string()]);
            let crf = if job.kind == OperationKind::Compress {
                self.settings.compress_crf
            } else {
                self.settings.crf
            };
            args.extend(
                [
                    "-c:v",
                    self.settings.video_codec.as_str(),
                    "-preset",
                    "medium",
                    "-crf",
                    &crf.to_string(),
                    "-pix_fmt",
                    "yuv420p",
                ]
                .map(String::from),
            );
        } else {
            args.push("-vn".to_string());
        }

        if has_audio {
            args.extend(["-map".to_string(), "[aout]".to_string()]);
            args.extend(
                [
                    "-c:a",
                    self.settings.audio_codec.as_str(),
                    "-b:a",
                    &format!("{}k", self.settings.audio_bitrate_kbps.max(32)),
                ]
                .map(String::from),
            );
        } else {
            args.push("-an".to_string());
        }

        if plan.format != OutputFormat::Jpeg {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
        args.extend([
            "-t".to_string(),
            secs(plan.timeline.duration()),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            job.output_path.display().to_string(),
        ]);
        Ok(args)
    }

    /// ffmpeg argument list for a still frame.
    pub fn frame_args(&self, request: &FrameRequest) -> Vec<String> {
        let mut args = base_args();
        args.extend([
            "-ss".to_string(),
            format!("{:.3}", request.position_ms.max(0) as f64 / 1000.0),
            "-i".to_string(),
            request.source.display().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
        ]);
        if let Some(size) = request.size {
            args.extend([
                "-vf".to_string(),
                format!("scale={}:{}", size.width, size.height),
            ]);
        }
        args.extend([
            "-q:v".to_string(),
            jpeg_qscale(request.quality).to_string(),
            request.output_path.display().to_string(),
        ]);
        args
    }
}

impl ExportEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        binary_available(&self.settings.binary)
    }

    fn begin(&self, job: &ExportJob) -> SpliceResult<Box<dyn EngineSession>> {
        let args = self.export_args(job)?;
        tracing::debug!(args = ?args, "Running ffmpeg");
        let session = FfmpegSession::spawn(
            &self.settings.binary,
            &args,
            job.plan.timeline.duration().as_secs_f64(),
        )?;
        Ok(Box::new(session))
    }

    fn sample_frame(&self, request: &FrameRequest, cancel: &CancelHandle) -> SpliceResult<()> {
        let args = self.frame_args(request);
        tracing::debug!(args = ?args, "Running ffmpeg frame sample");
        let mut child = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpliceError::export_failed(format!("Failed to start ffmpeg: {e}")))?;
        let stderr_reader = child.stderr.take().map(drain_stderr);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if cancel.is_cancelled() => {
                    if let Err(err) = child.kill() {
                        tracing::warn!(error = %err, "Failed to kill ffmpeg");
                    }
                    let _ = child.wait();
                    join_stderr(stderr_reader);
                    return Err(SpliceError::Cancelled);
                }
                Ok(None) => std::thread::sleep(FRAME_POLL_INTERVAL),
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_stderr(stderr_reader);
                    return Err(SpliceError::export_failed(format!(
                        "Failed to wait on ffmpeg: {err}"
                    )));
                }
            }
        };

        let stderr = join_stderr(stderr_reader);
        if !status.success() {
            return Err(SpliceError::export_failed(format!(
                "ffmpeg frame sample failed (status {status}): {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// A running ffmpeg child process.
pub struct FfmpegSession {
    child: Child,
    progress_bits: Arc<AtomicU64>,
    progress_reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<String>>,
    settled: Option<EngineStatus>,
}

impl FfmpegSession {
    fn spawn(binary: &Path, args: &[String], expected_duration_secs: f64) -> SpliceResult<Self> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpliceError::export_failed(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(pid = child.id(), args_len = args.len(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpliceError::export_failed("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SpliceError::export_failed("Failed to capture ffmpeg stderr"))?;

        let stderr_reader = drain_stderr(stderr);

        let progress_bits = Arc::new(AtomicU64::new(0f64.to_bits()));
        let shared = Arc::clone(&progress_bits);
        let progress_reader = std::thread::spawn(move || {
            read_progress(stdout, expected_duration_secs, &shared);
        });

        Ok(Self {
            child,
            progress_bits,
            progress_reader: Some(progress_reader),
            stderr_reader: Some(stderr_reader),
            settled: None,
        })
    }

    fn progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }

    fn join_readers(&mut self) -> String {
        if let Some(reader) = self.progress_reader.take() {
            let _ = reader.join();
        }
        join_stderr(self.stderr_reader.take())
    }
}

/// Drain stderr on a thread so ffmpeg never blocks on a full pipe.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

fn join_stderr(reader: Option<JoinHandle<String>>) -> String {
    reader
        .map(|reader| {
            reader
                .join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
        })
        .unwrap_or_default()
}

impl EngineSession for FfmpegSession {
    fn poll(&mut self) -> EngineStatus {
        if let Some(status) = &self.settled {
            return status.clone();
        }

        let status = match self.child.try_wait() {
            Ok(None) => {
                return EngineStatus::Running {
                    progress: Some(self.progress()),
                }
            }
            Ok(Some(exit)) => {
                let stderr = self.join_readers();
                if exit.success() {
                    EngineStatus::Completed
                } else {
                    EngineStatus::Failed(format!(
                        "ffmpeg export failed (status {exit}): {}",
                        stderr.trim()
                    ))
                }
            }
            Err(err) => EngineStatus::Failed(format!("Failed to wait on ffmpeg: {err}")),
        };
        self.settled = Some(status.clone());
        status
    }

    fn cancel(&mut self) {
        if self.settled.is_some() {
            return;
        }
        if let Err(err) = self.child.kill() {
            tracing::warn!(error = %err, "Failed to kill ffmpeg");
        }
        let _ = self.child.wait();
        self.join_readers();
        self.settled = Some(EngineStatus::Failed("cancelled".to_string()));
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        if self.settled.is_none() {
            self.cancel();
        }
    }
}

fn read_progress(stdout: impl Read, expected_duration_secs: f64, progress: &AtomicU64) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut state = ProgressState::default();
    let mut last_progress_secs = 0.0f64;
    let mut last_progress_wall = Instant::now();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key != "progress" {
            continue;
        }

        if state.out_time_secs > last_progress_secs + 0.001 {
            last_progress_secs = state.out_time_secs;
            last_progress_wall = Instant::now();
        }
        progress.store(
            state.fraction(expected_duration_secs).to_bits(),
            Ordering::Relaxed,
        );
        if last_progress_wall.elapsed().as_secs() >= 10 {
            tracing::warn!(
                out_time_secs = state.out_time_secs,
                "No ffmpeg progress advancement for 10s"
            );
            last_progress_wall = Instant::now();
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            1.0
        } else if expected_duration_secs <= 0.0 {
            0.0
        } else {
            (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
        }
    }
}

fn base_args() -> Vec<String> {
    ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
        .map(String::from)
        .to_vec()
}

fn secs(time: NativeTime) -> String {
    format!("{:.6}", time.as_secs_f64())
}

/// Map 0-100 quality onto ffmpeg's JPEG qscale (31 worst, 2 best).
fn jpeg_qscale(quality: u8) -> u32 {
    let quality = quality.min(100) as f64 / 100.0;
    31 - (quality * 29.0).round() as u32
}

fn binary_available(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Build the `-filter_complex` graph for a job.
///
/// Produces `[vout]` when the timeline has video and `[aout]` when it has
/// audio.
pub fn build_filter_graph(job: &ExportJob) -> SpliceResult<String> {
    let plan = &job.plan;
    let mut chains = Vec::new();

    if !plan.timeline.video.is_empty() {
        let canvas = plan.transform.render_size;
        let fps = plan.transform.frame_rate;
        let mut labels = String::new();
        for (index, segment) in plan.timeline.video.iter().enumerate() {
            let transform = plan.transform.transforms.get(index).ok_or_else(|| {
                SpliceError::invalid_parameter(format!("no transform for video segment {index}"))
            })?;
            let chain = match segment.source {
                SegmentSource::Media { source } => {
                    let natural = job
                        .sources
                        .get(source)
                        .map(|s| s.natural_size)
                        .ok_or_else(|| {
                            SpliceError::invalid_parameter(format!("unknown source {source}"))
                        })?;
                    let mut steps = vec![
                        format!(
                            "trim=start={}:duration={}",
                            secs(segment.source_range.start),
                            secs(segment.source_range.duration)
                        ),
                        pts_stretch(segment),
                    ];
                    steps.extend(geometry_steps(transform, natural, canvas)?);
                    steps.push("setsar=1".to_string());
                    format!("[{source}:v:0]{}[v{index}]", steps.join(","))
                }
                SegmentSource::Gap => format!(
                    "color=c=black:s={}x{}:r={fps:.3}:d={},setsar=1[v{index}]",
                    canvas.width,
                    canvas.height,
                    secs(segment.insert_range.duration)
                ),
            };
            chains.push(chain);
            labels.push_str(&format!("[v{index}]"));
        }

        let encoded = even_size(canvas);
        let mut tail = format!("fps={fps:.3}");
        if encoded != canvas {
            tail.push_str(&format!(",crop={}:{}:0:0", encoded.width, encoded.height));
        }
        tail.push_str(",format=yuv420p");
        chains.push(format!(
            "{labels}concat=n={}:v=1:a=0,{tail}[vout]",
            plan.timeline.video.len()
        ));
    }

    if !plan.timeline.audio.is_empty() {
        let mut labels = String::new();
        for (index, segment) in plan.timeline.audio.iter().enumerate() {
            let insert = secs(segment.insert_range.duration);
            let chain = match segment.source {
                SegmentSource::Media { source } => {
                    let mut steps = vec![
                        format!(
                            "atrim=start={}:duration={}",
                            secs(segment.source_range.start),
                            secs(segment.source_range.duration)
                        ),
                        "asetpts=PTS-STARTPTS".to_string(),
                    ];
                    steps.extend(atempo_chain(segment.playback_rate()));
                    steps.push(format!(
                        "aresample={AUDIO_RATE},aformat=sample_fmts=fltp:channel_layouts=stereo"
                    ));
                    steps.push(format!("apad,atrim=duration={insert}"));
                    format!("[{source}:a:0]{}[a{index}]", steps.join(","))
                }
                SegmentSource::Gap => format!(
                    "anullsrc=r={AUDIO_RATE}:cl=stereo,atrim=duration={insert},\
                     aformat=sample_fmts=fltp:channel_layouts=stereo[a{index}]"
                ),
            };
            chains.push(chain);
            labels.push_str(&format!("[a{index}]"));
        }
        chains.push(format!(
            "{labels}concat=n={}:v=0:a=1[aout]",
            plan.timeline.audio.len()
        ));
    }

    if chains.is_empty() {
        return Err(SpliceError::invalid_asset("nothing to export"));
    }
    Ok(chains.join(";"))
}

fn pts_stretch(segment: &TrackSegment) -> String {
    let factor = segment
        .insert_range
        .duration
        .ratio(segment.source_range.duration);
    if (factor - 1.0).abs() < 1e-9 {
        "setpts=PTS-STARTPTS".to_string()
    } else {
        format!("setpts=(PTS-STARTPTS)*{factor:.9}")
    }
}

/// `atempo` filters whose product is `rate`, each within [0.5, 2.0].
fn atempo_chain(rate: f64) -> Vec<String> {
    let mut remaining = rate;
    let mut filters = Vec::new();
    if !(remaining.is_finite() && remaining > 0.0) {
        return filters;
    }
    while remaining > 2.0 {
        filters.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        filters.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    if (remaining - 1.0).abs() > 1e-9 {
        filters.push(format!("atempo={remaining:.9}"));
    }
    filters
}

/// Rotate, scale, crop and pad steps that place a `natural` frame on the
/// canvas the way `transform` does.
fn geometry_steps(transform: &Affine, natural: Size, canvas: Size) -> SpliceResult<Vec<String>> {
    let (turn, _, _) = transform.decompose().ok_or_else(|| {
        SpliceError::invalid_parameter(format!(
            "transform {transform:?} is not a quarter-turn rotation with positive scale"
        ))
    })?;

    let mut steps = Vec::new();
    match turn {
        QuarterTurn::None => {}
        QuarterTurn::Cw90 => steps.push("transpose=1".to_string()),
        QuarterTurn::Cw180 => steps.push("hflip,vflip".to_string()),
        QuarterTurn::Cw270 => steps.push("transpose=2".to_string()),
    }
    let rotated = if turn.swaps_axes() {
        natural.swapped()
    } else {
        natural
    };

    let (min_x, min_y, max_x, max_y) = transform.bounds(natural);
    let scaled_w = (max_x - min_x).round() as i64;
    let scaled_h = (max_y - min_y).round() as i64;
    if scaled_w <= 0 || scaled_h <= 0 {
        return Err(SpliceError::invalid_parameter("transform collapses the frame"));
    }
    if scaled_w != rotated.width as i64 || scaled_h != rotated.height as i64 {
        steps.push(format!("scale={scaled_w}:{scaled_h}"));
    }

    let (canvas_w, canvas_h) = (canvas.width as i64, canvas.height as i64);
    let origin_x = min_x.round() as i64;
    let origin_y = min_y.round() as i64;
    let crop_x0 = (-origin_x).max(0);
    let crop_y0 = (-origin_y).max(0);
    let crop_x1 = scaled_w.min(canvas_w - origin_x);
    let crop_y1 = scaled_h.min(canvas_h - origin_y);
    if crop_x1 <= crop_x0 || crop_y1 <= crop_y0 {
        return Err(SpliceError::invalid_parameter(
            "transform moves the frame off the canvas",
        ));
    }
    let visible_w = crop_x1 - crop_x0;
    let visible_h = crop_y1 - crop_y0;
    if (crop_x0, crop_y0, visible_w, visible_h) != (0, 0, scaled_w, scaled_h) {
        steps.push(format!("crop={visible_w}:{visible_h}:{crop_x0}:{crop_y0}"));
    }

    let pad_x = origin_x.max(0);
    let pad_y = origin_y.max(0);
    if visible_w != canvas_w || visible_h != canvas_h {
        steps.push(format!("pad={canvas_w}:{canvas_h}:{pad_x}:{pad_y}:color=black"));
    }
    Ok(steps)
}

/// Largest even size not above `size`, as yuv420p requires.
fn even_size(size: Size) -> Size {
    Size::new((size.width & !1).max(2), (size.height & !1).max(2))
}
