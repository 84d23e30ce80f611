//! FFmpeg command construction and the CLI render backend.
//!
//! The whole render is one ffmpeg invocation: every slot is an input, each is
//! normalized and cut to its allotted duration, the segments are concatenated
//! without gaps, overlays are drawn in stacking order and the voice and music
//! are mixed to the master clock.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::composition::overlay::{FontSource, LayerAnchor, LayerContent, OverlayLayer, TextStyle};
use crate::composition::timeline::{SlotSource, TimelineSlot};
use crate::error::RenderError;
use crate::render::job::{EncodeProfile, RenderJob};

/// Voice and music are resampled to a common rate before mixing
const MIX_SAMPLE_RATE: u32 = 48_000;

/// Something that can turn a [`RenderJob`] into a file
pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Check if this backend can run on this system
    fn is_available(&self) -> bool;

    /// Encode the job, returning the written path
    fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError>;
}

/// Renders by running the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: String,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
        if !self.is_available() {
            return Err(RenderError::FfmpegMissing);
        }

        let args = build_args(job);
        debug!("Running {} {}", self.binary, args.join(" "));
        info!(
            "   Encoding {} slots, {} overlays, {:.2}s",
            job.timeline.slots.len(),
            job.overlays.len(),
            job.duration()
        );

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| RenderError::EncodingFailed {
                reason: format!("FFmpeg execution failed: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::EncodingFailed {
                reason: format!("FFmpeg exited with {}: {}", output.status, stderr_tail(&stderr, 20)),
            });
        }

        if !job.output_path.is_file() {
            return Err(RenderError::EncodingFailed {
                reason: format!("FFmpeg reported success but {:?} was not written", job.output_path),
            });
        }

        Ok(job.output_path.clone())
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Full ffmpeg argument list for a job, excluding the binary name
pub fn build_args(job: &RenderJob) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];
    let mut filters: Vec<String> = Vec::new();
    let mut input_index = 0usize;
    let profile = &job.profile;

    // Visual track: one input per slot
    let mut segment_labels = String::new();
    for slot in &job.timeline.slots {
        push_slot_input(&mut args, slot, profile);
        filters.push(slot_filter(input_index, slot, profile));
        segment_labels.push_str(&format!("[v{}]", input_index));
        input_index += 1;
    }
    filters.push(format!(
        "{}concat=n={}:v=1:a=0[base]",
        segment_labels,
        job.timeline.slots.len()
    ));

    // Overlays in stacking order
    let mut current = "base".to_string();
    for (k, layer) in job.overlays.iter().enumerate() {
        let next = format!("ov{}", k);
        match &layer.content {
            LayerContent::Caption { textfile, style, .. } | LayerContent::Watermark { textfile, style, .. } => {
                filters.push(format!(
                    "[{}]{}[{}]",
                    current,
                    drawtext_filter(textfile, style, layer),
                    next
                ));
            }
            LayerContent::Logo { path, height } => {
                args.extend(["-i".to_string(), path_arg(path)]);
                let logo_label = format!("logo{}", k);
                filters.push(format!(
                    "[{}:v]scale=-1:{},format=rgba,colorchannelmixer=aa={:.2}[{}]",
                    input_index, height, layer.opacity, logo_label
                ));
                filters.push(format!(
                    "[{}][{}]overlay={}:enable='{}'[{}]",
                    current,
                    logo_label,
                    overlay_position(layer.anchor),
                    enable_window(layer),
                    next
                ));
                input_index += 1;
            }
        }
        current = next;
    }

    // Audio track: voice padded to the clock, music looped/trimmed and ducked
    let audio = &job.audio;
    let duration = secs(audio.duration);
    args.extend(["-i".to_string(), path_arg(&audio.voice)]);
    let voice_index = input_index;
    input_index += 1;

    let voice_label = if audio.music.is_some() { "voice" } else { "aout" };
    filters.push(format!(
        "[{}:a]aresample={},apad=whole_dur={d},atrim=0:{d},asetpts=PTS-STARTPTS[{}]",
        voice_index, MIX_SAMPLE_RATE, voice_label, d = duration
    ));

    if let Some(music) = &audio.music {
        let loops = music.lock.extra_loops();
        if loops > 0 {
            args.extend(["-stream_loop".to_string(), stream_loop_arg(loops)]);
        }
        args.extend(["-i".to_string(), path_arg(&music.path)]);
        filters.push(format!(
            "[{}:a]aresample={},atrim=0:{d},asetpts=PTS-STARTPTS,volume={:.3}[music]",
            input_index, MIX_SAMPLE_RATE, music.gain, d = duration
        ));
        filters.push("[voice][music]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]".to_string());
    }

    args.extend(["-filter_complex".to_string(), filters.join(";")]);
    args.extend([
        "-map".to_string(),
        format!("[{}]", current),
        "-map".to_string(),
        "[aout]".to_string(),
    ]);
    args.extend(encode_args(profile, &duration));
    args.push(path_arg(&job.output_path));
    args
}

fn push_slot_input(args: &mut Vec<String>, slot: &TimelineSlot, profile: &EncodeProfile) {
    let duration = secs(slot.allotted_duration);
    match &slot.source {
        SlotSource::Video { path, lock, .. } => {
            let loops = lock.extra_loops();
            if loops > 0 {
                args.extend(["-stream_loop".to_string(), stream_loop_arg(loops)]);
            }
            args.extend(["-an".to_string(), "-i".to_string(), path_arg(path)]);
        }
        SlotSource::Still { path, .. } => {
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                fps_arg(profile.fps),
                "-t".to_string(),
                duration,
                "-i".to_string(),
                path_arg(path),
            ]);
        }
        SlotSource::Placeholder { color, .. } => {
            args.extend([
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                format!(
                    "color=c=0x{:02x}{:02x}{:02x}:s={}x{}:r={}:d={}",
                    color[0],
                    color[1],
                    color[2],
                    profile.frame.width,
                    profile.frame.height,
                    fps_arg(profile.fps),
                    duration
                ),
            ]);
        }
    }
}

/// Normalize one input and cut it to the slot
fn slot_filter(index: usize, slot: &TimelineSlot, profile: &EncodeProfile) -> String {
    let frame = profile.frame;
    let d = secs(slot.allotted_duration);
    let shape = match &slot.source {
        SlotSource::Video { transform, .. } => transform.filter_chain(),
        SlotSource::Still { zoom: Some(zoom), .. } => format!("{},setsar=1", zoom.zoompan_filter(frame, profile.fps)),
        SlotSource::Still { zoom: None, .. } => format!("scale={}:{},setsar=1", frame.width, frame.height),
        SlotSource::Placeholder { .. } => "setsar=1".to_string(),
    };
    // A clip that ends early holds its last frame instead of shortening the segment
    let pad = match &slot.source {
        SlotSource::Video { .. } => format!(",tpad=stop_mode=clone:stop_duration={}", d),
        _ => String::new(),
    };

    format!(
        "[{i}:v]{shape},fps={fps},format={pix}{pad},trim=duration={d},setpts=PTS-STARTPTS[v{i}]",
        i = index,
        shape = shape,
        fps = fps_arg(profile.fps),
        pix = profile.pixel_format,
        pad = pad,
        d = d,
    )
}

fn drawtext_filter(textfile: &Path, style: &TextStyle, layer: &OverlayLayer) -> String {
    let font = match &style.font {
        FontSource::File(path) => format!("fontfile={}", quote(&path.display().to_string())),
        FontSource::Family(family) => format!("font={}", quote(family)),
    };

    let (x, y) = match layer.anchor {
        LayerAnchor::Center => ("(w-text_w)/2".to_string(), "(h-text_h)/2".to_string()),
        LayerAnchor::BottomCenter { offset } => ("(w-text_w)/2".to_string(), format!("h-text_h-{}", offset)),
        LayerAnchor::TopRight { margin } => (format!("w-text_w-{}", margin), margin.to_string()),
        LayerAnchor::TopLeft { margin } => (margin.to_string(), margin.to_string()),
    };

    let mut filter = format!(
        "drawtext={}:textfile={}:fontsize={}:fontcolor={}:x={}:y={}:line_spacing=10",
        font,
        quote(&textfile.display().to_string()),
        style.size,
        style.color,
        x,
        y
    );
    if style.stroke_width > 0 {
        filter.push_str(&format!(":borderw={}:bordercolor={}", style.stroke_width, style.stroke_color));
    }
    if layer.opacity < 1.0 {
        filter.push_str(&format!(":alpha={:.2}", layer.opacity));
    }
    filter.push_str(&format!(":enable='{}'", enable_window(layer)));
    filter
}

fn overlay_position(anchor: LayerAnchor) -> String {
    match anchor {
        LayerAnchor::Center => "(W-w)/2:(H-h)/2".to_string(),
        LayerAnchor::TopRight { margin } => format!("W-w-{m}:{m}", m = margin),
        LayerAnchor::TopLeft { margin } => format!("{m}:{m}", m = margin),
        LayerAnchor::BottomCenter { offset } => format!("(W-w)/2:H-h-{}", offset),
    }
}

/// Half-open `[start, end)` so layers meeting at a cut never share a frame
fn enable_window(layer: &OverlayLayer) -> String {
    format!("gte(t,{})*lt(t,{})", secs(layer.start), secs(layer.end()))
}

fn encode_args(profile: &EncodeProfile, duration: &str) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        profile.video_codec.clone(),
        "-preset".to_string(),
        profile.preset.clone(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-pix_fmt".to_string(),
        profile.pixel_format.clone(),
        "-r".to_string(),
        fps_arg(profile.fps),
        "-threads".to_string(),
        profile.threads.to_string(),
        "-c:a".to_string(),
        profile.audio_codec.clone(),
        "-b:a".to_string(),
        profile.audio_bitrate.clone(),
        "-t".to_string(),
        duration.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// `-stream_loop` value; the saturated count means loop forever
fn stream_loop_arg(loops: u32) -> String {
    if loops == u32::MAX {
        "-1".to_string()
    } else {
        loops.to_string()
    }
}

fn secs(value: f64) -> String {
    format!("{:.6}", value)
}

fn fps_arg(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{:.3}", fps)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Quote a value for use inside a filter graph
///
/// Everything between single quotes is literal; a quote in the value closes
/// the quoted run, is escaped on its own and reopens it.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
