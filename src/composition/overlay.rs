//! Timed caption and branding layers drawn above the visual track.
//!
//! Layers come out in stacking order: every caption first, then at most one
//! branding layer (logo or watermark, never both).

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::blueprint::{Blueprint, LogoCorner, Scene, SceneId};
use crate::composition::report::Degradation;
use crate::composition::timeline::{Timeline, TimelineSlot};
use crate::config::{CaptionSource, Config, OverlayConfig};
use crate::video::FrameSize;

/// Average glyph advance as a fraction of the font size, for line wrapping
const GLYPH_WIDTH_RATIO: f32 = 0.55;

/// Font used by text layers
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    File(PathBuf),
    /// Resolved by fontconfig at render time
    Family(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontSource,
    pub size: u32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
}

/// What a layer draws
#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    /// `textfile` holds `text` so the renderer needs no escaping
    Caption {
        text: String,
        textfile: PathBuf,
        style: TextStyle,
    },
    Watermark {
        text: String,
        textfile: PathBuf,
        style: TextStyle,
    },
    Logo {
        path: PathBuf,
        height: u32,
    },
}

/// Where a layer sits in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAnchor {
    Center,
    TopRight { margin: u32 },
    TopLeft { margin: u32 },
    /// Horizontally centered, `offset` pixels above the bottom edge
    BottomCenter { offset: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub content: LayerContent,
    pub start: f64,
    pub duration: f64,
    pub anchor: LayerAnchor,
    pub opacity: f32,
}

impl OverlayLayer {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_caption(&self) -> bool {
        matches!(self.content, LayerContent::Caption { .. })
    }

    pub fn is_branding(&self) -> bool {
        !self.is_caption()
    }
}

/// Branding inputs supplied with the request
#[derive(Debug, Clone, Default)]
pub struct BrandingRequest<'a> {
    pub watermark_text: Option<&'a str>,
    pub logo_path: Option<&'a Path>,
}

/// Builds caption and branding layers for one timeline
#[derive(Debug, Clone)]
pub struct OverlayCompositor {
    style: OverlayConfig,
    frame: FrameSize,
    workdir: PathBuf,
}

impl OverlayCompositor {
    pub fn new(config: &Config, workdir: impl Into<PathBuf>) -> Self {
        Self {
            style: config.overlay.clone(),
            frame: config.video.params.frame_size(),
            workdir: workdir.into(),
        }
    }

    /// All layers for the timeline plus whatever had to be skipped
    pub fn compose(
        &self,
        blueprint: &Blueprint,
        timeline: &Timeline,
        branding: BrandingRequest<'_>,
    ) -> (Vec<OverlayLayer>, Vec<Degradation>) {
        let mut degradations = Vec::new();

        let font = match self.font() {
            Ok(font) => Some(font),
            Err(reason) => {
                warn!("Text layers disabled: {}", reason);
                None
            }
        };

        let mut layers = Vec::new();
        for slot in &timeline.slots {
            let Some(scene) = blueprint.scenes.iter().find(|s| s.id == slot.scene_id) else {
                continue;
            };

            let Some(font) = font.as_ref() else {
                if has_caption_text(scene, self.style.caption_source) {
                    degradations.push(Degradation::CaptionSkipped {
                        scene_id: scene.id,
                        reason: "font file missing".to_string(),
                    });
                }
                continue;
            };

            self.caption_layers(scene, slot, font, &mut layers, &mut degradations);
        }

        let logo_corner = blueprint
            .branding
            .as_ref()
            .map(|b| b.logo_position)
            .unwrap_or_default();
        let logo_opacity = blueprint
            .branding
            .as_ref()
            .and_then(|b| b.logo_opacity)
            .unwrap_or(self.style.logo_opacity);

        if let Some(layer) = self.branding_layer(
            timeline.duration(),
            branding,
            font.as_ref(),
            logo_corner,
            logo_opacity,
            &mut degradations,
        ) {
            layers.push(layer);
        }

        debug!(
            "Overlay set: {} captions, {} branding",
            layers.iter().filter(|l| l.is_caption()).count(),
            layers.iter().filter(|l| l.is_branding()).count()
        );
        (layers, degradations)
    }

    fn font(&self) -> Result<FontSource, String> {
        match &self.style.font_file {
            Some(path) if path.is_file() => Ok(FontSource::File(path.clone())),
            Some(path) => Err(format!("font file {:?} not found", path)),
            None => Ok(FontSource::Family(self.style.font_family.clone())),
        }
    }

    fn caption_style(&self, font: &FontSource) -> TextStyle {
        TextStyle {
            font: font.clone(),
            size: self.style.caption_font_size,
            color: self.style.caption_color.clone(),
            stroke_color: self.style.stroke_color.clone(),
            stroke_width: self.style.stroke_width,
        }
    }

    fn caption_layers(
        &self,
        scene: &Scene,
        slot: &TimelineSlot,
        font: &FontSource,
        layers: &mut Vec<OverlayLayer>,
        degradations: &mut Vec<Degradation>,
    ) {
        let segments = match self.style.caption_source {
            CaptionSource::OverlayText => match scene.overlay_text.as_deref().map(clean_caption) {
                Some(text) if !text.is_empty() => vec![(text, slot.start, slot.allotted_duration)],
                _ => Vec::new(),
            },
            CaptionSource::Narration => chunk_narration(
                &scene.narration,
                self.style.narration_chunk_words,
                slot.start,
                slot.allotted_duration,
            ),
        };

        let max_chars = self.line_budget();
        for (index, (text, start, duration)) in segments.into_iter().enumerate() {
            let wrapped = wrap_words(&text, max_chars);
            let textfile = self.workdir.join(format!("caption_{:03}_{:02}.txt", scene.id, index));

            if let Err(e) = std::fs::write(&textfile, &wrapped) {
                warn!("Caption for scene {} skipped: {}", scene.id, e);
                degradations.push(caption_skipped(scene.id, e.to_string()));
                continue;
            }

            layers.push(OverlayLayer {
                content: LayerContent::Caption {
                    text: wrapped,
                    textfile,
                    style: self.caption_style(font),
                },
                start,
                duration,
                anchor: LayerAnchor::Center,
                opacity: 1.0,
            });
        }
    }

    /// Characters per caption line at the configured wrap width
    pub fn line_budget(&self) -> usize {
        let usable = self.frame.width as f32 * self.style.caption_wrap_ratio;
        let glyph = self.style.caption_font_size as f32 * GLYPH_WIDTH_RATIO;
        ((usable / glyph).floor() as usize).max(1)
    }

    /// Logo if usable, else watermark text, else nothing
    fn branding_layer(
        &self,
        duration: f64,
        request: BrandingRequest<'_>,
        font: Option<&FontSource>,
        corner: LogoCorner,
        logo_opacity: f32,
        degradations: &mut Vec<Degradation>,
    ) -> Option<OverlayLayer> {
        let watermark = request.watermark_text.map(str::trim).filter(|t| !t.is_empty());

        if let Some(logo) = request.logo_path {
            match image::image_dimensions(logo) {
                Ok((w, h)) if w > 0 && h > 0 => {
                    let margin = self.style.logo_margin;
                    return Some(OverlayLayer {
                        content: LayerContent::Logo {
                            path: logo.to_path_buf(),
                            height: self.style.logo_height,
                        },
                        start: 0.0,
                        duration,
                        anchor: match corner {
                            LogoCorner::TopRight => LayerAnchor::TopRight { margin },
                            LogoCorner::TopLeft => LayerAnchor::TopLeft { margin },
                        },
                        opacity: logo_opacity,
                    });
                }
                Ok(_) => self.logo_unusable(logo, "zero size".to_string(), watermark, degradations),
                Err(e) => self.logo_unusable(logo, e.to_string(), watermark, degradations),
            }
        }

        let text = watermark?;
        let Some(font) = font else {
            warn!("Watermark skipped: no usable font");
            degradations.push(Degradation::BrandingSkipped {
                reason: "font file missing".to_string(),
            });
            return None;
        };

        let textfile = self.workdir.join("watermark.txt");
        if let Err(e) = std::fs::write(&textfile, text) {
            warn!("Watermark skipped: {}", e);
            degradations.push(Degradation::BrandingSkipped { reason: e.to_string() });
            return None;
        }

        Some(OverlayLayer {
            content: LayerContent::Watermark {
                text: text.to_string(),
                textfile,
                style: TextStyle {
                    font: font.clone(),
                    size: self.style.watermark_font_size,
                    color: self.style.watermark_color.clone(),
                    stroke_color: self.style.stroke_color.clone(),
                    stroke_width: 0,
                },
            },
            start: 0.0,
            duration,
            anchor: LayerAnchor::BottomCenter {
                offset: self.style.watermark_bottom_offset,
            },
            opacity: self.style.watermark_opacity,
        })
    }

    fn logo_unusable(
        &self,
        logo: &Path,
        reason: String,
        watermark: Option<&str>,
        degradations: &mut Vec<Degradation>,
    ) {
        warn!("Logo {:?} unusable: {}", logo, reason);
        if watermark.is_some() {
            degradations.push(Degradation::LogoFallback { reason });
        } else {
            degradations.push(Degradation::BrandingSkipped { reason });
        }
    }
}

fn caption_skipped(scene_id: SceneId, reason: String) -> Degradation {
    Degradation::CaptionSkipped { scene_id, reason }
}

fn has_caption_text(scene: &Scene, source: CaptionSource) -> bool {
    match source {
        CaptionSource::OverlayText => scene
            .overlay_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty()),
        CaptionSource::Narration => !scene.narration.trim().is_empty(),
    }
}

/// Uppercase and collapse whitespace
pub fn clean_caption(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Greedy word wrap; a single over-long word gets a line of its own
pub fn wrap_words(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Split narration into word chunks timed by their share of the characters
///
/// Returns `(text, start, duration)`; the last chunk ends exactly at the slot end.
pub fn chunk_narration(narration: &str, words_per_chunk: usize, start: f64, duration: f64) -> Vec<(String, f64, f64)> {
    let words: Vec<&str> = narration.split_whitespace().collect();
    if words.is_empty() || duration <= 0.0 {
        return Vec::new();
    }

    let chunks: Vec<String> = words
        .chunks(words_per_chunk.max(1))
        .map(|chunk| clean_caption(&chunk.join(" ")))
        .collect();
    let total_chars: usize = chunks.iter().map(|c| c.chars().count()).sum();
    let end = start + duration;

    let mut cursor = start;
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let chunk_end = if i == last {
                end
            } else {
                cursor + duration * chunk.chars().count() as f64 / total_chars as f64
            };
            let segment = (chunk, cursor, chunk_end - cursor);
            cursor = chunk_end;
            segment
        })
        .collect()
}
