use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BlueprintError, Result};

/// Stable scene identifier, the join key into the [`AssetMap`]
pub type SceneId = u32;

/// Upstream description of a video: ordered scenes plus optional branding and music hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub scenes: Vec<Scene>,

    #[serde(default)]
    pub branding: Option<Branding>,

    #[serde(default)]
    pub music: Option<MusicHint>,
}

impl Blueprint {
    /// Parse and validate a blueprint from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let blueprint: Blueprint = serde_json::from_str(content)
            .map_err(|e| BlueprintError::Parse { reason: e.to_string() })?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Load and validate a blueprint JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Check the structural invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(BlueprintError::NoScenes.into());
        }

        let mut seen = HashSet::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            if !seen.insert(scene.id) {
                return Err(BlueprintError::DuplicateSceneId { id: scene.id }.into());
            }

            if let Some(estimate) = scene.duration_estimate {
                if !estimate.is_finite() || estimate < 0.0 {
                    return Err(BlueprintError::InvalidField {
                        field: format!("scenes[{}].duration_estimate", scene.id),
                        details: estimate.to_string(),
                    }
                    .into());
                }
            }
        }

        if let Some(opacity) = self.branding.as_ref().and_then(|b| b.logo_opacity) {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(BlueprintError::InvalidField {
                    field: "branding.logo_opacity".to_string(),
                    details: opacity.to_string(),
                }
                .into());
            }
        }

        if let Some(volume) = self.music.as_ref().and_then(|m| m.volume) {
            if !(0.0..=1.0).contains(&volume) {
                return Err(BlueprintError::InvalidField {
                    field: "music.volume".to_string(),
                    details: volume.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Per-scene duration estimates, only when every scene carries a positive one
    pub fn duration_estimates(&self) -> Option<Vec<f64>> {
        self.scenes
            .iter()
            .map(|scene| scene.duration_estimate.filter(|d| *d > 0.0))
            .collect()
    }

    pub fn mood_hint(&self) -> Option<&str> {
        self.music.as_ref().and_then(|m| m.mood.as_deref())
    }
}

/// One segment of the script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,

    #[serde(default)]
    pub narration: String,

    #[serde(default)]
    pub overlay_text: Option<String>,

    #[serde(default)]
    pub visual: VisualPlan,

    /// Expected spoken length; normalized against the master clock when present on every scene
    #[serde(default)]
    pub duration_estimate: Option<f64>,
}

impl Scene {
    pub fn visual_query(&self) -> &str {
        &self.visual.query
    }

    pub fn fallback_queries(&self) -> &[String] {
        &self.visual.fallbacks
    }
}

/// Search plan used by the asset collaborator; carried through for logging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualPlan {
    #[serde(default)]
    pub query: String,

    #[serde(default, alias = "fallback", deserialize_with = "one_or_many")]
    pub fallbacks: Vec<String>,
}

/// Accept either `"fallback": "text"` or `"fallbacks": ["a", "b"]`
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(query)) => vec![query],
        Some(OneOrMany::Many(queries)) => queries,
        None => Vec::new(),
    })
}

/// Corner the logo is pinned to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoCorner {
    #[default]
    TopRight,
    TopLeft,
}

/// Branding hints from the blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Branding {
    #[serde(default)]
    pub logo_opacity: Option<f32>,

    #[serde(default)]
    pub logo_position: LogoCorner,
}

/// Background music hints from the blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MusicHint {
    #[serde(default)]
    pub mood: Option<String>,

    /// Requested music level; can only lower the configured duck level
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Scene id to local media file, built by the asset collaborator
///
/// Missing entries are normal input: the scene simply gets a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetMap {
    entries: BTreeMap<SceneId, PathBuf>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an asset map such as `{"1": "clips/a.mp4", "3": "stills/b.jpg"}`
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| BlueprintError::AssetMapParse { reason: e.to_string() }.into())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, id: SceneId, path: P) {
        self.entries.insert(id, path.into());
    }

    pub fn get(&self, id: SceneId) -> Option<&Path> {
        self.entries.get(&id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<PathBuf>> FromIterator<(SceneId, P)> for AssetMap {
    fn from_iter<I: IntoIterator<Item = (SceneId, P)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(id, path)| (id, path.into())).collect(),
        }
    }
}
