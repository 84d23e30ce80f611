use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::audio::loader::AudioLoader;
use crate::audio::types::AudioInfo;
use crate::composition::report::Degradation;
use crate::composition::timeline::{DurationLock, MasterClock};
use crate::config::Config;

/// Moods with a music bed in the library
pub const KNOWN_MOODS: [&str; 5] = ["chill", "upbeat", "dramatic", "phonk", "corporate"];

const MUSIC_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "m4a", "flac"];

/// Music beds stored as `<music_dir>/<mood>.<ext>`
#[derive(Debug, Clone)]
pub struct MoodLibrary {
    music_dir: PathBuf,
    default_mood: String,
}

impl MoodLibrary {
    pub fn new(music_dir: impl Into<PathBuf>, default_mood: impl Into<String>) -> Self {
        Self {
            music_dir: music_dir.into(),
            default_mood: default_mood.into().to_lowercase(),
        }
    }

    pub fn default_mood(&self) -> &str {
        &self.default_mood
    }

    /// Reduce a free-form mood ("Upbeat and bright") to a library key
    ///
    /// Only the first word counts; anything unknown becomes the default mood.
    pub fn canonical_mood(&self, requested: &str) -> String {
        Self::known_mood(requested).unwrap_or_else(|| self.default_mood.clone())
    }

    /// Library key named by the first word of `requested`, if there is one
    pub fn known_mood(requested: &str) -> Option<String> {
        let first = requested
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        KNOWN_MOODS.contains(&first.as_str()).then_some(first)
    }

    /// First existing file for a mood, in extension preference order
    pub fn track_for(&self, mood: &str) -> Option<PathBuf> {
        MUSIC_EXTENSIONS
            .iter()
            .map(|ext| self.music_dir.join(format!("{}.{}", mood, ext)))
            .find(|path| path.is_file())
    }
}

/// Background music chosen for one video
#[derive(Debug, Clone)]
pub struct MusicBed {
    pub path: PathBuf,
    pub mood: String,
    /// Loop or trim needed to cover the master clock
    pub lock: DurationLock,
    /// Linear amplitude relative to the voice
    pub gain: f32,
}

/// Audio track description: voice padded to the clock, optionally with ducked music
#[derive(Debug, Clone)]
pub struct AudioPlan {
    pub voice: PathBuf,
    pub voice_duration: f64,
    /// Master clock duration; the mixed track is exactly this long
    pub duration: f64,
    pub music: Option<MusicBed>,
}

impl AudioPlan {
    pub fn is_voice_only(&self) -> bool {
        self.music.is_none()
    }
}

/// Plans the voice + music mix with ducking
#[derive(Debug, Clone)]
pub struct AudioMixer {
    library: MoodLibrary,
    duck_level: f32,
}

impl AudioMixer {
    pub fn new(library: MoodLibrary, duck_level: f32) -> Self {
        Self { library, duck_level }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MoodLibrary::new(&config.paths.music_dir, &config.audio.default_mood),
            config.audio.duck_level,
        )
    }

    /// Music gain; a blueprint volume hint can only make the music quieter
    pub fn gain(&self, volume_hint: Option<f32>) -> f32 {
        match volume_hint {
            Some(hint) => hint.clamp(0.0, 1.0).min(self.duck_level),
            None => self.duck_level,
        }
    }

    /// Plan the mixed track for `voice` over `clock`
    ///
    /// Missing music never fails the mix: the requested mood falls back to the
    /// default mood, and without any usable music bed the track is voice only.
    pub fn mix(
        &self,
        voice: &AudioInfo,
        clock: MasterClock,
        requested_mood: Option<&str>,
        volume_hint: Option<f32>,
    ) -> (AudioPlan, Vec<Degradation>) {
        let mut degradations = Vec::new();
        let requested = requested_mood.unwrap_or(self.library.default_mood()).to_string();
        let mood = self.library.canonical_mood(&requested);
        let unknown = requested_mood.is_some() && MoodLibrary::known_mood(&requested).is_none();
        if unknown {
            warn!("Unknown music mood '{}', using '{}'", requested, mood);
        }

        let mut candidates = vec![mood.clone()];
        if mood != self.library.default_mood() {
            candidates.push(self.library.default_mood().to_string());
        }

        let chosen = candidates.iter().find_map(|candidate| {
            let path = self.library.track_for(candidate)?;
            match AudioLoader::probe(&path) {
                Ok(info) => Some((candidate.clone(), info)),
                Err(e) => {
                    warn!("Music bed {:?} unusable: {}", path, e);
                    None
                }
            }
        });

        let music = match chosen {
            Some((used, info)) => {
                if used != mood {
                    warn!("Music mood '{}' unavailable, falling back to '{}'", mood, used);
                }
                if unknown || used != mood {
                    degradations.push(Degradation::MusicFallback {
                        requested: requested.clone(),
                        used: used.clone(),
                    });
                }

                let lock = DurationLock::lock(info.duration, clock.duration());
                let gain = self.gain(volume_hint);
                info!(
                    "   Music: {} ({:.1}s, {:?}, gain {:.2})",
                    used, info.duration, lock.action, gain
                );
                Some(MusicBed {
                    path: info.file_path,
                    mood: used,
                    lock,
                    gain,
                })
            }
            None => {
                warn!("No music available for mood '{}'; voice only", requested);
                degradations.push(Degradation::MusicUnavailable { requested });
                None
            }
        };

        debug!(
            "Audio plan: voice {:.3}s padded to {:.3}s",
            voice.duration,
            clock.duration()
        );

        let plan = AudioPlan {
            voice: voice.file_path.clone(),
            voice_duration: voice.duration,
            duration: clock.duration(),
            music,
        };
        (plan, degradations)
    }

    pub fn library(&self) -> &MoodLibrary {
        &self.library
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::loader::write_silent_wav;
    use std::path::Path;
    use tempfile::tempdir;

    fn voice(dir: &Path, seconds: f64) -> AudioInfo {
        let path = dir.join("voice.wav");
        write_silent_wav(&path, seconds);
        AudioLoader::probe(&path).unwrap()
    }

    #[test]
    fn test_mood_matching() {
        let library = MoodLibrary::new("music", "chill");
        assert_eq!(library.canonical_mood("Upbeat and bright"), "upbeat");
        assert_eq!(library.canonical_mood("PHONK!"), "phonk");
        assert_eq!(library.canonical_mood("melancholic"), "chill");
        assert_eq!(library.canonical_mood(""), "chill");
    }

    #[test]
    fn test_volume_hint_only_lowers() {
        let mixer = AudioMixer::new(MoodLibrary::new("music", "chill"), 0.12);
        assert_eq!(mixer.gain(None), 0.12);
        assert_eq!(mixer.gain(Some(0.05)), 0.05);
        assert_eq!(mixer.gain(Some(0.9)), 0.12);
    }

    #[test]
    fn test_short_music_is_looped_to_clock() {
        let dir = tempdir().unwrap();
        write_silent_wav(&dir.path().join("upbeat.wav"), 4.0);
        let mixer = AudioMixer::new(MoodLibrary::new(dir.path(), "chill"), 0.12);

        let voice = voice(dir.path(), 9.5);
        let (plan, degradations) = mixer.mix(&voice, MasterClock::new(9.5, 0.5), Some("upbeat"), None);

        assert!(degradations.is_empty());
        assert_eq!(plan.duration, 10.0);
        let music = plan.music.unwrap();
        assert_eq!(music.mood, "upbeat");
        assert!(music.lock.is_looped());
        assert!((music.lock.locked_duration() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_mood_falls_back_to_default() {
        let dir = tempdir().unwrap();
        write_silent_wav(&dir.path().join("chill.wav"), 30.0);
        let mixer = AudioMixer::new(MoodLibrary::new(dir.path(), "chill"), 0.12);

        let voice = voice(dir.path(), 5.0);
        let (plan, degradations) = mixer.mix(&voice, MasterClock::new(5.0, 0.5), Some("dramatic"), None);

        let music = plan.music.unwrap();
        assert_eq!(music.mood, "chill");
        assert_eq!(music.lock.locked_duration(), 5.5);
        assert_eq!(
            degradations,
            vec![Degradation::MusicFallback { requested: "dramatic".into(), used: "chill".into() }]
        );
    }

    #[test]
    fn test_unknown_mood_is_recorded_as_fallback() {
        let dir = tempdir().unwrap();
        write_silent_wav(&dir.path().join("chill.wav"), 30.0);
        let mixer = AudioMixer::new(MoodLibrary::new(dir.path(), "chill"), 0.12);

        let voice = voice(dir.path(), 5.0);
        let (plan, degradations) = mixer.mix(&voice, MasterClock::new(5.0, 0.5), Some("melancholic"), None);

        assert_eq!(plan.music.unwrap().mood, "chill");
        assert_eq!(
            degradations,
            vec![Degradation::MusicFallback { requested: "melancholic".into(), used: "chill".into() }]
        );

        let (_, degradations) = mixer.mix(&voice, MasterClock::new(5.0, 0.5), Some("Chill vibes"), None);
        assert!(degradations.is_empty());
    }

    #[test]
    fn test_no_music_means_voice_only() {
        let dir = tempdir().unwrap();
        let mixer = AudioMixer::new(MoodLibrary::new(dir.path().join("empty"), "chill"), 0.12);

        let voice = voice(dir.path(), 3.0);
        let (plan, degradations) = mixer.mix(&voice, MasterClock::new(3.0, 0.5), None, None);

        assert!(plan.is_voice_only());
        assert_eq!(plan.voice, voice.file_path);
        assert!(matches!(degradations[0], Degradation::MusicUnavailable { .. }));
    }
}
