//! # Audio Module
//!
//! Measures the voice track that anchors the timeline and plans the
//! voice + music mix.
//!
//! ## Core Features
//!
//! - **Duration probing**: WAV via `hound`, compressed formats via `symphonia`
//! - **Mood library**: resolves a music bed by mood keyword with a default fallback
//! - **Ducking**: music attenuated to a fixed fraction of the voice level
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shorts_compositor::audio::AudioLoader;
//!
//! # fn main() -> anyhow::Result<()> {
//! let voice = AudioLoader::probe("voice_main.mp3")?;
//! println!("Voice lasts {:.2}s", voice.duration);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod mixer;
pub mod types;

pub use loader::AudioLoader;
pub use mixer::{AudioMixer, AudioPlan, MoodLibrary, MusicBed};
pub use types::{AudioFormat, AudioInfo};
