// src/session.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// User-facing toggles that outlive a single clip. The UI hands this to
/// `Player::apply_session` and reads it back with `Player::session`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub volume: f32,
    pub muted: bool,
    /// Restart the clip when it finishes.
    pub repeat: bool,
    /// Start playing as soon as a clip is ready.
    pub autoplay: bool,
    /// Extra gain multiplier applied on top of `volume` (1.0 = no ducking).
    pub duck_level: f32,
    pub playback_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            repeat: false,
            autoplay: false,
            duck_level: 1.0,
            playback_rate: 1.0,
        }
    }
}

fn unit_level(level: f32, fallback: f32) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

impl SessionConfig {
    /// Gain that should actually reach the backend.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            unit_level(self.volume, 0.0) * unit_level(self.duck_level, 1.0)
        }
    }

    /// Levels forced into 0..=1; non-finite ones fall back to silence for
    /// the volume and to no ducking.
    pub fn sanitized(mut self) -> Self {
        self.volume = unit_level(self.volume, 0.0);
        self.duck_level = unit_level(self.duck_level, 1.0);
        self
    }

    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("opening {}", path.as_ref().display()))?;
        let reader = BufReader::new(file);
        let session = serde_json::from_reader(reader)?;
        Ok(session)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    Mp3,
    Wav,
    /// Unsupported media type. Never played, never listed as a filter.
    #[serde(other)]
    Bad,
}

impl SoundKind {
    pub fn from_extension(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp3") => SoundKind::Mp3,
            Some("wav") => SoundKind::Wav,
            _ => SoundKind::Bad,
        }
    }
}

/// One tile from the generated soundboard data file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SoundRecord {
    pub name: String,
    /// URL-encoded path relative to the soundboard root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: SoundKind,
    #[serde(default)]
    pub category: String,
}

impl SoundRecord {
    pub fn is_playable(&self) -> bool {
        self.kind != SoundKind::Bad
    }
}

/// All tiles of a soundboard, in file order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Catalog {
    pub sounds: Vec<SoundRecord>,
}

impl Catalog {
    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("opening catalog {}", path.as_ref().display()))?;
        let catalog = serde_json::from_reader(BufReader::new(file))?;
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn playable(&self) -> impl Iterator<Item = &SoundRecord> {
        self.sounds.iter().filter(|s| s.is_playable())
    }

    /// Distinct categories of playable sounds, sorted. `bad` tiles never
    /// register a filter.
    pub fn categories(&self) -> Vec<String> {
        self.playable()
            .map(|s| s.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Playable sounds in `category`; `"*"` matches everything.
    pub fn filter<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a SoundRecord> {
        self.playable()
            .filter(move |s| category == "*" || s.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"[
        { "name": "Boom", "path": "drums/boom.wav", "type": "wav", "category": "drums" },
        { "name": "Honk", "path": "horns/honk.mp3", "type": "mp3", "category": "horns" },
        { "name": "Odd", "path": "misc/odd.xyz", "type": "bad", "category": "misc" },
        { "name": "Snare", "path": "drums/snare%20hit.wav", "type": "wav", "category": "drums" },
        { "name": "Strange", "path": "misc/strange.ogg", "type": "ogg", "category": "weird" }
    ]"#;

    #[test]
    fn bad_tiles_are_not_playable_and_register_no_filter() {
        let catalog = Catalog::from_json_str(DATA).unwrap();

        assert_eq!(catalog.sounds.len(), 5);
        assert_eq!(catalog.playable().count(), 3);
        assert_eq!(catalog.categories(), vec!["drums", "horns"]);
        assert_eq!(catalog.sounds[4].kind, SoundKind::Bad);
    }

    #[test]
    fn filter_by_category() {
        let catalog = Catalog::from_json_str(DATA).unwrap();
        let drums: Vec<_> = catalog.filter("drums").map(|s| s.name.as_str()).collect();
        assert_eq!(drums, vec!["Boom", "Snare"]);
        assert_eq!(catalog.filter("*").count(), 3);
        assert_eq!(catalog.filter("misc").count(), 0);
    }

    #[test]
    fn effective_volume_respects_mute_and_duck() {
        let mut session = SessionConfig::default();
        assert_eq!(session.effective_volume(), 1.0);
        session.duck_level = 0.5;
        assert!((session.effective_volume() - 0.5).abs() < 1e-6);
        session.muted = true;
        assert_eq!(session.effective_volume(), 0.0);
    }

    #[test]
    fn nan_duck_level_does_not_reach_the_gain() {
        let mut session = SessionConfig::default();
        session.duck_level = f32::NAN;
        assert_eq!(session.effective_volume(), 1.0);
        assert_eq!(session.sanitized().duck_level, 1.0);
    }

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = SessionConfig {
            volume: 0.3,
            repeat: true,
            ..SessionConfig::default()
        };
        session.save_to_disk(&path).unwrap();
        assert_eq!(SessionConfig::load_from_disk(&path).unwrap(), session);
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(SoundKind::from_extension("a/B.WAV"), SoundKind::Wav);
        assert_eq!(SoundKind::from_extension("x.mp3"), SoundKind::Mp3);
        assert_eq!(SoundKind::from_extension("x.txt"), SoundKind::Bad);
    }
}
