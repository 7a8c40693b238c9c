//! Local sound effect table.

use std::collections::BTreeMap;

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use serde::{Deserialize, Serialize};

/// A sound file with a relative selection weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedSound {
    pub file: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

const fn default_weight() -> u32 {
    1
}

impl WeightedSound {
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            weight: default_weight(),
        }
    }
}

/// What a sound token plays.
///
/// In JSON a single file is a plain string; a choice is a list of
/// `{ "file": ..., "weight": ... }` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SoundAction {
    Single(String),
    Weighted(Vec<WeightedSound>),
}

impl SoundAction {
    /// Choose the file to play. `None` for an empty or all-zero-weight list.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        match self {
            Self::Single(file) => Some(file.as_str()),
            Self::Weighted(choices) => {
                let index = WeightedIndex::new(choices.iter().map(|c| c.weight)).ok()?;
                choices.get(index.sample(rng)).map(|c| c.file.as_str())
            }
        }
    }
}

/// The stock coughs, sighs, swallows and breaths.
#[must_use]
pub fn default_sound_library() -> BTreeMap<String, SoundAction> {
    BTreeMap::from([
        ("[咳嗽]".to_string(), SoundAction::Single("咳嗽声.WAV".to_string())),
        ("[叹气]".to_string(), SoundAction::Single("叹气声.WAV".to_string())),
        ("[吞咽]".to_string(), SoundAction::Single("吞咽声.WAV".to_string())),
        (
            "[呼吸]".to_string(),
            SoundAction::Weighted(vec![
                WeightedSound::new("呼吸1.WAV"),
                WeightedSound::new("呼吸2.WAV"),
                WeightedSound::new("呼吸3.WAV"),
            ]),
        ),
    ])
}
