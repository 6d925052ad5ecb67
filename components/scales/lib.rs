/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Musical scale definitions and the pitch quantizer.
//!
//! Scales are immutable reference records loaded once at startup, either from
//! the built-in table or from TOML files of `[[scale]]` tables. The quantizer
//! in [`quantize`] is a pure function over a scale and a request.

use serde::Deserialize;

pub mod quantize;

pub use quantize::{QuantizeRequest, RoundingMode, quantize};

/// Tag marking scales whose thirds above the root are excluded when quantizing.
pub const NO_THIRDS_TAG: &str = "no-thirds";

/// MIDI note number of A4.
const A4_MIDI: f32 = 69.0;

/// Frequency of A4 in Hz.
const A4_HZ: f32 = 440.0;

/// An immutable scale: an ordered set of unique pitch-class intervals in [0, 11].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawScale")]
pub struct ScaleDefinition {
    id: String,
    label: String,
    intervals: Vec<u8>,
    tags: Vec<String>,
    avoid_leading_tone: bool,
}

/// Unvalidated scale as it appears in a TOML file.
#[derive(Deserialize)]
struct RawScale {
    id: String,
    label: Option<String>,
    intervals: Vec<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    avoid_leading_tone: bool,
}

impl TryFrom<RawScale> for ScaleDefinition {
    type Error = ScaleError;

    fn try_from(raw: RawScale) -> Result<Self, Self::Error> {
        let mut intervals = Vec::with_capacity(raw.intervals.len());
        for interval in raw.intervals {
            let pitch_class = u8::try_from(interval)
                .ok()
                .filter(|pc| *pc < 12)
                .ok_or_else(|| ScaleError::IntervalOutOfRange {
                    id: raw.id.clone(),
                    interval,
                })?;
            intervals.push(pitch_class);
        }
        let label = raw.label.unwrap_or_else(|| raw.id.clone());
        ScaleDefinition::new(raw.id, label, intervals, raw.tags, raw.avoid_leading_tone)
    }
}

impl ScaleDefinition {
    /// Build a validated scale. Intervals are sorted; duplicates and values
    /// outside [0, 11] are rejected.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        mut intervals: Vec<u8>,
        tags: Vec<String>,
        avoid_leading_tone: bool,
    ) -> Result<Self, ScaleError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ScaleError::MissingId);
        }
        if intervals.is_empty() {
            return Err(ScaleError::EmptyIntervals { id });
        }
        if let Some(&bad) = intervals.iter().find(|pc| **pc > 11) {
            return Err(ScaleError::IntervalOutOfRange {
                id,
                interval: i64::from(bad),
            });
        }
        intervals.sort_unstable();
        if let Some(pair) = intervals.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ScaleError::DuplicateInterval {
                id,
                interval: pair[0],
            });
        }

        Ok(Self {
            id,
            label: label.into(),
            intervals,
            tags,
            avoid_leading_tone,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pitch-class intervals above the root, ascending.
    pub fn intervals(&self) -> &[u8] {
        &self.intervals
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether the leading tone (root + 11) is penalised when quantizing.
    pub fn avoid_leading_tone(&self) -> bool {
        self.avoid_leading_tone
    }
}

/// Errors raised while building or loading scale definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleError {
    MissingId,
    EmptyIntervals { id: String },
    IntervalOutOfRange { id: String, interval: i64 },
    DuplicateInterval { id: String, interval: u8 },
    DuplicateId(String),
    Parse(String),
}

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::MissingId => write!(f, "scale is missing an id"),
            ScaleError::EmptyIntervals { id } => write!(f, "scale '{id}' has no intervals"),
            ScaleError::IntervalOutOfRange { id, interval } => {
                write!(f, "scale '{id}' interval {interval} is outside 0..=11")
            },
            ScaleError::DuplicateInterval { id, interval } => {
                write!(f, "scale '{id}' repeats interval {interval}")
            },
            ScaleError::DuplicateId(id) => write!(f, "scale id '{id}' is defined twice"),
            ScaleError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ScaleError {}

/// File layout accepted by [`ScaleLibrary::merge_toml`].
#[derive(Deserialize)]
struct ScaleFile {
    #[serde(default)]
    scale: Vec<ScaleDefinition>,
}

/// Ordered collection of scales addressable by id.
#[derive(Debug, Clone, Default)]
pub struct ScaleLibrary {
    scales: Vec<ScaleDefinition>,
}

impl ScaleLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the built-in scale table
    pub fn builtin() -> Self {
        const TABLE: &[(&str, &str, &[u8], &[&str], bool)] = &[
            ("chromatic", "Chromatic", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11], &[], false),
            ("major", "Major", &[0, 2, 4, 5, 7, 9, 11], &["diatonic"], true),
            ("natural_minor", "Natural Minor", &[0, 2, 3, 5, 7, 8, 10], &["diatonic"], false),
            ("harmonic_minor", "Harmonic Minor", &[0, 2, 3, 5, 7, 8, 11], &[], false),
            ("dorian", "Dorian", &[0, 2, 3, 5, 7, 9, 10], &["modal"], false),
            ("phrygian", "Phrygian", &[0, 1, 3, 5, 7, 8, 10], &["modal"], false),
            ("lydian", "Lydian", &[0, 2, 4, 6, 7, 9, 11], &["modal"], true),
            ("mixolydian", "Mixolydian", &[0, 2, 4, 5, 7, 9, 10], &["modal"], false),
            ("locrian", "Locrian", &[0, 1, 3, 5, 6, 8, 10], &["modal"], false),
            ("major_pentatonic", "Major Pentatonic", &[0, 2, 4, 7, 9], &["pentatonic"], false),
            ("minor_pentatonic", "Minor Pentatonic", &[0, 3, 5, 7, 10], &["pentatonic"], false),
            ("blues", "Blues", &[0, 3, 5, 6, 7, 10], &[], false),
            ("whole_tone", "Whole Tone", &[0, 2, 4, 6, 8, 10], &["symmetric"], false),
            ("suspended", "Suspended", &[0, 2, 5, 7, 10], &[NO_THIRDS_TAG], false),
            ("open_fifths", "Open Fifths", &[0, 7], &[NO_THIRDS_TAG], false),
        ];

        let scales = TABLE
            .iter()
            .filter_map(|&(id, label, intervals, tags, avoid)| {
                ScaleDefinition::new(
                    id,
                    label,
                    intervals.to_vec(),
                    tags.iter().map(|t| t.to_string()).collect(),
                    avoid,
                )
                .ok()
            })
            .collect();
        Self { scales }
    }

    /// Add a scale; ids must be unique.
    pub fn insert(&mut self, scale: ScaleDefinition) -> Result<(), ScaleError> {
        if self.get(scale.id()).is_some() {
            return Err(ScaleError::DuplicateId(scale.id().to_string()));
        }
        self.scales.push(scale);
        Ok(())
    }

    /// Parse `[[scale]]` tables from TOML and add them. Nothing is added if
    /// any table is invalid.
    pub fn merge_toml(&mut self, contents: &str) -> Result<usize, ScaleError> {
        let file: ScaleFile =
            toml::from_str(contents).map_err(|e| ScaleError::Parse(e.to_string()))?;

        let mut staged = self.clone();
        let count = file.scale.len();
        for scale in file.scale {
            staged.insert(scale)?;
        }
        *self = staged;
        log::debug!("Merged {count} scale definitions");
        Ok(count)
    }

    /// Look up a scale by id
    pub fn get(&self, id: &str) -> Option<&ScaleDefinition> {
        self.scales.iter().find(|s| s.id == id)
    }

    /// Iterate scales in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ScaleDefinition> {
        self.scales.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scales.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }
}

/// Convert a frequency in Hz to a fractional MIDI pitch.
pub fn hz_to_midi(hz: f32) -> f32 {
    A4_MIDI + 12.0 * (hz.max(f32::MIN_POSITIVE) / A4_HZ).log2()
}

/// Convert a (possibly fractional) MIDI pitch to Hz.
pub fn midi_to_hz(midi: f32) -> f32 {
    A4_HZ * 2f32.powf((midi - A4_MIDI) / 12.0)
}
