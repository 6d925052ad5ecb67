/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Snap continuous pitches onto the legal notes of a scale.
//!
//! Identical requests always produce identical results: candidates are
//! ordered by score, then raw distance, then absolute pitch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{NO_THIRDS_TAG, ScaleDefinition};

/// Score added to candidates on the leading tone when it is being avoided.
const LEADING_TONE_PENALTY: f32 = 0.25;

/// Inputs are clamped to this many semitones either side of MIDI 0.
const PITCH_LIMIT: f32 = 1024.0;

/// Direction in which the input may be moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    Nearest,
    /// Prefer legal pitches at or below the input
    Down,
    /// Prefer legal pitches at or above the input
    Up,
}

/// Input to [`quantize`].
#[derive(Debug, Clone, Copy)]
pub struct QuantizeRequest<'a> {
    /// Fractional MIDI pitch to snap
    pub input: f32,
    /// MIDI pitch of the scale root
    pub root: i32,
    pub scale: &'a ScaleDefinition,
    pub mode: RoundingMode,
    /// Previously chosen pitch, for repeat avoidance
    pub last: Option<i32>,
    pub no_immediate_repeat: bool,
    /// Drop the minor and major third above the root
    pub no_thirds: bool,
    /// Overrides the scale's own leading-tone flag when set
    pub avoid_leading_tone: Option<bool>,
}

impl<'a> QuantizeRequest<'a> {
    pub fn new(input: f32, root: i32, scale: &'a ScaleDefinition) -> Self {
        Self {
            input,
            root,
            scale,
            mode: RoundingMode::Nearest,
            last: None,
            no_immediate_repeat: false,
            no_thirds: false,
            avoid_leading_tone: None,
        }
    }

    pub fn with_mode(mut self, mode: RoundingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Avoid returning `last` again when another candidate exists.
    pub fn avoiding_repeat_of(mut self, last: Option<i32>) -> Self {
        self.last = last;
        self.no_immediate_repeat = true;
        self
    }

    pub fn with_no_thirds(mut self, no_thirds: bool) -> Self {
        self.no_thirds = no_thirds;
        self
    }

    pub fn with_leading_tone_avoidance(mut self, avoid: bool) -> Self {
        self.avoid_leading_tone = Some(avoid);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    pitch: i32,
    distance: f32,
    score: f32,
}

impl Candidate {
    fn order(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.distance.total_cmp(&other.distance))
            .then(self.pitch.cmp(&other.pitch))
    }
}

/// Pitch classes the request may land on, after transposition and the
/// optional third exclusion. Never empty.
pub fn allowed_pitch_classes(request: &QuantizeRequest<'_>) -> Vec<u8> {
    let root_class = request.root.rem_euclid(12);
    let transposed: Vec<u8> = request
        .scale
        .intervals()
        .iter()
        .map(|&interval| (root_class + i32::from(interval)).rem_euclid(12) as u8)
        .collect();

    let no_thirds = request.no_thirds || request.scale.has_tag(NO_THIRDS_TAG);
    if !no_thirds {
        return transposed;
    }

    let filtered: Vec<u8> = transposed
        .iter()
        .copied()
        .filter(|&pc| {
            let interval = (i32::from(pc) - root_class).rem_euclid(12);
            interval != 3 && interval != 4
        })
        .collect();

    if filtered.is_empty() {
        log::debug!(
            "Third exclusion would empty scale '{}', keeping it whole",
            request.scale.id()
        );
        transposed
    } else {
        filtered
    }
}

/// Return the legal integer pitch closest to `request.input`.
pub fn quantize(request: &QuantizeRequest<'_>) -> i32 {
    let allowed = allowed_pitch_classes(request);
    let input = if request.input.is_finite() {
        request.input
    } else {
        request.root as f32
    }
    .clamp(-PITCH_LIMIT, PITCH_LIMIT);

    let avoid_leading_tone = request
        .avoid_leading_tone
        .unwrap_or_else(|| request.scale.avoid_leading_tone());
    let leading_tone = (request.root.rem_euclid(12) + 11).rem_euclid(12) as u8;
    let octave_base = (input / 12.0).floor() as i32 * 12;

    let mut candidates = Vec::with_capacity(allowed.len() * 3);
    for octave in [-12, 0, 12] {
        for &pc in &allowed {
            let pitch = octave_base + octave + i32::from(pc);
            let distance = (pitch as f32 - input).abs();
            let penalty = if avoid_leading_tone && pc == leading_tone {
                LEADING_TONE_PENALTY
            } else {
                0.0
            };
            candidates.push(Candidate {
                pitch,
                distance,
                score: distance + penalty,
            });
        }
    }
    candidates.sort_by(Candidate::order);

    let directed: Vec<Candidate> = match request.mode {
        RoundingMode::Nearest => Vec::new(),
        RoundingMode::Down => candidates
            .iter()
            .copied()
            .filter(|c| c.pitch as f32 <= input)
            .collect(),
        RoundingMode::Up => candidates
            .iter()
            .copied()
            .filter(|c| c.pitch as f32 >= input)
            .collect(),
    };
    let pool = if directed.is_empty() {
        &candidates
    } else {
        &directed
    };

    let mut chosen = pool[0].pitch;
    if request.no_immediate_repeat {
        if let Some(last) = request.last {
            if chosen == last {
                if let Some(next) = pool
                    .iter()
                    .chain(candidates.iter())
                    .find(|c| c.pitch != last)
                {
                    chosen = next.pitch;
                }
            }
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScaleLibrary;

    fn scale(id: &str) -> ScaleDefinition {
        ScaleLibrary::builtin().get(id).unwrap().clone()
    }

    #[test]
    fn test_minor_pentatonic_scenario() {
        let minor_pentatonic = scale("minor_pentatonic");
        let result = quantize(&QuantizeRequest::new(61.0, 60, &minor_pentatonic));
        assert!(result == 60 || result == 63);
        assert_eq!(result, 60);
    }

    #[test]
    fn test_legal_pitch_is_unchanged() {
        let library = ScaleLibrary::builtin();
        for scale in library.iter() {
            for root in [48, 60, 61, 66] {
                let allowed = allowed_pitch_classes(&QuantizeRequest::new(0.0, root, scale));
                for pitch in 36..96_i32 {
                    if allowed.contains(&(pitch.rem_euclid(12) as u8)) {
                        let request = QuantizeRequest::new(pitch as f32, root, scale);
                        assert_eq!(quantize(&request), pitch, "scale {}", scale.id());
                    }
                }
            }
        }
    }

    #[test]
    fn test_result_is_always_legal() {
        let library = ScaleLibrary::builtin();
        let modes = [RoundingMode::Nearest, RoundingMode::Down, RoundingMode::Up];
        for scale in library.iter() {
            for mode in modes {
                let mut input = 20.0_f32;
                while input < 110.0 {
                    let request = QuantizeRequest::new(input, 62, scale)
                        .with_mode(mode)
                        .with_no_thirds(true);
                    let allowed = allowed_pitch_classes(&request);
                    let pitch = quantize(&request);
                    assert!(allowed.contains(&(pitch.rem_euclid(12) as u8)));
                    input += 0.37;
                }
            }
        }
    }

    #[test]
    fn test_rounding_direction() {
        let major = scale("major");
        // 61 sits between 60 and 62 in C major.
        let down = QuantizeRequest::new(61.0, 60, &major).with_mode(RoundingMode::Down);
        let up = QuantizeRequest::new(61.0, 60, &major).with_mode(RoundingMode::Up);
        assert_eq!(quantize(&down), 60);
        assert_eq!(quantize(&up), 62);

        let fractional = QuantizeRequest::new(61.9, 60, &major).with_mode(RoundingMode::Down);
        assert_eq!(quantize(&fractional), 60);
    }

    #[test]
    fn test_tie_breaks_towards_lower_pitch() {
        let major = scale("major");
        // 61 is equidistant from 60 and 62.
        assert_eq!(quantize(&QuantizeRequest::new(61.0, 60, &major)), 60);
    }

    #[test]
    fn test_leading_tone_penalty_breaks_near_ties() {
        let major = scale("major");
        // 71.4 is 0.4 from B (leading tone) and 0.6 from C.
        let request = QuantizeRequest::new(71.4, 60, &major);
        assert_eq!(quantize(&request), 72);

        let without = request.with_leading_tone_avoidance(false);
        assert_eq!(quantize(&without), 71);
    }

    #[test]
    fn test_no_thirds_removes_thirds() {
        let major = scale("major");
        let request = QuantizeRequest::new(64.0, 60, &major).with_no_thirds(true);
        let allowed = allowed_pitch_classes(&request);
        assert!(!allowed.contains(&4));
        assert!(!allowed.contains(&3));
        assert_ne!(quantize(&request), 64);
    }

    #[test]
    fn test_no_thirds_never_empties_the_set() {
        let thirds = ScaleDefinition::new("thirds", "Thirds", vec![3, 4], Vec::new(), false)
            .unwrap();
        let request = QuantizeRequest::new(63.2, 60, &thirds).with_no_thirds(true);
        assert_eq!(allowed_pitch_classes(&request), vec![3, 4]);
        assert_eq!(quantize(&request), 63);
    }

    #[test]
    fn test_no_thirds_tag_applies_without_flag() {
        let library = ScaleLibrary::builtin();
        let open = library.get("open_fifths").unwrap();
        let request = QuantizeRequest::new(61.0, 61, open);
        assert_eq!(allowed_pitch_classes(&request), vec![1, 8]);
    }

    #[test]
    fn test_repeat_avoidance() {
        let minor_pentatonic = scale("minor_pentatonic");
        let mut last = None;
        for step in 0..40 {
            let input = 60.0 + (step % 5) as f32 * 0.1;
            let request =
                QuantizeRequest::new(input, 60, &minor_pentatonic).avoiding_repeat_of(last);
            let pitch = quantize(&request);
            if let Some(previous) = last {
                assert_ne!(pitch, previous);
            }
            last = Some(pitch);
        }
    }

    #[test]
    fn test_repeat_avoidance_with_directed_mode() {
        let open = scale("open_fifths");
        let request = QuantizeRequest::new(60.0, 60, &open)
            .with_mode(RoundingMode::Down)
            .avoiding_repeat_of(Some(60));
        let pitch = quantize(&request);
        assert_ne!(pitch, 60);
        assert_eq!(pitch, 55);
    }

    #[test]
    fn test_deterministic() {
        let blues = scale("blues");
        let request = QuantizeRequest::new(57.3, 45, &blues)
            .with_mode(RoundingMode::Up)
            .avoiding_repeat_of(Some(58));
        let first = quantize(&request);
        for _ in 0..10 {
            assert_eq!(quantize(&request), first);
        }
    }

    #[test]
    fn test_non_finite_input_falls_back_to_root() {
        let major = scale("major");
        assert_eq!(quantize(&QuantizeRequest::new(f32::NAN, 60, &major)), 60);
    }

    #[test]
    fn test_extreme_input_is_clamped_to_a_legal_pitch() {
        let major = scale("major");
        for input in [1e10, -1e10, f32::MAX, f32::MIN] {
            let request = QuantizeRequest::new(input, 60, &major);
            let allowed = allowed_pitch_classes(&request);
            let pitch = quantize(&request);
            assert!(pitch.abs() <= 1024 + 12, "input {input} gave {pitch}");
            assert!(allowed.contains(&(pitch.rem_euclid(12) as u8)));
        }
    }

    #[test]
    fn test_extreme_root_keeps_its_pitch_class() {
        let major = scale("major");
        for root in [i32::MAX, i32::MIN] {
            let request = QuantizeRequest::new(61.0, root, &major);
            let allowed = allowed_pitch_classes(&request);
            assert!(allowed.contains(&(root.rem_euclid(12) as u8)));
            assert!(allowed.contains(&(quantize(&request).rem_euclid(12) as u8)));

            // Non-finite input falls back to the root, clamped into range.
            let pitch = quantize(&QuantizeRequest::new(f32::NAN, root, &major));
            assert!(pitch.abs() <= 1024 + 12);
        }
    }
}
