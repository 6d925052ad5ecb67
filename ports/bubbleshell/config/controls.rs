/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Control surface settings, read fresh every tick.

use serde::{Deserialize, Serialize};

/// Knob values driving the simulation and the audio mapping.
///
/// A plain value: the scheduler takes a copy each tick and never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Time-scale multiplier applied to position integration
    pub tempo: f32,

    /// Downward acceleration coefficient
    pub gravity: f32,

    /// Fission probability coefficient
    #[serde(alias = "buddingChance")]
    pub budding_chance: f32,

    /// Probability that a contacting pair merges instead of bouncing
    pub cannibalism: f32,

    /// Random jitter coefficient
    pub wind: f32,

    /// Probability that a triggered voice plays reversed
    #[serde(alias = "reverseChance")]
    pub reverse_chance: f32,

    /// Attraction, swirl and absorption strength of the central black hole
    #[serde(alias = "blackHole")]
    pub black_hole: f32,

    /// Doppler intensity multiplier
    pub doppler: f32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            tempo: 1.0,
            gravity: 0.2,
            budding_chance: 0.1,
            cannibalism: 0.05,
            wind: 0.1,
            reverse_chance: 0.1,
            black_hole: 0.0,
            doppler: 0.5,
        }
    }
}

impl ControlSettings {
    /// Copy with every field forced into its legal range. Non-finite values
    /// fall back to the default for that field.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let non_negative = |value: f32, fallback: f32| {
            if value.is_finite() {
                value.max(0.0)
            } else {
                fallback
            }
        };
        let probability = |value: f32, fallback: f32| {
            if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };

        Self {
            tempo: non_negative(self.tempo, defaults.tempo),
            gravity: non_negative(self.gravity, defaults.gravity),
            budding_chance: probability(self.budding_chance, defaults.budding_chance),
            cannibalism: probability(self.cannibalism, defaults.cannibalism),
            wind: non_negative(self.wind, defaults.wind),
            reverse_chance: probability(self.reverse_chance, defaults.reverse_chance),
            black_hole: non_negative(self.black_hole, defaults.black_hole),
            doppler: non_negative(self.doppler, defaults.doppler),
        }
    }

    /// Settings with every force, chance and jitter switched off
    pub fn still() -> Self {
        Self {
            tempo: 1.0,
            gravity: 0.0,
            budding_chance: 0.0,
            cannibalism: 0.0,
            wind: 0.0,
            reverse_chance: 0.0,
            black_hole: 0.0,
            doppler: 0.0,
        }
    }
}
