/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Turning physical triggers into play instructions.
//!
//! [`TriggerMapper`] is a pure mapping from a particle snapshot and the
//! current controls to one [`PlayInstruction`]. It owns no playback state;
//! voices live in whatever [`AudioBackend`] receives the instruction.

pub mod backend;

use bubble_scales::{QuantizeRequest, RoundingMode, ScaleDefinition, ScaleLibrary};
use rand::Rng;

use crate::config::{AudioConfig, ControlSettings};
use crate::world::{Particle, WorldBounds};

pub use backend::{AudioBackend, ChannelBackend, NullBackend};

/// Radius at which a bubble is considered as large as it gets
pub const MAX_RADIUS: f32 = 60.0;

/// Bubbles above this radius sound an octave lower
pub const LARGE_RADIUS: f32 = 40.0;

/// Bubbles below this radius sound an octave higher
pub const SMALL_RADIUS: f32 = 8.0;

/// Pitch shift at unit z velocity and unit doppler intensity
pub const MAX_DOPPLER_CENTS: f32 = 200.0;

/// Quietest volume ever emitted
pub const MIN_VOLUME: f32 = 0.001;

pub const MIN_CUTOFF_HZ: f32 = 200.0;
pub const MAX_CUTOFF_HZ: f32 = 18_000.0;

/// One fire-and-forget voice request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayInstruction {
    /// 1 for a vanishing bubble, 0 at [`MAX_RADIUS`] and above
    pub size_factor: f32,
    /// Voice pitch before doppler, in Hz
    pub base_frequency: f32,
    /// Stereo position in [-1, 1]
    pub pan: f32,
    /// 0 at the front of the world, 1 at the back
    pub depth: f32,
    pub z_velocity: f32,
    pub doppler_intensity: f32,
    pub reverse: bool,
    pub volume: f32,
}

impl PlayInstruction {
    pub fn doppler_cents(&self) -> f32 {
        -MAX_DOPPLER_CENTS * self.z_velocity * self.doppler_intensity
    }

    /// Pitch after the doppler shift
    pub fn frequency_hz(&self) -> f32 {
        self.base_frequency * 2f32.powf(self.doppler_cents() / 1200.0)
    }

    /// Exponential sweep from [`MAX_CUTOFF_HZ`] at the front to
    /// [`MIN_CUTOFF_HZ`] at the back.
    pub fn lowpass_cutoff_hz(&self) -> f32 {
        let depth = self.depth.clamp(0.0, 1.0);
        MAX_CUTOFF_HZ * (MIN_CUTOFF_HZ / MAX_CUTOFF_HZ).powf(depth)
    }
}

/// Snaps mapped frequencies onto a scale.
#[derive(Debug, Clone)]
pub struct Quantizer {
    scale: ScaleDefinition,
    root_midi: i32,
    rounding: RoundingMode,
    no_immediate_repeat: bool,
    no_thirds: bool,
}

impl Quantizer {
    pub fn new(scale: ScaleDefinition, audio: &AudioConfig) -> Self {
        Self {
            scale,
            root_midi: audio.root_midi,
            rounding: audio.rounding,
            no_immediate_repeat: audio.no_immediate_repeat,
            no_thirds: audio.no_thirds,
        }
    }

    /// Look the configured scale up in `library`. Unknown ids leave the
    /// output unquantized.
    pub fn from_config(audio: &AudioConfig, library: &ScaleLibrary) -> Option<Self> {
        let id = audio.scale.as_deref()?;
        match library.get(id) {
            Some(scale) => Some(Self::new(scale.clone(), audio)),
            None => {
                log::warn!("Unknown scale {id:?}, playing unquantized");
                None
            },
        }
    }

    pub fn scale(&self) -> &ScaleDefinition {
        &self.scale
    }

    /// Nearest legal frequency and its MIDI note.
    pub fn quantize_hz(&self, hz: f32, last: Option<i32>) -> (f32, i32) {
        let input = bubble_scales::hz_to_midi(hz);
        let mut request = QuantizeRequest::new(input, self.root_midi, &self.scale)
            .with_mode(self.rounding)
            .with_no_thirds(self.no_thirds);
        if self.no_immediate_repeat {
            request = request.avoiding_repeat_of(last);
        }
        let note = bubble_scales::quantize(&request);
        (bubble_scales::midi_to_hz(note as f32), note)
    }
}

/// Maps trigger particles to play instructions
#[derive(Debug, Clone)]
pub struct TriggerMapper {
    base_frequency: f32,
    volume: f32,
    bounds: WorldBounds,
    quantizer: Option<Quantizer>,
}

impl TriggerMapper {
    pub fn new(audio: &AudioConfig, bounds: WorldBounds) -> Self {
        Self {
            base_frequency: audio.base_frequency.max(1.0),
            volume: audio.volume.clamp(0.0, 1.0),
            bounds,
            quantizer: None,
        }
    }

    pub fn with_quantizer(mut self, quantizer: Option<Quantizer>) -> Self {
        self.quantizer = quantizer;
        self
    }

    pub fn quantizer(&self) -> Option<&Quantizer> {
        self.quantizer.as_ref()
    }

    /// Map one trigger. `last_note` is the previously emitted MIDI note for
    /// repeat avoidance; the returned note (when quantizing) replaces it.
    pub fn map<R: Rng>(
        &self,
        particle: &Particle,
        controls: &ControlSettings,
        last_note: Option<i32>,
        rng: &mut R,
    ) -> (PlayInstruction, Option<i32>) {
        let radius = particle.radius.max(0.0);
        let size_factor = 1.0 - (radius / MAX_RADIUS).clamp(0.0, 1.0);

        let octave = if radius > LARGE_RADIUS {
            0.5
        } else if radius < SMALL_RADIUS {
            2.0
        } else {
            1.0
        };
        let mut base_frequency = self.base_frequency * octave;
        let mut note = None;
        if let Some(quantizer) = &self.quantizer {
            let (hz, midi) = quantizer.quantize_hz(base_frequency, last_note);
            base_frequency = hz;
            note = Some(midi);
        }

        let pan = if self.bounds.width > 0.0 {
            (particle.position.x / self.bounds.width * 2.0 - 1.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let depth = if self.bounds.depth > 0.0 {
            (particle.position.z / self.bounds.depth).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let reverse_chance = f64::from(controls.reverse_chance.clamp(0.0, 1.0));
        let reverse = reverse_chance > 0.0 && rng.gen_bool(reverse_chance);

        let attenuation = 1.0 / (1.0 + 2.0 * depth);
        let volume = (size_factor * attenuation * self.volume).max(MIN_VOLUME);

        let instruction = PlayInstruction {
            size_factor,
            base_frequency,
            pan,
            depth,
            z_velocity: particle.velocity.z,
            doppler_intensity: controls.doppler,
            reverse,
            volume,
        };
        (instruction, note)
    }
}
