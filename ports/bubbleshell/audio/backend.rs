/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Audio backends that receive play instructions.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::PlayInstruction;

/// How long a voice sounds before the backend disposes of it
pub const VOICE_LIFETIME: Duration = Duration::from_millis(1500);

/// How often the worker wakes up to expire voices when idle
const PRUNE_INTERVAL: Duration = Duration::from_millis(20);

/// Receiver of fire-and-forget play instructions. No call may block on
/// playback.
pub trait AudioBackend {
    fn trigger(&mut self, instruction: &PlayInstruction);

    fn resume(&mut self);

    fn suspend(&mut self);

    /// Current output level in [0, 1]
    fn peak_level(&mut self) -> f32;
}

/// Backend used when no audio output is available
#[derive(Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn trigger(&mut self, _instruction: &PlayInstruction) {}

    fn resume(&mut self) {}

    fn suspend(&mut self) {}

    fn peak_level(&mut self) -> f32 {
        0.0
    }
}

/// Command to send to the audio worker
pub enum AudioCommand {
    /// Start a voice
    Play(PlayInstruction),

    /// Accept voices again
    Resume,

    /// Silence every voice and drop new ones until resumed
    Suspend,

    /// Shutdown the worker
    Shutdown,
}

/// Response from the audio worker
pub enum AudioResponse {
    /// Sum of live voice volumes, clamped to [0, 1]
    PeakLevel(f32),
}

/// A sounding voice, owned by the worker until it expires
struct Voice {
    instruction: PlayInstruction,
    expires_at: Instant,
}

impl Voice {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Backend that hands instructions to a voice-managing worker thread
pub struct ChannelBackend {
    command_tx: Sender<AudioCommand>,
    response_rx: Receiver<AudioResponse>,
    peak: f32,
    worker: Option<JoinHandle<()>>,
}

impl ChannelBackend {
    /// Create and start a new audio worker
    pub fn new() -> Self {
        Self::with_voice_lifetime(VOICE_LIFETIME)
    }

    pub fn with_voice_lifetime(lifetime: Duration) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (response_tx, response_rx) = crossbeam_channel::unbounded();

        let worker = thread::Builder::new()
            .name("bubbleshell-audio".into())
            .spawn(move || run_audio_worker(lifetime, command_rx, response_tx));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Audio worker failed to start, triggers will be dropped: {e}");
                None
            },
        };

        Self {
            command_tx,
            response_rx,
            peak: 0.0,
            worker,
        }
    }

    /// Send a command to the audio worker
    fn send_command(&self, command: AudioCommand) {
        if self.command_tx.send(command).is_err() {
            log::debug!("Audio worker is gone, dropping command");
        }
    }
}

impl Default for ChannelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for ChannelBackend {
    fn trigger(&mut self, instruction: &PlayInstruction) {
        self.send_command(AudioCommand::Play(*instruction));
    }

    fn resume(&mut self) {
        self.send_command(AudioCommand::Resume);
    }

    fn suspend(&mut self) {
        self.send_command(AudioCommand::Suspend);
    }

    fn peak_level(&mut self) -> f32 {
        while let Ok(AudioResponse::PeakLevel(level)) = self.response_rx.try_recv() {
            self.peak = level;
        }
        self.peak
    }
}

impl Drop for ChannelBackend {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Audio worker panicked");
            }
        }
    }
}

/// Own the voices on a background thread, expiring them as they finish
fn run_audio_worker(
    lifetime: Duration,
    command_rx: Receiver<AudioCommand>,
    response_tx: Sender<AudioResponse>,
) {
    let mut voices: Vec<Voice> = Vec::new();
    let mut suspended = false;
    let mut published = 0.0_f32;

    loop {
        match command_rx.recv_timeout(PRUNE_INTERVAL) {
            Ok(AudioCommand::Play(instruction)) => {
                if suspended {
                    log::trace!("Suspended, dropping voice");
                } else {
                    log::trace!(
                        "Voice at {:.1} Hz, pan {:.2}, cutoff {:.0} Hz{}",
                        instruction.frequency_hz(),
                        instruction.pan,
                        instruction.lowpass_cutoff_hz(),
                        if instruction.reverse { ", reversed" } else { "" },
                    );
                    voices.push(Voice {
                        instruction,
                        expires_at: Instant::now() + lifetime,
                    });
                }
            },
            Ok(AudioCommand::Resume) => suspended = false,
            Ok(AudioCommand::Suspend) => {
                suspended = true;
                voices.clear();
            },
            Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {},
        }

        let now = Instant::now();
        voices.retain(|voice| !voice.is_expired(now));

        let level = voices
            .iter()
            .map(|voice| voice.instruction.volume)
            .sum::<f32>()
            .clamp(0.0, 1.0);
        if level != published {
            published = level;
            if response_tx.send(AudioResponse::PeakLevel(level)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(volume: f32) -> PlayInstruction {
        PlayInstruction {
            size_factor: 0.5,
            base_frequency: 220.0,
            pan: 0.0,
            depth: 0.0,
            z_velocity: 0.0,
            doppler_intensity: 0.0,
            reverse: false,
            volume,
        }
    }

    /// Poll the backend until `accept` holds or two seconds pass
    fn wait_for(backend: &mut ChannelBackend, accept: impl Fn(f32) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if accept(backend.peak_level()) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_null_backend_is_silent() {
        let mut backend = NullBackend;
        backend.trigger(&instruction(1.0));
        backend.resume();
        backend.suspend();
        assert_eq!(backend.peak_level(), 0.0);
    }

    #[test]
    fn test_channel_backend_reports_peak_level() {
        let mut backend = ChannelBackend::new();
        backend.trigger(&instruction(0.25));
        backend.trigger(&instruction(0.25));
        assert!(wait_for(&mut backend, |level| (level - 0.5).abs() < 1e-5));

        for _ in 0..8 {
            backend.trigger(&instruction(0.5));
        }
        assert!(wait_for(&mut backend, |level| level == 1.0));
    }

    #[test]
    fn test_voices_expire() {
        let mut backend = ChannelBackend::with_voice_lifetime(Duration::from_millis(30));
        backend.trigger(&instruction(0.4));
        assert!(wait_for(&mut backend, |level| level > 0.0));
        assert!(wait_for(&mut backend, |level| level == 0.0));
    }

    #[test]
    fn test_suspend_silences_and_drops_triggers() {
        let mut backend = ChannelBackend::new();
        backend.trigger(&instruction(0.3));
        assert!(wait_for(&mut backend, |level| level > 0.0));

        backend.suspend();
        assert!(wait_for(&mut backend, |level| level == 0.0));
        backend.trigger(&instruction(0.3));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(backend.peak_level(), 0.0);

        backend.resume();
        backend.trigger(&instruction(0.3));
        assert!(wait_for(&mut backend, |level| level > 0.0));
    }

    #[test]
    fn test_drop_stops_worker() {
        let backend = ChannelBackend::new();
        let command_tx = backend.command_tx.clone();
        drop(backend);
        // The worker dropped its receiver on the way out.
        assert!(command_tx.send(AudioCommand::Resume).is_err());
    }
}
