/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Frame scheduling for the bubble instrument.

use std::cmp::Ordering;

use bubble_scales::ScaleLibrary;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::audio::{AudioBackend, Quantizer, TriggerMapper};
use crate::config::{ControlSettings, ShellConfig};
use crate::physics::TriggerEvent;
use crate::sim::{FrameSnapshot, Simulation, TickReport};

/// Offset between the simulation seed and the audio seed
const AUDIO_SEED_OFFSET: u64 = 0xA0D1_0000;

/// What one display frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// False while paused
    pub ticked: bool,
    /// Play instructions sent to the backend
    pub played: usize,
    /// Triggers over the per-tick budget
    pub dropped: usize,
}

/// Main application state
pub struct BubbleApp {
    /// The simulation, advanced exactly once per unpaused frame
    pub simulation: Simulation,

    mapper: TriggerMapper,

    backend: Box<dyn AudioBackend>,

    /// Separate stream so audio draws never perturb the physics
    audio_rng: StdRng,

    max_triggers_per_tick: usize,

    paused: bool,

    /// Snapshot of the last completed tick
    snapshot: FrameSnapshot,

    /// Last quantized note, for repeat avoidance
    last_note: Option<i32>,
}

impl BubbleApp {
    /// Create the app and seed the initial population
    pub fn new(
        config: &ShellConfig,
        library: &ScaleLibrary,
        backend: Box<dyn AudioBackend>,
    ) -> Self {
        let mut simulation = Simulation::new(&config.world);
        let seeded = simulation.seed_population(config.world.initial_particles);

        let quantizer = Quantizer::from_config(&config.audio, library);
        if let Some(quantizer) = &quantizer {
            log::info!("Quantizing to {}", quantizer.scale().label());
        }
        let mapper =
            TriggerMapper::new(&config.audio, config.world.bounds()).with_quantizer(quantizer);

        log::info!(
            "Bubble world {}x{}x{}, {seeded} particles, cap {}",
            config.world.width,
            config.world.height,
            config.world.depth,
            config.world.population_cap,
        );

        Self {
            simulation,
            mapper,
            backend,
            audio_rng: StdRng::seed_from_u64(config.world.seed.wrapping_add(AUDIO_SEED_OFFSET)),
            max_triggers_per_tick: config.audio.max_triggers_per_tick,
            paused: false,
            snapshot: FrameSnapshot::default(),
            last_note: None,
        }
    }

    /// Display refresh callback: run one tick to completion, then voice its
    /// loudest triggers. Does nothing while paused.
    pub fn on_frame(&mut self, controls: &ControlSettings) -> FrameOutcome {
        if self.paused {
            return FrameOutcome::default();
        }

        let controls = controls.sanitized();
        let TickReport {
            snapshot, triggers, ..
        } = self.simulation.tick(&controls);
        self.snapshot = snapshot;

        let (played, dropped) = self.play(triggers, &controls);
        FrameOutcome {
            ticked: true,
            played,
            dropped,
        }
    }

    /// Map the highest-energy triggers within the budget and send them off.
    fn play(
        &mut self,
        mut triggers: Vec<TriggerEvent>,
        controls: &ControlSettings,
    ) -> (usize, usize) {
        triggers.sort_by(|a, b| b.energy.partial_cmp(&a.energy).unwrap_or(Ordering::Equal));
        let budget = self.max_triggers_per_tick.min(triggers.len());
        let dropped = triggers.len() - budget;

        for trigger in &triggers[..budget] {
            let (instruction, note) =
                self.mapper
                    .map(&trigger.particle, controls, self.last_note, &mut self.audio_rng);
            if note.is_some() {
                self.last_note = note;
            }
            self.backend.trigger(&instruction);
        }
        if dropped > 0 {
            log::trace!("Dropped {dropped} triggers over budget");
        }
        (budget, dropped)
    }

    /// Stop scheduling ticks and silence the backend
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.backend.suspend();
            log::info!("Paused at tick {}", self.simulation.tick_count());
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.backend.resume();
            log::info!("Resumed at tick {}", self.simulation.tick_count());
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Clear the world between frames
    pub fn reset(&mut self) {
        self.simulation.reset();
        self.snapshot = FrameSnapshot {
            tick: self.simulation.tick_count(),
            ..FrameSnapshot::default()
        };
        self.last_note = None;
    }

    /// Snapshot of the last completed tick
    pub fn snapshot(&self) -> &FrameSnapshot {
        &self.snapshot
    }

    pub fn peak_level(&mut self) -> f32 {
        self.backend.peak_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlayInstruction;
    use euclid::default::{Point3D, Vector3D};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorded {
        played: Vec<PlayInstruction>,
        suspends: usize,
        resumes: usize,
    }

    struct RecordingBackend(Rc<RefCell<Recorded>>);

    impl AudioBackend for RecordingBackend {
        fn trigger(&mut self, instruction: &PlayInstruction) {
            self.0.borrow_mut().played.push(*instruction);
        }

        fn resume(&mut self) {
            self.0.borrow_mut().resumes += 1;
        }

        fn suspend(&mut self) {
            self.0.borrow_mut().suspends += 1;
        }

        fn peak_level(&mut self) -> f32 {
            0.0
        }
    }

    fn app(initial: usize, budget: usize) -> (BubbleApp, Rc<RefCell<Recorded>>) {
        let mut config = ShellConfig::default();
        config.world.width = 400.0;
        config.world.height = 300.0;
        config.world.depth = 200.0;
        config.world.initial_particles = initial;
        config.audio.max_triggers_per_tick = budget;
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let backend = Box::new(RecordingBackend(recorded.clone()));
        (BubbleApp::new(&config, &ScaleLibrary::builtin(), backend), recorded)
    }

    #[test]
    fn test_paused_frames_do_not_tick() {
        let (mut app, recorded) = app(8, 6);
        app.on_frame(&ControlSettings::default());
        assert_eq!(app.simulation.tick_count(), 1);

        app.pause();
        app.pause();
        let outcome = app.on_frame(&ControlSettings::default());
        assert!(!outcome.ticked);
        assert_eq!(app.simulation.tick_count(), 1);
        assert_eq!(app.snapshot().tick, 1);
        assert_eq!(recorded.borrow().suspends, 1);

        app.toggle_pause();
        assert!(!app.is_paused());
        assert!(app.on_frame(&ControlSettings::default()).ticked);
        assert_eq!(app.simulation.tick_count(), 2);
        assert_eq!(recorded.borrow().resumes, 1);
    }

    #[test]
    fn test_reset_then_frame_is_empty() {
        let (mut app, _) = app(24, 6);
        app.on_frame(&ControlSettings::default());
        assert!(app.snapshot().population() > 0);

        app.reset();
        assert_eq!(app.snapshot().population(), 0);
        app.on_frame(&ControlSettings::default());
        assert_eq!(app.snapshot().population(), 0);
    }

    #[test]
    fn test_trigger_budget_keeps_loudest() {
        let (mut app, recorded) = app(0, 1);
        app.simulation
            .spawn(Point3D::new(12.0, 150.0, 100.0), Vector3D::new(-3.0, 0.0, 0.0), 10.0);
        app.simulation
            .spawn(Point3D::new(388.0, 150.0, 100.0), Vector3D::new(9.0, 0.0, 0.0), 10.0);

        let outcome = app.on_frame(&ControlSettings::still());
        assert_eq!(outcome.played, 1);
        assert_eq!(outcome.dropped, 1);

        let recorded = recorded.borrow();
        assert_eq!(recorded.played.len(), 1);
        // The faster impact is on the right wall.
        assert!(recorded.played[0].pan > 0.9);
    }

    #[test]
    fn test_audio_draws_leave_physics_untouched() {
        let run = |reverse_chance: f32| {
            let (mut app, _) = app(32, 6);
            let controls = ControlSettings {
                reverse_chance,
                ..ControlSettings::default()
            };
            for _ in 0..60 {
                app.on_frame(&controls);
            }
            app.snapshot().clone()
        };
        assert_eq!(run(0.0), run(1.0));
    }
}
