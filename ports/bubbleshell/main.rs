/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Headless driver: runs the frame scheduler and voices triggers through
//! the channel audio backend.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use bpaf::Bpaf;
use bubble_scales::ScaleLibrary;
use bubbleshell::audio::ChannelBackend;
use bubbleshell::search::resolve_scale_id;
use bubbleshell::{BubbleApp, ShellConfig};

/// Display refresh rate the scheduler is paced at with `--realtime`
const FRAME_RATE: f64 = 60.0;

/// Frames between summary log lines
const SUMMARY_INTERVAL: u64 = 120;

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
/// Bubble-particle generative instrument
struct Options {
    /// Config file to load instead of the per-user one
    #[bpaf(long, argument("PATH"))]
    config: Option<PathBuf>,

    /// Number of frames to run
    #[bpaf(long, argument("N"), fallback(600))]
    frames: u64,

    /// Seed for the simulation and audio random streams
    #[bpaf(long, argument("N"))]
    seed: Option<u64>,

    /// Particles spawned at start
    #[bpaf(long, argument("N"))]
    particles: Option<usize>,

    /// Scale to quantize to, matched fuzzily against ids and names
    #[bpaf(long, argument("QUERY"))]
    scale: Option<String>,

    /// Pace frames at the display refresh rate
    #[bpaf(long, switch)]
    realtime: bool,
}

fn main() {
    init_logging();
    let options = options().run();

    let mut config = match &options.config {
        Some(path) => ShellConfig::load_or_default(path),
        None => ShellConfig::load(),
    };
    if let Some(seed) = options.seed {
        config.world.seed = seed;
    }
    if let Some(particles) = options.particles {
        config.world.initial_particles = particles;
    }

    let library = load_scales();
    if let Some(query) = &options.scale {
        match resolve_scale_id(&library, query) {
            Some(id) => config.audio.scale = Some(id),
            None => log::warn!("No scale matches {query:?}, playing unquantized"),
        }
    }

    let backend = Box::new(ChannelBackend::new());
    let mut app = BubbleApp::new(&config, &library, backend);
    run(&mut app, &config, options.frames, options.realtime);
}

fn init_logging() {
    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
            return;
        }
    }

    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Logging unavailable: {e}");
    }
}

/// Built-in scales plus any the user defined next to the config
fn load_scales() -> ScaleLibrary {
    let mut library = ScaleLibrary::builtin();
    let path = ShellConfig::scales_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => match library.merge_toml(&contents) {
            Ok(count) => log::info!("Loaded {count} scales from {}", path.display()),
            Err(e) => log::warn!("Ignoring scales at {}: {e}", path.display()),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => log::warn!("Could not read {}: {e}", path.display()),
    }
    library
}

fn run(app: &mut BubbleApp, config: &ShellConfig, frames: u64, realtime: bool) {
    let frame_time = Duration::from_secs_f64(1.0 / FRAME_RATE);
    let mut next_frame = Instant::now();
    let mut played = 0;
    let mut dropped = 0;

    for frame in 1..=frames {
        let outcome = app.on_frame(&config.controls);
        played += outcome.played;
        dropped += outcome.dropped;

        if frame % SUMMARY_INTERVAL == 0 || frame == frames {
            let peak = app.peak_level();
            let snapshot = app.snapshot();
            let emphasis = snapshot
                .emphasis
                .first()
                .map(|e| format!("{:?}/{:?} at {:.2}", e.a, e.b, e.priority))
                .unwrap_or_else(|| "none".into());
            log::info!(
                "Tick {}: {} bubbles, {played} voices ({dropped} over budget), top pair {emphasis}, peak {:.2}",
                snapshot.tick,
                snapshot.population(),
                peak,
            );
        }

        if realtime {
            next_frame += frame_time;
            let now = Instant::now();
            if next_frame > now {
                thread::sleep(next_frame - now);
            } else {
                next_frame = now;
            }
        }
    }
}
