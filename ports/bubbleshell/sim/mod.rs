/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The explicitly owned simulation state.
//!
//! One [`Simulation::tick`] runs integration, collision resolution and a
//! bounded cull to completion, then captures a [`FrameSnapshot`]. Nothing
//! outside the simulation observes a partially updated population.

pub mod snapshot;

use euclid::default::{Point3D, Vector3D};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ControlSettings, WorldConfig};
use crate::physics::collision::{CollisionConfig, CollisionResolver, top_events};
use crate::physics::{PhysicsConfig, PhysicsEngine, TriggerEvent};
use crate::world::{ParticleId, Population, WorldBounds};

pub use snapshot::{FrameSnapshot, ParticleView};

/// Dead particles removed per tick at most
pub const DEFAULT_CULL_BUDGET: usize = 32;

/// Collision events kept for emphasis
pub const DEFAULT_EMPHASIS: usize = 4;

/// Radius range for seeded particles
const SEED_RADIUS: std::ops::Range<f32> = 6.0..24.0;

/// Per-axis speed range for seeded particles
const SEED_SPEED: f32 = 2.0;

/// Everything one tick produced
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub snapshot: FrameSnapshot,
    /// Wall, bounce and merge triggers in the order they happened
    pub triggers: Vec<TriggerEvent>,
    pub absorbed_by_black_hole: usize,
    pub merges: usize,
    pub bounces: usize,
    pub buds: usize,
    pub culled: usize,
}

pub struct Simulation {
    population: Population,
    bounds: WorldBounds,
    physics: PhysicsEngine,
    resolver: CollisionResolver,
    rng: StdRng,
    tick: u64,
    cull_budget: usize,
    emphasis: usize,
}

impl Simulation {
    pub fn new(world: &WorldConfig) -> Self {
        Self::with_engines(
            world,
            PhysicsEngine::new(PhysicsConfig::default()),
            CollisionResolver::new(CollisionConfig::default()),
        )
    }

    pub fn with_engines(
        world: &WorldConfig,
        physics: PhysicsEngine,
        resolver: CollisionResolver,
    ) -> Self {
        Self {
            population: Population::new(world.population_cap),
            bounds: world.bounds(),
            physics,
            resolver,
            rng: StdRng::seed_from_u64(world.seed),
            tick: 0,
            cull_budget: DEFAULT_CULL_BUDGET,
            emphasis: DEFAULT_EMPHASIS,
        }
    }

    pub fn with_cull_budget(mut self, budget: usize) -> Self {
        self.cull_budget = budget;
        self
    }

    pub fn with_emphasis(mut self, count: usize) -> Self {
        self.emphasis = count;
        self
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Ticks completed so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Add a particle, contained inside the world. Dropped silently when
    /// the population is full.
    pub fn spawn(
        &mut self,
        position: Point3D<f32>,
        velocity: Vector3D<f32>,
        radius: f32,
    ) -> Option<ParticleId> {
        let position = self.bounds.contain(position, radius);
        self.population.spawn(position, velocity, radius, self.tick)
    }

    /// Spawn up to `count` particles at random positions. Returns how many
    /// were actually added.
    pub fn seed_population(&mut self, count: usize) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            if self.population.is_full() {
                break;
            }
            let position = Point3D::new(
                self.rng.gen_range(0.0..=self.bounds.width.max(0.0)),
                self.rng.gen_range(0.0..=self.bounds.height.max(0.0)),
                self.rng.gen_range(0.0..=self.bounds.depth.max(0.0)),
            );
            let velocity = Vector3D::new(
                self.rng.gen_range(-SEED_SPEED..=SEED_SPEED),
                self.rng.gen_range(-SEED_SPEED..=SEED_SPEED),
                self.rng.gen_range(-SEED_SPEED..=SEED_SPEED),
            );
            let radius = self.rng.gen_range(SEED_RADIUS);
            if self.spawn(position, velocity, radius).is_some() {
                spawned += 1;
            }
        }
        log::debug!("Seeded {spawned} of {count} particles");
        spawned
    }

    /// Drop every particle. Only called between ticks.
    pub fn reset(&mut self) {
        log::info!("Resetting simulation at tick {}", self.tick);
        self.population.clear();
    }

    /// Advance the world by one tick under `controls`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(tick = self.tick))
    )]
    pub fn tick(&mut self, controls: &ControlSettings) -> TickReport {
        let controls = controls.sanitized();
        self.tick += 1;

        let integration =
            self.physics
                .step(&mut self.population, &self.bounds, &controls, self.tick, &mut self.rng);
        let collisions = self.resolver.resolve(
            self.population.as_mut_slice(),
            &self.bounds,
            controls.cannibalism,
            &mut self.rng,
        );
        let culled = self.population.cull(self.cull_budget);

        let mut triggers = integration.triggers;
        triggers.extend(collisions.triggers);
        let emphasis = top_events(&collisions.events, self.emphasis);

        TickReport {
            snapshot: FrameSnapshot::capture(self.tick, &self.population, emphasis),
            triggers,
            absorbed_by_black_hole: integration.absorbed_by_black_hole,
            merges: collisions.merges,
            bounces: collisions.bounces,
            buds: integration.buds,
            culled,
        }
    }
}
