/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pairwise collision resolution.
//!
//! Candidate pairs come from a fixed-size spatial grid rebuilt for every
//! call. Particles whose band reaches past one cell skip the grid and are
//! tested against every live particle instead. Pairs inside the
//! interaction band that are closing produce prioritised
//! [`CollisionEvent`]s; pairs in contact either merge (cannibalism) or
//! bounce elastically.

use std::cmp::Ordering;

use euclid::default::Vector2D;
use rand::Rng;

use super::{TriggerCause, TriggerEvent};
use crate::world::spatial::SpatialGrid;
use crate::world::{Particle, ParticleId, WorldBounds};

/// Distance below which two centres are treated as coincident
const COINCIDENT_DISTANCE: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct CollisionConfig {
    /// Interaction band as a multiple of the summed radii
    pub interaction_band: f32,

    /// Restitution of particle-particle bounces
    pub restitution: f32,

    /// Grid cell size. Particles with `2 * band * radius` above this are
    /// handled outside the grid.
    pub cell_size: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            interaction_band: 2.5,
            restitution: 0.95,
            cell_size: 128.0,
        }
    }
}

/// Ephemeral near-collision record used to pick emphasised pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub a: ParticleId,
    pub b: ParticleId,
    /// Closing speed divided by `max(1, distance)`
    pub priority: f32,
}

/// Output of one resolution pass
#[derive(Debug, Clone, Default)]
pub struct CollisionOutcome {
    /// In pair order, which is the tie-break for [`top_events`]
    pub events: Vec<CollisionEvent>,
    pub triggers: Vec<TriggerEvent>,
    pub merges: usize,
    pub bounces: usize,
}

pub struct CollisionResolver {
    pub config: CollisionConfig,
}

impl CollisionResolver {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    /// Pairs of live particle indices whose centres lie within the
    /// interaction band, sorted.
    pub fn interaction_pairs(&self, particles: &[Particle]) -> Vec<(usize, usize)> {
        let band = self.config.interaction_band;
        let mut grid = SpatialGrid::new(self.config.cell_size);

        // Two grid particles are at most one cell apart when within band.
        let grid_radius = grid.cell_size() / (2.0 * band);
        let mut oversized = Vec::new();
        for (index, particle) in particles.iter().enumerate() {
            if !particle.is_alive() {
                continue;
            }
            if particle.radius <= grid_radius {
                grid.insert(index, particle.planar_position());
            } else {
                oversized.push(index);
            }
        }

        let mut pairs =
            grid.candidate_pairs(|i, j| within_band(&particles[i], &particles[j], band));
        for &big in &oversized {
            for (other, particle) in particles.iter().enumerate() {
                if other == big || !particle.is_alive() {
                    continue;
                }
                // Pairs of two oversized particles are visited from the lower index.
                if other < big && oversized.binary_search(&other).is_ok() {
                    continue;
                }
                if within_band(&particles[big], particle, band) {
                    pairs.push((big.min(other), big.max(other)));
                }
            }
        }
        if !oversized.is_empty() {
            pairs.sort_unstable();
        }
        pairs
    }

    /// Resolve every interacting pair once.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub fn resolve<R: Rng>(
        &self,
        particles: &mut [Particle],
        bounds: &WorldBounds,
        cannibalism: f32,
        rng: &mut R,
    ) -> CollisionOutcome {
        let mut outcome = CollisionOutcome::default();
        let cannibalism = f64::from(cannibalism.clamp(0.0, 1.0));

        for (i, j) in self.interaction_pairs(particles) {
            let (head, tail) = particles.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];
            if !a.is_alive() || !b.is_alive() {
                continue;
            }

            let delta: Vector2D<f32> = b.planar_position() - a.planar_position();
            let distance = delta.length();
            let contact = a.radius + b.radius;
            if distance >= self.config.interaction_band * contact {
                continue;
            }

            let normal = if distance > COINCIDENT_DISTANCE {
                delta / distance
            } else {
                Vector2D::new(1.0, 0.0)
            };
            let relative = b.velocity.xy() - a.velocity.xy();
            let along_normal = relative.dot(normal);

            let closing_speed = -along_normal;
            if closing_speed > 0.0 {
                outcome.events.push(CollisionEvent {
                    a: a.id,
                    b: b.id,
                    priority: closing_speed / distance.max(1.0),
                });
            }

            if distance >= contact {
                continue;
            }

            if cannibalism > 0.0 && rng.gen_bool(cannibalism) {
                absorb(a, b);
                let survivor = if a.is_alive() { a } else { b };
                survivor.position = bounds.contain(survivor.position, survivor.radius);
                outcome.merges += 1;
                outcome.triggers.push(TriggerEvent {
                    particle: *survivor,
                    cause: TriggerCause::Absorption,
                    energy: closing_speed.max(0.0),
                });
                continue;
            }

            if along_normal < 0.0 {
                let (ma, mb) = (a.radius, b.radius);
                let impulse =
                    -(1.0 + self.config.restitution) * along_normal / (1.0 / ma + 1.0 / mb);
                a.velocity.x -= normal.x * impulse / ma;
                a.velocity.y -= normal.y * impulse / ma;
                b.velocity.x += normal.x * impulse / mb;
                b.velocity.y += normal.y * impulse / mb;
                outcome.bounces += 1;
                outcome.triggers.push(TriggerEvent {
                    particle: *a,
                    cause: TriggerCause::Collision,
                    energy: closing_speed,
                });
            }

            let push = normal * ((contact - distance) * 0.5);
            a.position.x -= push.x;
            a.position.y -= push.y;
            b.position.x += push.x;
            b.position.y += push.y;
            a.position = bounds.contain(a.position, a.radius);
            b.position = bounds.contain(b.position, b.radius);
        }

        outcome
    }
}

fn within_band(a: &Particle, b: &Particle, band: f32) -> bool {
    (b.planar_position() - a.planar_position()).length() < band * (a.radius + b.radius)
}

/// Merge the smaller particle into the larger, conserving volume and
/// momentum. Returns the survivor's new state.
pub fn absorb(a: &mut Particle, b: &mut Particle) -> Particle {
    let (survivor, victim) = if a.radius >= b.radius { (a, b) } else { (b, a) };

    let survivor_volume = survivor.radius.powi(3);
    let victim_volume = victim.radius.powi(3);
    let total = survivor_volume + victim_volume;

    if total > 0.0 {
        survivor.velocity =
            (survivor.velocity * survivor_volume + victim.velocity * victim_volume) / total;
    }
    survivor.radius = total.cbrt();
    victim.kill();
    *survivor
}

/// The `k` highest-priority events. Equal priorities keep insertion order.
pub fn top_events(events: &[CollisionEvent], k: usize) -> Vec<CollisionEvent> {
    let mut ranked = events.to_vec();
    ranked.sort_by(|x, y| {
        y.priority
            .partial_cmp(&x.priority)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(k);
    ranked
}
