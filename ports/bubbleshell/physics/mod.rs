/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bubble physics: force integration, wall reflection and budding.
//!
//! Per particle, in order:
//! - gravity and wind jitter
//! - black hole pull, swirl, spaghettification and absorption
//! - position integration scaled by tempo
//! - wall reflection with restitution (and floor settling under heavy gravity)
//! - velocity stretch
//! - budding
//!
//! Pair interactions live in [`collision`].

use euclid::default::{Point3D, Vector2D, Vector3D};
use rand::Rng;

use crate::config::ControlSettings;
use crate::util::finite_or_zero;
use crate::world::{Deformation, Particle, Population, WorldBounds};

pub mod collision;

/// Volume ratio of a bud: parent and child both end at `r * 2^(-1/3)`.
const BUD_RADIUS_FACTOR: f32 = 0.793_700_5;

/// Physics engine tuning
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Velocity added per tick per unit of gravity
    pub gravity_scale: f32,

    /// Maximum jitter per axis per unit of wind
    pub wind_scale: f32,

    /// Absorption radius around the black hole per unit of strength
    pub absorption_radius: f32,

    /// Radial pull numerator per unit of strength (divided by distance²)
    pub attraction: f32,

    /// Distance clamp for the inverse-square pull
    pub min_attraction_distance: f32,

    /// Tangential acceleration per unit of strength
    pub swirl: f32,

    /// Extra elongation at full strength close to the black hole
    pub spaghetti_stretch: f32,

    /// Distance inside which spaghettification reaches full effect
    pub spaghetti_reach: f32,

    /// Exponential smoothing factor for deformation changes
    pub smoothing: f32,

    /// Velocity kept after a wall bounce
    pub wall_restitution: f32,

    /// Velocity kept after a floor bounce under elevated gravity
    pub floor_damping: f32,

    /// Gravity coefficient above which the floor damps harder
    pub elevated_gravity: f32,

    /// Floor bounce speed below which a particle comes to rest
    pub rest_epsilon: f32,

    /// Wall impact speed needed to trigger a sound
    pub min_impact_speed: f32,

    /// Wall sounds are muted at or above this black hole strength
    pub wall_sound_cutoff: f32,

    /// Velocity stretch is disabled at or above this black hole strength
    pub stretch_cutoff: f32,

    /// Deformation tolerance for "near neutral"
    pub neutral_tolerance: f32,

    /// Elongation per unit of speed
    pub velocity_stretch: f32,

    /// Upper bound on velocity elongation
    pub max_velocity_stretch: f32,

    /// Per-tick budding probability per unit of budding chance
    pub budding_rate: f32,

    /// Particles at or below this radius never bud
    pub min_bud_radius: f32,

    /// Ticks a particle must wait between buds
    pub bud_cooldown_ticks: u64,

    /// Speed given to a fresh bud relative to its parent
    pub bud_kick: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_scale: 0.2,
            wind_scale: 0.6,
            absorption_radius: 24.0,
            attraction: 1800.0,
            min_attraction_distance: 12.0,
            swirl: 0.8,
            spaghetti_stretch: 1.6,
            spaghetti_reach: 160.0,
            smoothing: 0.1,
            wall_restitution: 0.8,
            floor_damping: 0.5,
            elevated_gravity: 1.0,
            rest_epsilon: 0.5,
            min_impact_speed: 1.5,
            wall_sound_cutoff: 0.3,
            stretch_cutoff: 0.2,
            neutral_tolerance: 0.35,
            velocity_stretch: 0.03,
            max_velocity_stretch: 0.3,
            budding_rate: 0.02,
            min_bud_radius: 10.0,
            bud_cooldown_ticks: 45,
            bud_kick: 0.8,
        }
    }
}

/// What produced a trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerCause {
    /// Wall or floor hit
    WallImpact,
    /// Elastic bounce between two particles
    Collision,
    /// Survivor of a volume-conserving merge
    Absorption,
}

/// A physical event that should be heard. Carries the particle state at
/// the moment of the event.
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent {
    pub particle: Particle,
    pub cause: TriggerCause,
    /// Impact or closing speed, used to rank triggers within a tick
    pub energy: f32,
}

/// Counters from one integration pass
#[derive(Debug, Clone, Default)]
pub struct IntegrationReport {
    pub triggers: Vec<TriggerEvent>,
    pub absorbed_by_black_hole: usize,
    pub buds: usize,
}

/// Physics simulation state
pub struct PhysicsEngine {
    /// Configuration
    pub config: PhysicsConfig,
}

impl PhysicsEngine {
    /// Create a new physics engine
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Run one integration pass over every live particle.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub fn step<R: Rng>(
        &self,
        population: &mut Population,
        bounds: &WorldBounds,
        controls: &ControlSettings,
        tick: u64,
        rng: &mut R,
    ) -> IntegrationReport {
        let cfg = &self.config;
        let mut report = IntegrationReport::default();
        let mut room = population.room();
        let mut buds: Vec<(Point3D<f32>, Vector3D<f32>, f32)> = Vec::new();
        let bud_probability = (controls.budding_chance * cfg.budding_rate).clamp(0.0, 1.0);

        for particle in population.as_mut_slice().iter_mut() {
            if !particle.is_alive() {
                continue;
            }
            sanitize(particle);

            self.apply_gravity_and_wind(particle, controls, rng);

            if controls.black_hole > 0.0 {
                if self.apply_black_hole(particle, bounds, controls.black_hole) {
                    report.absorbed_by_black_hole += 1;
                    continue;
                }
            } else {
                particle.deformation.relax(cfg.smoothing);
            }

            particle.position += particle.velocity * controls.tempo;

            let impact = self.resolve_walls(particle, bounds, controls.gravity);
            if impact > cfg.min_impact_speed && controls.black_hole < cfg.wall_sound_cutoff {
                report.triggers.push(TriggerEvent {
                    particle: *particle,
                    cause: TriggerCause::WallImpact,
                    energy: impact,
                });
            }

            if controls.black_hole < cfg.stretch_cutoff {
                self.apply_velocity_stretch(particle);
            }

            if room > 0
                && bud_probability > 0.0
                && particle.radius > cfg.min_bud_radius
                && tick.saturating_sub(particle.last_budding_tick) >= cfg.bud_cooldown_ticks
                && rng.gen_bool(f64::from(bud_probability))
            {
                particle.radius *= BUD_RADIUS_FACTOR;
                particle.last_budding_tick = tick;
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let kick = Vector3D::new(angle.cos(), angle.sin(), 0.0) * cfg.bud_kick;
                buds.push((particle.position, particle.velocity + kick, particle.radius));
                room -= 1;
            }
        }

        for (position, velocity, radius) in buds {
            if population.spawn(position, velocity, radius, tick).is_some() {
                report.buds += 1;
            }
        }
        if report.buds > 0 {
            log::debug!("Tick {tick}: {} buds", report.buds);
        }

        report
    }

    fn apply_gravity_and_wind<R: Rng>(
        &self,
        particle: &mut Particle,
        controls: &ControlSettings,
        rng: &mut R,
    ) {
        particle.velocity.y += controls.gravity * self.config.gravity_scale;

        if controls.wind > 0.0 {
            let gust = controls.wind * self.config.wind_scale;
            particle.velocity += Vector3D::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * gust;
        }
    }

    /// Pull, swirl and stretch towards the world centre. Returns true when
    /// the particle was absorbed.
    fn apply_black_hole(
        &self,
        particle: &mut Particle,
        bounds: &WorldBounds,
        strength: f32,
    ) -> bool {
        let cfg = &self.config;
        let to_center: Vector2D<f32> = bounds.center() - particle.planar_position();
        let distance = to_center.length();

        if distance < cfg.absorption_radius * strength {
            particle.kill();
            return true;
        }

        let clamped = distance.max(cfg.min_attraction_distance);
        let radial = if distance > 0.0 {
            to_center / distance
        } else {
            Vector2D::zero()
        };
        let tangent = Vector2D::new(-radial.y, radial.x);

        let pull = cfg.attraction * strength / (clamped * clamped);
        let force = radial * pull + tangent * (cfg.swirl * strength);
        particle.velocity.x += force.x;
        particle.velocity.y += force.y;

        let proximity = (cfg.spaghetti_reach / clamped).min(1.0);
        let stretch = 1.0 + cfg.spaghetti_stretch * strength * proximity;
        let target = Deformation::stretched(stretch, tangent.y.atan2(tangent.x));
        particle.deformation.approach(target, cfg.smoothing);

        false
    }

    /// Clamp the particle inside the world, reflecting and damping the
    /// violating velocity components. Returns the strongest impact speed.
    fn resolve_walls(&self, particle: &mut Particle, bounds: &WorldBounds, gravity: f32) -> f32 {
        let cfg = &self.config;
        let radius = particle.radius;
        let heavy = gravity > cfg.elevated_gravity;
        let mut impact = 0.0_f32;

        let reflect = |position: &mut f32, velocity: &mut f32, extent: f32, floor: bool| -> f32 {
            let (lo, hi) = WorldBounds::axis_range(extent, radius);
            if *position < lo {
                *position = lo;
                if *velocity < 0.0 {
                    let speed = -*velocity;
                    *velocity = speed * cfg.wall_restitution;
                    return speed;
                }
            } else if *position > hi {
                *position = hi;
                if *velocity > 0.0 {
                    let speed = *velocity;
                    if floor && heavy {
                        *velocity = -speed * cfg.floor_damping;
                        if velocity.abs() < cfg.rest_epsilon {
                            *velocity = 0.0;
                        }
                    } else {
                        *velocity = -speed * cfg.wall_restitution;
                    }
                    return speed;
                }
            }
            0.0
        };

        let position = &mut particle.position;
        let velocity = &mut particle.velocity;
        impact = impact.max(reflect(&mut position.x, &mut velocity.x, bounds.width, false));
        impact = impact.max(reflect(&mut position.y, &mut velocity.y, bounds.height, true));
        impact = impact.max(reflect(&mut position.z, &mut velocity.z, bounds.depth, false));
        impact
    }

    /// Elongate along the heading in proportion to speed, only while the
    /// shape is close to round so the stretch cannot compound.
    fn apply_velocity_stretch(&self, particle: &mut Particle) {
        let cfg = &self.config;
        if !particle.deformation.is_near_neutral(cfg.neutral_tolerance) {
            return;
        }
        let planar = particle.velocity.xy();
        let speed = planar.length();
        if speed <= f32::EPSILON {
            return;
        }
        let stretch = 1.0 + (speed * cfg.velocity_stretch).min(cfg.max_velocity_stretch);
        let target = Deformation::stretched(stretch, planar.y.atan2(planar.x));
        particle.deformation.approach(target, cfg.smoothing);
    }
}

/// Zero any non-finite position or velocity component.
fn sanitize(particle: &mut Particle) {
    let p = particle.position;
    let v = particle.velocity;
    if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
        log::debug!("Particle {:?} had a non-finite position", particle.id);
        particle.position =
            Point3D::new(finite_or_zero(p.x), finite_or_zero(p.y), finite_or_zero(p.z));
    }
    if !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()) {
        log::debug!("Particle {:?} had a non-finite velocity", particle.id);
        particle.velocity =
            Vector3D::new(finite_or_zero(v.x), finite_or_zero(v.y), finite_or_zero(v.z));
    }
}
