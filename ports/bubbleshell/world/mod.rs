/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Particle data structures for the bubble world.
//!
//! Core structures:
//! - `Particle`: a bubble with position, velocity, radius and deformation
//! - `Population`: capped arena owning every particle, including dead ones
//!   awaiting the cull pass
//! - `WorldBounds`: the box particles are reflected inside

use euclid::default::{Point2D, Point3D, Vector3D};
use serde::{Deserialize, Serialize};

use crate::util::{approach, approach_angle, finite_or_zero};

pub mod spatial;

/// Stable particle handle, never reused within a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

/// Physics-driven stretch state, consumed by rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deformation {
    pub scale_x: f32,
    pub scale_y: f32,
    /// Orientation of the stretch axis in radians
    pub rotation: f32,
}

impl Default for Deformation {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl Deformation {
    pub const NEUTRAL: Deformation = Deformation {
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
    };

    /// Area-preserving elongation along `rotation`
    pub fn stretched(stretch: f32, rotation: f32) -> Self {
        let stretch = stretch.max(1.0);
        Self {
            scale_x: stretch,
            scale_y: 1.0 / stretch,
            rotation,
        }
    }

    /// Whether both scales are within `tolerance` of 1
    pub fn is_near_neutral(&self, tolerance: f32) -> bool {
        (self.scale_x - 1.0).abs() <= tolerance && (self.scale_y - 1.0).abs() <= tolerance
    }

    /// Exponentially smooth towards `target`
    pub fn approach(&mut self, target: Deformation, factor: f32) {
        self.scale_x = approach(self.scale_x, target.scale_x, factor);
        self.scale_y = approach(self.scale_y, target.scale_y, factor);
        self.rotation = approach_angle(self.rotation, target.rotation, factor);
    }

    /// Exponentially smooth the scales back to 1, keeping the orientation
    pub fn relax(&mut self, factor: f32) {
        self.scale_x = approach(self.scale_x, 1.0, factor);
        self.scale_y = approach(self.scale_y, 1.0, factor);
    }
}

/// A simulated bubble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub id: ParticleId,

    pub position: Point3D<f32>,

    pub velocity: Vector3D<f32>,

    /// Volume proxy; zero marks a dead particle waiting to be culled
    pub radius: f32,

    pub deformation: Deformation,

    /// Tick at which this particle last budded (or was created)
    pub last_budding_tick: u64,
}

impl Particle {
    pub fn is_alive(&self) -> bool {
        self.radius > 0.0
    }

    /// Mark for removal by the next cull pass
    pub fn kill(&mut self) {
        self.radius = 0.0;
    }

    /// Position projected onto the screen plane
    pub fn planar_position(&self) -> Point2D<f32> {
        self.position.xy()
    }
}

/// Axis-aligned world box. `x` and `y` are screen axes (y grows downwards,
/// the floor is at `height`), `z` is depth away from the listener.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            depth: 400.0,
        }
    }
}

impl WorldBounds {
    /// Centre of the screen plane, where the black hole sits
    pub fn center(&self) -> Point2D<f32> {
        Point2D::new(self.width * 0.5, self.height * 0.5)
    }

    /// Legal centre range for a particle of `radius` along an axis of
    /// length `extent`. Collapses to the midpoint when the particle is wider
    /// than the axis.
    pub fn axis_range(extent: f32, radius: f32) -> (f32, f32) {
        let lo = radius;
        let hi = extent - radius;
        if lo > hi {
            (extent * 0.5, extent * 0.5)
        } else {
            (lo, hi)
        }
    }

    /// Clamp a position so a particle of `radius` lies inside the box.
    pub fn contain(&self, position: Point3D<f32>, radius: f32) -> Point3D<f32> {
        let (x_lo, x_hi) = Self::axis_range(self.width, radius);
        let (y_lo, y_hi) = Self::axis_range(self.height, radius);
        let (z_lo, z_hi) = Self::axis_range(self.depth, radius);
        Point3D::new(
            position.x.clamp(x_lo, x_hi),
            position.y.clamp(y_lo, y_hi),
            position.z.clamp(z_lo, z_hi),
        )
    }
}

/// Capped particle arena. Dead particles keep their slot until culled.
#[derive(Debug, Clone)]
pub struct Population {
    particles: Vec<Particle>,
    capacity: usize,
    next_id: u64,
}

impl Population {
    /// Create an empty population holding at most `capacity` particles
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    /// Add a particle. Returns `None` when the population is full or the
    /// state is not physical.
    pub fn spawn(
        &mut self,
        position: Point3D<f32>,
        velocity: Vector3D<f32>,
        radius: f32,
        tick: u64,
    ) -> Option<ParticleId> {
        if self.is_full() {
            log::debug!("Population cap {} reached, spawn dropped", self.capacity);
            return None;
        }
        if !(radius.is_finite() && radius > 0.0) {
            return None;
        }
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        self.particles.push(Particle {
            id,
            position: Point3D::new(
                finite_or_zero(position.x),
                finite_or_zero(position.y),
                finite_or_zero(position.z),
            ),
            velocity: Vector3D::new(
                finite_or_zero(velocity.x),
                finite_or_zero(velocity.y),
                finite_or_zero(velocity.z),
            ),
            radius,
            deformation: Deformation::NEUTRAL,
            last_budding_tick: tick,
        });
        Some(id)
    }

    /// Remove up to `budget` dead particles, preserving the order of the
    /// rest. Returns how many were removed.
    pub fn cull(&mut self, budget: usize) -> usize {
        let mut removed = 0;
        self.particles.retain(|p| {
            if !p.is_alive() && removed < budget {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop every particle. Ids keep increasing across resets.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.iter().find(|p| p.id == id)
    }

    /// All particles including dead ones
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Iterate live particles
    pub fn live(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.is_alive())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Number of occupied slots, dead particles included
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots still free under the cap
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.particles.len())
    }

    pub fn is_full(&self) -> bool {
        self.room() == 0
    }
}
